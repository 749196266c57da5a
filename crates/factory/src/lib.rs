//! The factory bot: the single control bot through which a user registers,
//! lists, and deletes hosted bots. Every other hosted bot runs the fixed
//! contact-relay behavior in `forge_relay`; this one runs the fixed
//! registration behavior that brings those bots into being.

mod bot;
mod error;

pub use bot::{FactoryBot, RegisterOutcome};
pub use error::{FactoryError, Result};
