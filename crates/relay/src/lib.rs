//! The fixed contact-relay behavior installed on every hosted bot, and the
//! narrow remote-bot abstraction it (and the fleet manager) are built on.

mod contact;
mod error;
mod remote;

pub use contact::{ContactRelay, HostedBot};
pub use error::{RelayError, Result};
pub use remote::{BotIdentity, RemoteBot, TeloxideRemoteBot};
