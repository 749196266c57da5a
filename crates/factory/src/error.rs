use thiserror::Error;

/// Errors produced by the factory bot's registration and management flow.
/// User-facing messages for these are composed by the caller; this enum
/// only carries the classification.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("a bot is already registered for this token")]
    AlreadyRegistered,

    #[error("no bot registered for this token")]
    NotFound,

    #[error("only the owner who registered this bot may manage it")]
    NotOwner,

    #[error("this command is restricted to the administrator")]
    NotAdmin,

    #[error("could not reach the remote bot within 1s; check the token")]
    ValidationTimedOut,

    #[error(transparent)]
    Remote(#[from] forge_relay::RelayError),

    #[error(transparent)]
    Store(#[from] forge_store::StoreError),

    #[error(transparent)]
    Fleet(#[from] forge_fleet::FleetError),
}

pub type Result<T> = std::result::Result<T, FactoryError>;
