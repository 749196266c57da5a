use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Codec(#[from] forge_codec::CodecError),

    #[error("a bot is already registered for this token")]
    DuplicateToken,

    #[error("no bot registered for this token")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, StoreError>;
