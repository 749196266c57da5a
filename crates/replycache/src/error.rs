use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplyCacheError {
    #[error("reply cache unavailable: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type Result<T> = std::result::Result<T, ReplyCacheError>;
