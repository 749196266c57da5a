use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error(transparent)]
    ReplyCache(#[from] forge_replycache::ReplyCacheError),

    #[error("malformed webhook url: {0}")]
    InvalidWebhookUrl(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
