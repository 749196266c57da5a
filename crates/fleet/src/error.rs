use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("failed to set remote webhook for this bot")]
    WebhookSetFailed(#[source] forge_relay::RelayError),

    #[error("no such bot is hosted")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, FleetError>;
