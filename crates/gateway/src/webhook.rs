use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use bytes::Bytes;
use forge_fleet::{FleetError, FleetManager};
use forge_supervision::PanicHandler;
use tracing::debug;

pub struct AppState {
    pub fleet: Arc<FleetManager>,
    pub panic_handler: PanicHandler,
}

/// `POST /webhook/<token>` — the single inbound endpoint every hosted bot
/// shares. 200 on successful dispatch (even if the relay action itself
/// produced a user-visible error), 400 on parse failure, 404 if no such
/// bot is hosted.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    body: Bytes,
) -> StatusCode {
    let update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            debug!(error = %err, "failed to parse webhook update body");
            return StatusCode::BAD_REQUEST;
        }
    };

    match state.fleet.dispatch(&token, update).await {
        Ok(()) => StatusCode::OK,
        Err(FleetError::NotRunning) => {
            debug!(token_prefix = %token.split(':').next().unwrap_or(&token), "no bot hosted for this token");
            StatusCode::NOT_FOUND
        }
        Err(err) => {
            debug!(error = %err, "webhook dispatch failed");
            StatusCode::NOT_FOUND
        }
    }
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
