//! The single shared HTTP surface every hosted bot is reached through:
//! `POST /webhook/{token}` demultiplexes to whichever bot the fleet has
//! registered for that credential, plus a `/healthz` liveness probe.

mod panic_middleware;
mod webhook;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use forge_supervision::PanicHandler;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use webhook::AppState;

/// Builds the gateway router. `panic_handler` is invoked with a
/// [`forge_supervision::PanicInfo`] whenever a webhook handler panics;
/// the response the caller receives is always a plain 500 regardless of
/// what the handler was doing when it panicked.
pub fn build_app(fleet: Arc<forge_fleet::FleetManager>, panic_handler: PanicHandler) -> Router {
    let state = Arc::new(AppState {
        fleet,
        panic_handler,
    });

    Router::new()
        .route("/webhook/{token}", post(webhook::handle_webhook))
        .route("/healthz", get(webhook::healthz))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            panic_middleware::recover_panics,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
