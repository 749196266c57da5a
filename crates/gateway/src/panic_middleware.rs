use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use forge_supervision::PanicInfo;

use crate::AppState;

/// Wraps every request in panic recovery: the handler runs on a spawned
/// task so a panic surfaces as a `JoinError` rather than unwinding into the
/// HTTP listener. On panic, records method/path/remote-address context and
/// returns 500; the writer otherwise always receives exactly one status.
pub async fn recover_panics(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|c| c.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match tokio::spawn(next.run(request)).await {
        Ok(response) => response,
        Err(join_err) => {
            let mut context = HashMap::new();
            context.insert("method".to_string(), method);
            context.insert("path".to_string(), path);
            context.insert("remote_addr".to_string(), remote_addr);
            (state.panic_handler)(PanicInfo::from_join_error(join_err, context));
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
