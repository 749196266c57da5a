use std::{any::Any, backtrace::Backtrace, collections::HashMap};

use chrono::{DateTime, Utc};
use tokio::task::JoinError;

/// A captured panic, handed to a [`PanicHandler`] instead of being allowed
/// to unwind past the supervised task boundary.
#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub at: DateTime<Utc>,
    pub message: String,
    /// Captured where the join error is observed, not at the original
    /// panic site — tokio does not propagate the original backtrace across
    /// the task boundary.
    pub backtrace: String,
    pub context: HashMap<String, String>,
}

impl PanicInfo {
    pub fn from_join_error(error: JoinError, context: HashMap<String, String>) -> Self {
        let message = match error.try_into_panic() {
            Ok(payload) => panic_message(payload.as_ref()),
            Err(_) => "task was cancelled, not panicked".to_string(),
        };
        Self {
            at: Utc::now(),
            message,
            backtrace: Backtrace::force_capture().to_string(),
            context,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Capability invoked with a recovered panic. Narrow on purpose: accept
/// and do something, nothing more.
pub type PanicHandler = std::sync::Arc<dyn Fn(PanicInfo) + Send + Sync>;

/// The default handler: log at error level and drop the panic.
pub fn logging_handler() -> PanicHandler {
    std::sync::Arc::new(|info: PanicInfo| {
        tracing::error!(
            message = %info.message,
            context = ?info.context,
            backtrace = %info.backtrace,
            "recovered panic in supervised task",
        );
    })
}
