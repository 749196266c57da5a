//! Panic-safe task supervision: recovery, exponential-backoff restart, and
//! cancellable supervised loops.

mod panic_info;
mod restart_policy;
mod safego;

pub use panic_info::{PanicHandler, PanicInfo, logging_handler};
pub use restart_policy::{RestartDecision, RestartPolicy};
pub use safego::{
    OnExhausted, recover, safe_go, safe_go_with_restart, safe_go_with_restart_and_controller,
    safe_go_with_success_window,
};
