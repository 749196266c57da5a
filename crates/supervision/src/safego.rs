use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    panic_info::{PanicHandler, PanicInfo},
    restart_policy::{RestartDecision, RestartPolicy},
};

/// Capability invoked exactly once when a restart policy exhausts its
/// retries.
pub type OnExhausted = Arc<dyn Fn() + Send + Sync>;

/// Captures a panic raised by `f`, dispatching it to `handler` instead of
/// letting it unwind further. Mirrors `SafeGo` for synchronous call sites
/// that are not already inside a spawned task.
pub fn recover<F, R>(context: HashMap<String, String>, handler: &PanicHandler, f: F) -> Option<R>
where
    F: FnOnce() -> R + std::panic::UnwindSafe,
{
    match std::panic::catch_unwind(f) {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "non-string panic payload".to_string()
            };
            handler(PanicInfo {
                at: chrono::Utc::now(),
                message,
                backtrace: std::backtrace::Backtrace::force_capture().to_string(),
                context,
            });
            None
        }
    }
}

/// Runs `task` on a new task; any panic is recovered and reported to
/// `handler`. Fire-and-forget — the returned handle resolves once recovery
/// has run, whether or not the inner task panicked.
pub fn safe_go<F, Fut>(task: F, context: HashMap<String, String>, handler: PanicHandler) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(join_err) = tokio::spawn(task()).await {
            if join_err.is_panic() {
                handler(PanicInfo::from_join_error(join_err, context));
            }
        }
    })
}

/// Runs `task_factory`'s output in a loop, consulting `policy` after every
/// termination — panicked or not — for a restart delay. Calls
/// `on_exhausted` exactly once when the policy is exhausted, then returns.
pub fn safe_go_with_restart<F, Fut>(
    mut task_factory: F,
    context: HashMap<String, String>,
    handler: PanicHandler,
    policy: Arc<RestartPolicy>,
    on_exhausted: OnExhausted,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            if let Err(join_err) = tokio::spawn(task_factory()).await {
                if join_err.is_panic() {
                    handler(PanicInfo::from_join_error(join_err, context.clone()));
                }
            }
            match policy.next() {
                RestartDecision::Restart(delay) => tokio::time::sleep(delay).await,
                RestartDecision::Exhausted => {
                    on_exhausted();
                    return;
                }
            }
        }
    })
}

/// Like [`safe_go_with_restart`], but observes `cancel` before each
/// invocation, after each invocation, and during the backoff sleep;
/// cancellation wins over restart at every one of those points. Unlike
/// the uncontrolled variant, a normal (non-panic) return ends the loop
/// without consulting the policy — only a panic triggers a restart here.
pub fn safe_go_with_restart_and_controller<F, Fut>(
    mut task_factory: F,
    context: HashMap<String, String>,
    handler: PanicHandler,
    policy: Arc<RestartPolicy>,
    on_exhausted: OnExhausted,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                r = tokio::spawn(task_factory()) => r,
            };

            if cancel.is_cancelled() {
                return;
            }

            match result {
                Ok(()) => return,
                Err(join_err) if join_err.is_panic() => {
                    handler(PanicInfo::from_join_error(join_err, context.clone()));
                    match policy.next() {
                        RestartDecision::Restart(delay) => {
                            tokio::select! {
                                _ = cancel.cancelled() => return,
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        RestartDecision::Exhausted => {
                            on_exhausted();
                            return;
                        }
                    }
                }
                Err(_) => return,
            }
        }
    })
}

/// Like [`safe_go_with_restart_and_controller`], but restarts on a normal
/// return just as it does on a panic, and resets `policy` whenever a run —
/// panicked or not — stays up at least `healthy_after` before ending. A
/// long healthy run earns the task a fresh backoff schedule instead of
/// inheriting one escalated by failures long past; a run that ends before
/// `healthy_after` elapses keeps whatever schedule it already had. Only an
/// unrecoverable join error (the task was cancelled or aborted out from
/// under it) or `cancel` firing ends the loop outright.
pub fn safe_go_with_success_window<F, Fut>(
    mut task_factory: F,
    context: HashMap<String, String>,
    handler: PanicHandler,
    policy: Arc<RestartPolicy>,
    on_exhausted: OnExhausted,
    cancel: CancellationToken,
    healthy_after: Duration,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let started = std::time::Instant::now();
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                r = tokio::spawn(task_factory()) => r,
            };

            if cancel.is_cancelled() {
                return;
            }

            let ran_healthily = started.elapsed() >= healthy_after;
            if let Err(join_err) = &result {
                if !join_err.is_panic() {
                    return;
                }
            }
            if let Err(join_err) = result {
                handler(PanicInfo::from_join_error(join_err, context.clone()));
            }
            if ran_healthily {
                policy.reset();
            }

            match policy.next() {
                RestartDecision::Restart(delay) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RestartDecision::Exhausted => {
                    on_exhausted();
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    fn noop_handler() -> PanicHandler {
        Arc::new(|_| {})
    }

    #[tokio::test]
    async fn safe_go_survives_panic() {
        let handle = safe_go(
            || async { panic!("boom") },
            HashMap::new(),
            noop_handler(),
        );
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn safe_go_with_restart_exhausts_and_calls_once() {
        let attempts = Arc::new(AtomicU32::new(0));
        let exhausted_calls = Arc::new(AtomicU32::new(0));
        let policy = Arc::new(RestartPolicy::new(
            2,
            Duration::from_millis(1),
            Duration::from_millis(5),
        ));

        let attempts_clone = Arc::clone(&attempts);
        let exhausted_clone = Arc::clone(&exhausted_calls);
        let handle = safe_go_with_restart(
            move || {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    panic!("always fails");
                }
            },
            HashMap::new(),
            noop_handler(),
            policy,
            Arc::new(move || {
                exhausted_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.await.unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(exhausted_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn controller_cancellation_preempts_restart() {
        let cancel = CancellationToken::new();
        let policy = Arc::new(RestartPolicy::new(
            100,
            Duration::from_secs(30),
            Duration::from_secs(60),
        ));
        let cancel_clone = cancel.clone();
        let handle = safe_go_with_restart_and_controller(
            move || async { panic!("boom") },
            HashMap::new(),
            noop_handler(),
            policy,
            Arc::new(|| {}),
            cancel_clone,
        );
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("cancellation should preempt the long backoff sleep")
            .unwrap();
    }

    #[tokio::test]
    async fn controller_normal_return_does_not_restart() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let policy = Arc::new(RestartPolicy::new(
            5,
            Duration::from_millis(1),
            Duration::from_millis(5),
        ));
        let handle = safe_go_with_restart_and_controller(
            move || {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                }
            },
            HashMap::new(),
            noop_handler(),
            policy,
            Arc::new(|| {}),
            CancellationToken::new(),
        );
        handle.await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_window_does_not_reset_a_short_run() {
        let policy = Arc::new(RestartPolicy::new(
            5,
            Duration::from_millis(1),
            Duration::from_millis(5),
        ));
        policy.next();
        policy.next();
        assert_eq!(policy.retry_count(), 2);

        let handle = safe_go_with_success_window(
            move || async { panic!("boom") },
            HashMap::new(),
            noop_handler(),
            Arc::clone(&policy),
            Arc::new(|| {}),
            CancellationToken::new(),
            Duration::from_secs(60),
        );
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should exhaust quickly")
            .unwrap();

        assert_eq!(policy.retry_count(), 5, "short runs never reach the healthy window");
    }

    #[tokio::test]
    async fn success_window_resets_after_a_healthy_run_then_panic() {
        let policy = Arc::new(RestartPolicy::new(
            5,
            Duration::from_millis(1),
            Duration::from_millis(5),
        ));
        policy.next();
        policy.next();
        assert_eq!(policy.retry_count(), 2);

        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let policy_clone = Arc::clone(&policy);
        let handle = safe_go_with_success_window(
            move || {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    } else {
                        panic!("boom after a healthy run");
                    }
                }
            },
            HashMap::new(),
            noop_handler(),
            policy_clone,
            Arc::new(|| {}),
            CancellationToken::new(),
            Duration::from_millis(10),
        );
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should exhaust quickly")
            .unwrap();

        assert_eq!(
            attempts.load(Ordering::SeqCst),
            1 + 5,
            "the healthy first run resets the counter, so the policy takes its full 5 retries again"
        );
    }

    #[tokio::test]
    async fn success_window_cancellation_preempts_restart() {
        let cancel = CancellationToken::new();
        let policy = Arc::new(RestartPolicy::new(
            100,
            Duration::from_secs(30),
            Duration::from_secs(60),
        ));
        let cancel_clone = cancel.clone();
        let handle = safe_go_with_success_window(
            move || async { panic!("boom") },
            HashMap::new(),
            noop_handler(),
            policy,
            Arc::new(|| {}),
            cancel_clone,
            Duration::from_secs(3600),
        );
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("cancellation should preempt the long backoff sleep")
            .unwrap();
    }
}
