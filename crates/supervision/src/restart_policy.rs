use std::{
    sync::Mutex,
    time::Duration,
};

/// Exponential-backoff restart decision state, shared across every task
/// supervised under one policy instance.
///
/// `delay = min(base * 2^n, max)` where `n` is the pre-increment retry
/// count; each call to [`RestartPolicy::next`] atomically reads then
/// increments `n`.
pub struct RestartPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    retry_count: Mutex<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart(Duration),
    Exhausted,
}

impl RestartPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            retry_count: Mutex::new(0),
        }
    }

    /// Consults and advances the retry counter. Never holds the mutex past
    /// the counter read/increment — callers must not sleep under it.
    pub fn next(&self) -> RestartDecision {
        let mut count = match self.retry_count.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *count >= self.max_retries {
            return RestartDecision::Exhausted;
        }
        let shift = (*count).min(31);
        let delay = self
            .base_delay
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        *count += 1;
        RestartDecision::Restart(delay)
    }

    pub fn retry_count(&self) -> u32 {
        match self.retry_count.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn reset(&self) {
        let mut count = match self.retry_count.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *count = 0;
    }
}
