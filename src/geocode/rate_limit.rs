use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Enforces a minimum gap between calls, blocking the caller as needed
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_call: Mutex::new(None),
        }
    }

    /// Run `f` no sooner than `min_delay` after the previous call started
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let mut last = self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                std::thread::sleep(self.min_delay - elapsed);
            }
        }
        *last = Some(Instant::now());
        drop(last);
        f()
    }
}
