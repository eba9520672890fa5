use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Granularity at which interruptible sleeps re-check their token.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared cooperative cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token nobody else holds, so it is never cancelled.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear a latched cancellation (start of a new run).
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Sleep for `duration`, waking every `POLL_INTERVAL` to check `token`.
/// Returns `true` if the full duration elapsed, `false` if cancelled.
pub fn sleep_interruptible(duration: Duration, token: &CancelToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(POLL_INTERVAL));
    }
}

/// Sleep for exact milliseconds (not interruptible).
pub fn sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sleep_without_cancel() {
        let token = CancelToken::new();
        let t0 = Instant::now();
        assert!(sleep_interruptible(Duration::from_millis(60), &token));
        assert!(t0.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn cancelled_token_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        let t0 = Instant::now();
        assert!(!sleep_interruptible(Duration::from_secs(5), &token));
        assert!(t0.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn cancel_from_other_thread_wakes_sleeper() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        let t0 = Instant::now();
        assert!(!sleep_interruptible(Duration::from_secs(2), &token));
        let elapsed = t0.elapsed();
        handle.join().unwrap();
        assert!(elapsed >= Duration::from_millis(45));
        assert!(elapsed < Duration::from_millis(300), "took {:?}", elapsed);
    }

    #[test]
    fn reset_clears_latch() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!token.is_cancelled());
    }
}
