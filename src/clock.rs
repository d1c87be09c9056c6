//! Clock Module
//!
//! Monotonic time source injected into the cache and the rate limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// == Clock Trait ==
/// Source of monotonic time in milliseconds.
///
/// The origin is arbitrary; only differences between two readings matter.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the clock's origin.
    fn now_ms(&self) -> u64;

    /// Microseconds elapsed since the clock's origin, used for latency.
    fn now_us(&self) -> u64 {
        self.now_ms().saturating_mul(1_000)
    }

    /// Suspends the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

// == System Clock ==
/// Wall-independent clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// == Manual Clock ==
/// Clock that only moves when told to.
///
/// `sleep` advances the clock by the requested duration and returns
/// immediately, so code that polls and sleeps runs deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.now
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Sets the absolute reading. Callers must not move it backwards.
    pub fn set_ms(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_ms(), 1_250);

        clock.set_ms(5_000);
        assert_eq!(clock.now_ms(), 5_000);
    }

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new(0);
        clock.sleep(Duration::from_secs(2));
        assert_eq!(clock.now_ms(), 2_000);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now_ms();
        clock.sleep(Duration::from_millis(5));
        assert!(clock.now_ms() >= first + 5);
    }

    #[test]
    fn test_system_clock_microseconds() {
        let clock = SystemClock::new();
        let first = clock.now_us();
        std::thread::sleep(Duration::from_micros(300));
        let second = clock.now_us();
        assert!(second >= first + 300);
        assert!(clock.now_ms() <= clock.now_us() / 1_000);
    }

    #[test]
    fn test_manual_clock_microseconds_follow_millis() {
        let clock = ManualClock::new(7);
        assert_eq!(clock.now_us(), 7_000);
    }
}
