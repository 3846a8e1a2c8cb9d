// src/utils/time.rs
//! Clock abstraction so deadlines and the watchdog can run on a fake clock in tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    /// Monotonic nanoseconds; deadlines and the watchdog are measured on this.
    fn now_nanos(&self) -> u64;

    /// Wall-clock nanoseconds since the Unix epoch, for stamping samples.
    fn wall_clock_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }

    fn now_millis(&self) -> u64 {
        self.now_nanos() / 1_000_000
    }

    fn sleep(&self, duration: Duration);
}

/// Monotonic clock anchored when the provider is created
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeProvider {
    origin: Instant,
}

impl SystemTimeProvider {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Mock time provider for deterministic testing; `sleep` advances the clock.
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_nanos: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_nanos),
        }
    }

    pub fn advance_by(&self, nanos: u64) {
        self.current_time.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_by(duration.as_nanos() as u64);
    }

    pub fn set_time(&self, nanos: u64) {
        self.current_time.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }

    fn wall_clock_nanos(&self) -> u64 {
        self.now_nanos()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Nanoseconds since the Unix epoch
pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
