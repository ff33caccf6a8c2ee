//! Microsecond time source for the session clock.

use std::time::Instant;

/// Monotonic microsecond counter.
///
/// Only differences between readings are meaningful.
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> u64;
}

/// [`Clock`] backed by [`Instant`], counting from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now_micros();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.now_micros();
        assert!(b >= a + 1_000, "expected at least 1ms between {a} and {b}");
    }
}
