//! Clock Abstraction
//!
//! Injectable time source so poll loops can run against real time in the
//! host crate and controllable time in tests.

use std::cell::{Cell, RefCell};

/// Time source for poll loops and phase deadlines.
///
/// Implementations: `SystemClock` in the host crate for real runs,
/// [`MockClock`] here for deterministic tests.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin (process start).
    fn now_ms(&self) -> u64;

    /// Block the calling thread for `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);
}

/// Controllable clock for tests.
///
/// `sleep_ms` advances the clock instead of blocking, and every sleep is
/// recorded so tests can assert on poll cadence.
///
/// # Example
///
/// ```
/// use waypilot_core::timing::{Clock, MockClock};
///
/// let clock = MockClock::new();
/// clock.sleep_ms(1000);
/// assert_eq!(clock.now_ms(), 1000);
/// assert_eq!(clock.sleeps(), vec![1000]);
/// ```
#[derive(Default)]
pub struct MockClock {
    now_ms: Cell<u64>,
    sleeps: RefCell<Vec<u64>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(ms: u64) -> Self {
        let clock = Self::default();
        clock.now_ms.set(ms);
        clock
    }

    /// Advance time without recording a sleep.
    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }

    /// All sleep durations requested so far, in order.
    pub fn sleeps(&self) -> Vec<u64> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn sleep_ms(&self, ms: u64) {
        self.sleeps.borrow_mut().push(ms);
        self.now_ms.set(self.now_ms.get() + ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_starts_at_zero() {
        let clock = MockClock::new();
        assert_eq!(clock.now_ms(), 0);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_mock_clock_with_initial() {
        let clock = MockClock::with_initial(5_000);
        assert_eq!(clock.now_ms(), 5_000);
    }

    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        clock.advance(250);
        clock.advance(750);
        assert_eq!(clock.now_ms(), 1_000);
        // advance is not a sleep
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_mock_clock_sleep_advances_and_records() {
        let clock = MockClock::new();
        clock.sleep_ms(1_000);
        clock.sleep_ms(1_000);
        assert_eq!(clock.now_ms(), 2_000);
        assert_eq!(clock.sleeps(), vec![1_000, 1_000]);
    }
}
