use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{Level, log};

use crate::WRONG_STREAK_UNLOCK_THRESHOLD;

/// Consecutive wrong-signal counter with a one-shot unlock event
///
/// The streak saturates at 255 and is reset to zero by any successful or
/// neutral protocol event. Reaching the unlock threshold fires the unlock
/// event exactly once and resets the streak.
///
/// The event flag is the only piece of link state that may be produced in one
/// execution context and consumed in another (interrupt-driven receive path vs
/// main loop), so it is held in a `Signal` and drained with a single atomic
/// read-and-clear.
pub(crate) struct WrongStreak {
    streak: u8,
    unlock_event: Signal<CriticalSectionRawMutex, ()>,
}

impl WrongStreak {
    pub(crate) const fn new() -> Self {
        Self {
            streak: 0,
            unlock_event: Signal::new(),
        }
    }

    /// Records one invalid or foreign signal
    pub(crate) fn record_wrong(&mut self) {
        self.streak = self.streak.saturating_add(1);
        log!(Level::Debug, "Wrong signal streak = {}", self.streak);
        if self.streak >= WRONG_STREAK_UNLOCK_THRESHOLD {
            log!(Level::Info, "{} consecutive wrong signals, raising unlock event", self.streak);
            self.streak = 0;
            self.unlock_event.signal(());
        }
    }

    /// Unconditionally resets the streak to zero
    pub(crate) fn reset(&mut self) {
        if self.streak != 0 {
            log!(Level::Debug, "Reset wrong signal streak");
        }
        self.streak = 0;
    }

    /// Drains a pending unlock event, returning whether one was pending
    pub(crate) fn consume_unlock_event(&self) -> bool {
        self.unlock_event.try_take().is_some()
    }

    /// Discards any pending unlock event without reporting it
    pub(crate) fn clear_event(&self) {
        let _ = self.unlock_event.try_take();
    }

    #[cfg(test)]
    pub(crate) fn value(&self) -> u8 {
        self.streak
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn two_wrong_signals_fire_exactly_one_unlock_event() {
        let mut streak = WrongStreak::new();
        streak.record_wrong();
        assert_eq!(streak.value(), 1);
        assert!(!streak.consume_unlock_event());

        streak.record_wrong();
        assert_eq!(streak.value(), 0);
        assert!(streak.consume_unlock_event());
        assert!(!streak.consume_unlock_event());
    }

    #[test]
    fn neutral_reset_clears_streak_without_unlock_event() {
        let mut streak = WrongStreak::new();
        streak.record_wrong();
        streak.reset();
        assert_eq!(streak.value(), 0);
        assert!(!streak.consume_unlock_event());

        // The next single wrong signal starts a fresh streak
        streak.record_wrong();
        assert_eq!(streak.value(), 1);
        assert!(!streak.consume_unlock_event());
    }

    #[test]
    fn clear_event_discards_a_pending_unlock() {
        let mut streak = WrongStreak::new();
        streak.record_wrong();
        streak.record_wrong();
        streak.clear_event();
        assert!(!streak.consume_unlock_event());
    }
}
