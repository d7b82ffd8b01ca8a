//! Randomized exponential backoff for CAS retry loops.

use super::constants::{BACKOFF_MAX_EXPONENT, BACKOFF_YIELD_STEP};
use rand::Rng;

/// Per-operation backoff state.
///
/// Each failed attempt spins for a random count drawn from a window that
/// doubles per step, capped at `max_spins`. Past a few steps the thread also
/// yields so a descheduled winner can finish.
pub(crate) struct Backoff {
    step: u32,
    max_spins: u32,
}

impl Backoff {
    pub(crate) fn new(max_spins: u32) -> Self {
        Self {
            step: 0,
            max_spins: max_spins.max(1),
        }
    }

    /// Current spin window.
    fn window(&self) -> u32 {
        (1u32 << self.step.min(BACKOFF_MAX_EXPONENT)).min(self.max_spins)
    }

    /// Waits after a lost race.
    pub(crate) fn snooze(&mut self) {
        let spins = rand::rng().random_range(0..=self.window());
        for _ in 0..spins {
            std::hint::spin_loop();
        }
        if self.step >= BACKOFF_YIELD_STEP {
            std::thread::yield_now();
        }
        self.step = self.step.saturating_add(1);
    }

    /// Number of failed attempts so far.
    pub(crate) fn attempts(&self) -> u32 {
        self.step
    }
}
