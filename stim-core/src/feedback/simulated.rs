//! Bench feedback source for running without electrodes attached.
//!
//! Replays a fixed 4000-sample cycle: just below the run threshold, a linear
//! ramp up to 100 units above it, then a plateau. One cycle drives the
//! engagement machine through every state.

use super::{CurrentSensor, raw_for_current};

/// Samples in one simulated cycle.
pub const RAMP_CYCLE: u16 = 4000;
const RAMP_START: u16 = 1000;
const RAMP_END: u16 = 3000;
/// Readout units the plateau sits above the run threshold.
pub const RAMP_HEADROOM: u16 = 100;

/// [`CurrentSensor`] that replays the bench ramp profile.
#[derive(Copy, Clone, Debug)]
pub struct RampFeedback {
    run_threshold: u16,
    step: u16,
}

impl RampFeedback {
    pub const fn new(run_threshold: u16) -> Self {
        Self {
            run_threshold,
            step: 0,
        }
    }

    /// Position within the current cycle.
    pub const fn step(&self) -> u16 {
        self.step
    }

    /// Readout current the profile produces at `step`.
    pub const fn current_at(&self, step: u16) -> u16 {
        let step = step % RAMP_CYCLE;
        if step < RAMP_START {
            self.run_threshold.saturating_sub(1)
        } else if step < RAMP_END {
            let rise = (step - RAMP_START) / ((RAMP_END - RAMP_START) / RAMP_HEADROOM);
            self.run_threshold.saturating_add(rise)
        } else {
            self.run_threshold.saturating_add(RAMP_HEADROOM)
        }
    }
}

impl CurrentSensor for RampFeedback {
    fn sample(&mut self) -> u16 {
        let current = self.current_at(self.step);
        self.step = (self.step + 1) % RAMP_CYCLE;
        raw_for_current(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::transform;

    #[test]
    fn ramp_profile_matches_bench_cycle() {
        let ramp = RampFeedback::new(10);
        assert_eq!(ramp.current_at(0), 9);
        assert_eq!(ramp.current_at(999), 9);
        assert_eq!(ramp.current_at(1000), 10);
        assert_eq!(ramp.current_at(2000), 60);
        assert_eq!(ramp.current_at(2999), 109);
        assert_eq!(ramp.current_at(3000), 110);
        assert_eq!(ramp.current_at(3999), 110);
        assert_eq!(ramp.current_at(4000), 9);
    }

    #[test]
    fn samples_wrap_after_one_cycle() {
        let mut ramp = RampFeedback::new(10);
        let first = ramp.sample();
        for _ in 1..RAMP_CYCLE {
            let _ = ramp.sample();
        }
        assert_eq!(ramp.step(), 0);
        assert_eq!(ramp.sample(), first);
        assert_eq!(transform(first).current(), 9);
    }
}
