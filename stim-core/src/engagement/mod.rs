//! Debounced engagement tracking.
//!
//! Electrode contact is inferred from the feedback current. Entering or
//! leaving `Run` requires [`DEBOUNCE_LIMIT`] consecutive confirming readouts;
//! a single contradicting readout falls back to the previous steady state.

use core::fmt;

use crate::feedback::Readout;

/// Consecutive confirming readouts required to complete a transition.
pub const DEBOUNCE_LIMIT: u8 = 10;

/// Engagement state of the output channel.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum EngagementState {
    #[default]
    Idle,
    Run,
    WaitingForRun,
    WaitingForIdle,
}

impl EngagementState {
    /// LED pattern for the state, or `None` to leave the LEDs as they are.
    pub const fn indicator(self) -> Option<Indicator> {
        match self {
            EngagementState::Idle => Some(Indicator {
                red: true,
                green: false,
            }),
            EngagementState::Run => Some(Indicator {
                red: false,
                green: true,
            }),
            EngagementState::WaitingForRun | EngagementState::WaitingForIdle => None,
        }
    }

    /// Two-phase grouping used by the status display.
    pub const fn display_phase(self) -> DisplayPhase {
        match self {
            EngagementState::Idle | EngagementState::WaitingForRun => DisplayPhase::Idle,
            EngagementState::Run | EngagementState::WaitingForIdle => DisplayPhase::Running,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EngagementState::Idle => "IDLE",
            EngagementState::Run => "RUN",
            EngagementState::WaitingForRun => "WAITING_FOR_RUN",
            EngagementState::WaitingForIdle => "WAITING_FOR_IDLE",
        }
    }
}

impl fmt::Display for EngagementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Red/green LED pattern.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Indicator {
    pub red: bool,
    pub green: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DisplayPhase {
    Idle,
    Running,
}

/// Current thresholds in readout units. The two are independent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EngagementThresholds {
    /// Readouts at or above this start the move towards `Run`.
    pub run: u16,
    /// Readouts at or below this start the move towards `Idle`.
    pub idle: u16,
}

impl Default for EngagementThresholds {
    fn default() -> Self {
        Self { run: 10, idle: 10 }
    }
}

/// A state change produced by one update.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub from: EngagementState,
    pub to: EngagementState,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Four-state debounced machine fed once per executed tick.
#[derive(Clone, Debug)]
pub struct EngagementMachine {
    state: EngagementState,
    debounce: u8,
    thresholds: EngagementThresholds,
}

impl EngagementMachine {
    pub const fn new(thresholds: EngagementThresholds) -> Self {
        Self {
            state: EngagementState::Idle,
            debounce: 0,
            thresholds,
        }
    }

    pub const fn state(&self) -> EngagementState {
        self.state
    }

    pub const fn debounce(&self) -> u8 {
        self.debounce
    }

    pub const fn thresholds(&self) -> EngagementThresholds {
        self.thresholds
    }

    /// Applies one readout, returning the transition if the state changed.
    pub fn update(&mut self, readout: Readout) -> Option<Transition> {
        let current = readout.current();
        let EngagementThresholds { run, idle } = self.thresholds;

        let next = match self.state {
            EngagementState::Idle if current >= run => EngagementState::WaitingForRun,
            EngagementState::Run if current <= idle => EngagementState::WaitingForIdle,
            EngagementState::WaitingForRun if current < run => EngagementState::Idle,
            EngagementState::WaitingForRun => self.confirm(EngagementState::Run),
            EngagementState::WaitingForIdle if current > idle => EngagementState::Run,
            EngagementState::WaitingForIdle => self.confirm(EngagementState::Idle),
            steady => steady,
        };

        if next == self.state {
            return None;
        }

        let transition = Transition {
            from: self.state,
            to: next,
        };
        self.state = next;
        self.debounce = 0;
        Some(transition)
    }

    fn confirm(&mut self, target: EngagementState) -> EngagementState {
        self.debounce = self.debounce.saturating_add(1);
        if self.debounce >= DEBOUNCE_LIMIT {
            target
        } else {
            self.state
        }
    }
}

impl Default for EngagementMachine {
    fn default() -> Self {
        Self::new(EngagementThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(machine: &mut EngagementMachine, current: u16) -> Option<Transition> {
        machine.update(Readout::with_current(current))
    }

    #[test]
    fn confirmed_contact_reaches_run() {
        let mut machine = EngagementMachine::default();
        assert_eq!(
            feed(&mut machine, 12),
            Some(Transition {
                from: EngagementState::Idle,
                to: EngagementState::WaitingForRun,
            })
        );
        for count in 1..DEBOUNCE_LIMIT {
            assert_eq!(feed(&mut machine, 12), None);
            assert_eq!(machine.debounce(), count);
        }
        assert_eq!(
            feed(&mut machine, 12).map(|t| t.to),
            Some(EngagementState::Run)
        );
        assert_eq!(machine.debounce(), 0);
    }

    #[test]
    fn dip_below_run_threshold_aborts_wait() {
        let mut machine = EngagementMachine::default();
        feed(&mut machine, 10);
        for _ in 0..5 {
            feed(&mut machine, 10);
        }
        assert_eq!(
            feed(&mut machine, 9).map(|t| t.to),
            Some(EngagementState::Idle)
        );
        assert_eq!(machine.debounce(), 0);
    }

    #[test]
    fn release_is_debounced_back_to_idle() {
        let mut machine = EngagementMachine::new(EngagementThresholds { run: 20, idle: 5 });
        feed(&mut machine, 20);
        for _ in 0..DEBOUNCE_LIMIT {
            feed(&mut machine, 20);
        }
        assert_eq!(machine.state(), EngagementState::Run);

        // Between the thresholds nothing happens while running.
        assert_eq!(feed(&mut machine, 6), None);
        assert_eq!(
            feed(&mut machine, 5).map(|t| t.to),
            Some(EngagementState::WaitingForIdle)
        );
        assert_eq!(
            feed(&mut machine, 6).map(|t| t.to),
            Some(EngagementState::Run)
        );

        feed(&mut machine, 0);
        for _ in 1..DEBOUNCE_LIMIT {
            assert_eq!(feed(&mut machine, 0), None);
        }
        assert_eq!(
            feed(&mut machine, 0).map(|t| t.to),
            Some(EngagementState::Idle)
        );
    }

    #[test]
    fn overload_reads_as_no_current() {
        let mut machine = EngagementMachine::default();
        assert_eq!(machine.update(Readout::OVERLOAD), None);
        assert_eq!(machine.state(), EngagementState::Idle);
    }

    #[test]
    fn indicator_and_display_grouping() {
        assert_eq!(
            EngagementState::Idle.indicator(),
            Some(Indicator {
                red: true,
                green: false
            })
        );
        assert_eq!(
            EngagementState::Run.indicator(),
            Some(Indicator {
                red: false,
                green: true
            })
        );
        assert_eq!(EngagementState::WaitingForRun.indicator(), None);
        assert_eq!(EngagementState::WaitingForIdle.indicator(), None);
        assert_eq!(
            EngagementState::WaitingForRun.display_phase(),
            DisplayPhase::Idle
        );
        assert_eq!(
            EngagementState::WaitingForIdle.display_phase(),
            DisplayPhase::Running
        );
    }
}
