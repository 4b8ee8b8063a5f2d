//! Fixed-rate tick scheduling.
//!
//! The host calls [`ScheduleController::on_tick`] at [`TICK_RATE_HZ`]. The
//! controller applies the resolved divider, runs the engine once or twice,
//! and feeds the last readout into the engagement machine.

use core::fmt;

use crate::encoder::OutputActuator;
use crate::engagement::{EngagementMachine, EngagementState, EngagementThresholds, Transition};
use crate::engine::{Hold, PulseEngine};
use crate::feedback::{CurrentSensor, Readout};
use crate::resolver::PulseSequenceConfig;

/// Nominal rate of the host tick source.
pub const TICK_RATE_HZ: u32 = 3000;

/// Number of engine runs per active tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Multiplicity {
    Single,
    /// Two runs separated by a zero-output gap hold.
    Double,
}

impl Multiplicity {
    pub const fn pulses(self) -> u8 {
        match self {
            Multiplicity::Single => 1,
            Multiplicity::Double => 2,
        }
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Multiplicity::Single => f.write_str("single"),
            Multiplicity::Double => f.write_str("double"),
        }
    }
}

/// Result of one tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// The divider skipped this tick; nothing was touched.
    Skipped,
    Executed {
        readout: Readout,
        pulses: u8,
        transition: Option<Transition>,
    },
}

impl TickOutcome {
    pub const fn is_executed(&self) -> bool {
        matches!(self, TickOutcome::Executed { .. })
    }

    pub const fn transition(&self) -> Option<Transition> {
        match self {
            TickOutcome::Executed { transition, .. } => *transition,
            TickOutcome::Skipped => None,
        }
    }
}

/// Tick counter and divider gate.
///
/// The counter is never reset and wraps at `u32` width. With a divider that
/// does not divide 2^32 the phase of the gate shifts once per wrap, about
/// every 16 days at 3 kHz.
#[derive(Clone, Debug, Default)]
pub struct ScheduleController {
    counter: u32,
}

impl ScheduleController {
    pub const fn new() -> Self {
        Self { counter: 0 }
    }

    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// Advances the counter and reports whether this tick should pulse.
    pub fn advance(&mut self, cfg: &PulseSequenceConfig) -> bool {
        self.counter = self.counter.wrapping_add(1);
        self.counter % cfg.divider().get() == 0
    }

    /// Handles one host tick.
    pub fn on_tick<A, S, H>(
        &mut self,
        cfg: &PulseSequenceConfig,
        engine: &mut PulseEngine<A, S, H>,
        machine: &mut EngagementMachine,
    ) -> TickOutcome
    where
        A: OutputActuator,
        S: CurrentSensor,
        H: Hold,
    {
        if !self.advance(cfg) {
            return TickOutcome::Skipped;
        }

        let mut readout = engine.run_sequence(cfg);
        if cfg.multiplicity() == Multiplicity::Double {
            engine.rest(cfg.gap());
            readout = engine.run_sequence(cfg);
        }

        let transition = machine.update(readout);
        TickOutcome::Executed {
            readout,
            pulses: cfg.multiplicity().pulses(),
            transition,
        }
    }
}

/// Complete output channel: schedule, engine and engagement state.
pub struct Stimulator<A, S, H> {
    schedule: ScheduleController,
    engine: PulseEngine<A, S, H>,
    machine: EngagementMachine,
}

impl<A, S, H> Stimulator<A, S, H>
where
    A: OutputActuator,
    S: CurrentSensor,
    H: Hold,
{
    pub fn new(engine: PulseEngine<A, S, H>, thresholds: EngagementThresholds) -> Self {
        Self {
            schedule: ScheduleController::new(),
            engine,
            machine: EngagementMachine::new(thresholds),
        }
    }

    pub fn on_tick(&mut self, cfg: &PulseSequenceConfig) -> TickOutcome {
        self.schedule.on_tick(cfg, &mut self.engine, &mut self.machine)
    }

    pub fn state(&self) -> EngagementState {
        self.machine.state()
    }

    pub fn readout(&self) -> Readout {
        self.engine.last_readout()
    }

    pub fn ticks(&self) -> u32 {
        self.schedule.counter()
    }

    pub fn engine(&self) -> &PulseEngine<A, S, H> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PulseEngine<A, S, H> {
        &mut self.engine
    }

    pub fn machine(&self) -> &EngagementMachine {
        &self.machine
    }
}
