//! Pulse engine: drives the actuator through one multi-phase waveform.
//!
//! Timing comes from blocking holds measured in calibrated delay units. The
//! engine knows nothing about tick rates or pulse multiplicity; the schedule
//! controller decides when and how often [`PulseEngine::run_sequence`] runs.

use core::fmt;

use crate::encoder::{AmplitudeScale, ControlWord, OutputActuator, OutputLevel, encode};
use crate::feedback::{CurrentSensor, Readout, transform};
use crate::resolver::PulseSequenceConfig;

/// Busy-loop iterations per microsecond at the 120 MHz system clock.
pub const LOOP_COUNTS_PER_MICROSECOND: f32 = 7.78;

/// Duration expressed in calibrated busy-loop iterations.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct DelayUnits(u32);

impl DelayUnits {
    pub const ZERO: Self = Self(0);

    pub const fn new(count: u32) -> Self {
        Self(count)
    }

    /// Converts microseconds using [`LOOP_COUNTS_PER_MICROSECOND`], truncating.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn from_micros(micros: u16) -> Self {
        Self((f32::from(micros) * LOOP_COUNTS_PER_MICROSECOND) as u32)
    }

    pub const fn count(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DelayUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}du", self.0)
    }
}

/// Blocking hold primitive used between actuator writes.
pub trait Hold {
    /// Blocks for `units` calibrated delay units.
    fn hold(&mut self, units: DelayUnits);
}

/// Calibrated spin loop. Accuracy depends on the core clock matching
/// [`LOOP_COUNTS_PER_MICROSECOND`].
#[derive(Copy, Clone, Debug, Default)]
pub struct SpinHold;

impl Hold for SpinHold {
    fn hold(&mut self, units: DelayUnits) {
        for _ in 0..units.count() {
            core::hint::spin_loop();
        }
    }
}

/// Hold that returns immediately, for hosts where wall time is simulated.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopHold;

impl Hold for NoopHold {
    fn hold(&mut self, _: DelayUnits) {}
}

/// Owns the actuator, sensor and hold primitive for the output channel.
pub struct PulseEngine<A, S, H> {
    actuator: A,
    sensor: S,
    hold: H,
    last: Readout,
}

impl<A, S, H> PulseEngine<A, S, H>
where
    A: OutputActuator,
    S: CurrentSensor,
    H: Hold,
{
    /// Builds the engine and parks the output at zero.
    pub fn new(mut actuator: A, sensor: S, hold: H) -> Self {
        actuator.commit(ControlWord::ZERO);
        Self {
            actuator,
            sensor,
            hold,
            last: Readout::NONE,
        }
    }

    /// Runs one complete pulse sequence and returns the latest readout.
    ///
    /// When phase-1 is empty no sample is taken and the readout from the
    /// previous sequence is returned unchanged.
    pub fn run_sequence(&mut self, cfg: &PulseSequenceConfig) -> Readout {
        let scale = cfg.scale();
        let delays = cfg.delays();

        self.drive(OutputLevel::Zero, scale);
        self.hold.hold(delays.hold_before);

        if !delays.phase1.is_zero() {
            self.drive(OutputLevel::PositiveMax, scale);
            self.last = transform(self.sensor.sample());
            self.hold.hold(delays.phase1);
        }

        self.drive(OutputLevel::Zero, scale);
        self.hold.hold(delays.phase2);

        if !delays.phase3.is_zero() {
            self.drive(OutputLevel::NegativeMax, scale);
            self.hold.hold(delays.phase3);
        }

        self.drive(OutputLevel::Zero, scale);
        self.last
    }

    /// Rests the output at zero for `units`.
    pub fn rest(&mut self, units: DelayUnits) {
        self.actuator.commit(ControlWord::ZERO);
        self.hold.hold(units);
    }

    pub fn last_readout(&self) -> Readout {
        self.last
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn into_parts(self) -> (A, S, H) {
        (self.actuator, self.sensor, self.hold)
    }

    fn drive(&mut self, level: OutputLevel, scale: AmplitudeScale) {
        self.actuator.commit(encode(level, scale));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use heapless::Vec;

    #[derive(Default)]
    struct MockActuator {
        words: Vec<u8, 32>,
    }

    impl OutputActuator for MockActuator {
        fn commit(&mut self, word: ControlWord) {
            self.words.push(word.value()).expect("actuator log full");
        }
    }

    struct MockSensor {
        raw: u16,
        samples: u8,
    }

    impl CurrentSensor for MockSensor {
        fn sample(&mut self) -> u16 {
            self.samples += 1;
            self.raw
        }
    }

    #[derive(Default)]
    struct MockHold {
        holds: Vec<u32, 32>,
    }

    impl Hold for MockHold {
        fn hold(&mut self, units: DelayUnits) {
            self.holds.push(units.count()).expect("hold log full");
        }
    }

    fn engine(raw: u16) -> PulseEngine<MockActuator, MockSensor, MockHold> {
        PulseEngine::new(
            MockActuator::default(),
            MockSensor { raw, samples: 0 },
            MockHold::default(),
        )
    }

    #[test]
    fn delay_units_truncate_calibrated_micros() {
        assert_eq!(DelayUnits::from_micros(0), DelayUnits::ZERO);
        assert_eq!(DelayUnits::from_micros(1).count(), 7);
        assert_eq!(DelayUnits::from_micros(100).count(), 778);
        assert_eq!(DelayUnits::from_micros(10).count(), 77);
    }

    #[test]
    fn construction_parks_output_at_zero() {
        let engine = engine(0);
        assert_eq!(engine.actuator().words.as_slice(), &[64]);
        assert_eq!(engine.last_readout(), Readout::NONE);
    }

    #[test]
    fn biphasic_sequence_walks_every_phase() {
        let cfg = resolve(3, 4, 3, 3300).expect("valid selection");
        let mut engine = engine(1530);

        let readout = engine.run_sequence(&cfg);

        assert_eq!(readout, Readout::with_current(10));
        assert_eq!(engine.sensor().samples, 1);
        assert_eq!(engine.actuator().words.as_slice(), &[64, 64, 127, 64, 1, 64]);
        let delays = cfg.delays();
        assert_eq!(
            engine.hold.holds.as_slice(),
            &[
                delays.hold_before.count(),
                delays.phase1.count(),
                delays.phase2.count(),
                delays.phase3.count(),
            ]
        );
    }

    #[test]
    fn monophasic_sequence_skips_negative_phase() {
        let cfg = resolve(3, 1, 3, 3300).expect("valid selection");
        let mut engine = engine(1500);

        engine.run_sequence(&cfg);

        assert!(!engine.actuator().words.contains(&1));
        assert_eq!(engine.hold.holds.len(), 3);
    }

    #[test]
    fn rest_commits_zero_then_holds() {
        let mut engine = engine(0);
        engine.rest(DelayUnits::new(42));
        assert_eq!(engine.actuator().words.as_slice(), &[64, 64]);
        assert_eq!(engine.hold.holds.as_slice(), &[42]);
    }

    #[test]
    fn overload_sample_is_reported() {
        let cfg = resolve(1, 2, 1, 3300).expect("valid selection");
        let mut engine = engine(4095);
        let readout = engine.run_sequence(&cfg);
        assert!(readout.overload());
        assert_eq!(readout.current(), 0);
    }
}
