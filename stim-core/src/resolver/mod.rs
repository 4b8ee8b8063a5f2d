//! Configuration resolver.
//!
//! Turns the user-facing selectors and the latest battery reading into a
//! concrete [`PulseSequenceConfig`]. Resolution is pure: the same inputs
//! always produce the same config, and nothing here touches hardware.

use core::fmt;
use core::num::NonZeroU32;

use crate::encoder::AmplitudeScale;
use crate::engine::DelayUnits;
use crate::profiles::{SequenceId, profile_for};
use crate::schedule::Multiplicity;

/// Battery voltage at which the peak-voltage tiers are calibrated.
pub const NOMINAL_BATTERY_MV: u16 = 3300;

/// Output frequency selection (stored as 1-3).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrequencyTier {
    OneKhz,
    TwoKhz,
    ThreeKhz,
}

impl FrequencyTier {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::OneKhz),
            2 => Some(Self::TwoKhz),
            3 => Some(Self::ThreeKhz),
            _ => None,
        }
    }

    pub const fn to_raw(self) -> u8 {
        match self {
            Self::OneKhz => 1,
            Self::TwoKhz => 2,
            Self::ThreeKhz => 3,
        }
    }

    /// Divider and multiplicity applied to the 3 kHz tick.
    pub const fn policy(self) -> TickPolicy {
        FREQUENCY_POLICY[self.to_raw() as usize - 1]
    }
}

impl fmt::Display for FrequencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}kHz", self.to_raw())
    }
}

/// Tick divider and pulse multiplicity for one frequency tier.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickPolicy {
    pub divider: NonZeroU32,
    pub multiplicity: Multiplicity,
}

impl TickPolicy {
    pub const fn new(divider: NonZeroU32, multiplicity: Multiplicity) -> Self {
        Self {
            divider,
            multiplicity,
        }
    }
}

const DIVIDE_BY_ONE: NonZeroU32 = NonZeroU32::MIN;
const DIVIDE_BY_THREE: NonZeroU32 = match NonZeroU32::new(3) {
    Some(divider) => divider,
    None => NonZeroU32::MIN,
};

// 1 kHz pulses every third tick. 2 kHz doubles that pulse, so the effective
// rate is only approximate. 3 kHz pulses on every tick.
const FREQUENCY_POLICY: [TickPolicy; 3] = [
    TickPolicy::new(DIVIDE_BY_THREE, Multiplicity::Single),
    TickPolicy::new(DIVIDE_BY_THREE, Multiplicity::Double),
    TickPolicy::new(DIVIDE_BY_ONE, Multiplicity::Single),
];

/// Peak output voltage selection (stored as 1-3).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PeakVoltageTier {
    Low,
    Medium,
    High,
}

impl PeakVoltageTier {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }

    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Fraction of full actuator swing at nominal battery voltage.
    pub const fn base_fraction(self) -> f32 {
        match self {
            Self::Low => 1.0 / 3.0,
            Self::Medium => 2.0 / 3.0,
            Self::High => 1.0,
        }
    }
}

impl fmt::Display for PeakVoltageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(label)
    }
}

/// Errors surfaced while resolving a selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResolveError {
    UnknownFrequency(u8),
    UnknownSequence(u8),
    UnknownPeakVoltage(u8),
    /// Battery reading of zero; the compensation ratio is undefined.
    BatteryUnavailable,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UnknownFrequency(raw) => write!(f, "unknown frequency selector {raw}"),
            ResolveError::UnknownSequence(raw) => write!(f, "unknown sequence selector {raw}"),
            ResolveError::UnknownPeakVoltage(raw) => {
                write!(f, "unknown peak voltage selector {raw}")
            }
            ResolveError::BatteryUnavailable => f.write_str("battery reading unavailable"),
        }
    }
}

/// Validated user selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Selection {
    pub frequency: FrequencyTier,
    pub sequence: SequenceId,
    pub peak_voltage: PeakVoltageTier,
}

impl Selection {
    /// Validates raw selector values, failing on the first unknown one.
    pub const fn from_raw(
        frequency: u8,
        sequence: u8,
        peak_voltage: u8,
    ) -> Result<Self, ResolveError> {
        let Some(frequency_tier) = FrequencyTier::from_raw(frequency) else {
            return Err(ResolveError::UnknownFrequency(frequency));
        };
        let Some(sequence_id) = SequenceId::from_raw(sequence) else {
            return Err(ResolveError::UnknownSequence(sequence));
        };
        let Some(peak_tier) = PeakVoltageTier::from_raw(peak_voltage) else {
            return Err(ResolveError::UnknownPeakVoltage(peak_voltage));
        };
        Ok(Self {
            frequency: frequency_tier,
            sequence: sequence_id,
            peak_voltage: peak_tier,
        })
    }

    /// Resolves the selection against the current battery voltage.
    pub fn resolve(self, battery_mv: u16) -> Result<PulseSequenceConfig, ResolveError> {
        let scale = amplitude_scale(self.peak_voltage, battery_mv)?;
        let profile = profile_for(self.sequence);
        let policy = self.frequency.policy();

        Ok(PulseSequenceConfig {
            selection: self,
            delays: PhaseDelays {
                hold_before: DelayUnits::from_micros(profile.hold_before_us),
                phase1: DelayUnits::from_micros(profile.phase1_us),
                phase2: DelayUnits::from_micros(profile.phase2_us),
                phase3: DelayUnits::from_micros(profile.phase3_us),
            },
            gap: DelayUnits::from_micros(profile.gap_us),
            divider: policy.divider,
            multiplicity: policy.multiplicity,
            scale,
        })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "freq={} seq={} peak={}",
            self.frequency, self.sequence, self.peak_voltage
        )
    }
}

/// Ratio applied to the base amplitude to hold peak voltage as the battery sags.
///
/// A battery at or above nominal needs no boost and yields exactly `1.0`.
pub fn battery_compensation(battery_mv: u16) -> Result<f32, ResolveError> {
    match battery_mv {
        0 => Err(ResolveError::BatteryUnavailable),
        mv if mv >= NOMINAL_BATTERY_MV => Ok(1.0),
        mv => Ok(f32::from(NOMINAL_BATTERY_MV) / f32::from(mv)),
    }
}

/// Amplitude scale for `tier` after battery compensation, capped at full swing.
pub fn amplitude_scale(
    tier: PeakVoltageTier,
    battery_mv: u16,
) -> Result<AmplitudeScale, ResolveError> {
    let compensation = battery_compensation(battery_mv)?;
    Ok(AmplitudeScale::saturating(tier.base_fraction() * compensation))
}

/// Phase holds of one pulse sequence in delay units.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PhaseDelays {
    pub hold_before: DelayUnits,
    pub phase1: DelayUnits,
    pub phase2: DelayUnits,
    pub phase3: DelayUnits,
}

/// Fully resolved pulse parameters. Replaced whole, never patched.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PulseSequenceConfig {
    selection: Selection,
    delays: PhaseDelays,
    gap: DelayUnits,
    divider: NonZeroU32,
    multiplicity: Multiplicity,
    scale: AmplitudeScale,
}

impl PulseSequenceConfig {
    pub const fn selection(&self) -> Selection {
        self.selection
    }

    pub const fn delays(&self) -> PhaseDelays {
        self.delays
    }

    pub const fn gap(&self) -> DelayUnits {
        self.gap
    }

    pub const fn divider(&self) -> NonZeroU32 {
        self.divider
    }

    pub const fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    pub const fn scale(&self) -> AmplitudeScale {
        self.scale
    }
}

/// Resolves raw selector values and a battery reading into a config.
pub fn resolve(
    frequency: u8,
    sequence: u8,
    peak_voltage: u8,
    battery_mv: u16,
) -> Result<PulseSequenceConfig, ResolveError> {
    Selection::from_raw(frequency, sequence, peak_voltage)?.resolve(battery_mv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_tiers_follow_policy_table() {
        let one = resolve(1, 1, 1, 3300).expect("valid");
        assert_eq!(one.divider().get(), 3);
        assert_eq!(one.multiplicity(), Multiplicity::Single);

        let two = resolve(2, 1, 1, 3300).expect("valid");
        assert_eq!(two.divider().get(), 3);
        assert_eq!(two.multiplicity(), Multiplicity::Double);

        let three = resolve(3, 1, 1, 3300).expect("valid");
        assert_eq!(three.divider().get(), 1);
        assert_eq!(three.multiplicity(), Multiplicity::Single);
    }

    #[test]
    fn unknown_selectors_fail_fast() {
        assert_eq!(resolve(0, 1, 1, 3300), Err(ResolveError::UnknownFrequency(0)));
        assert_eq!(resolve(4, 1, 1, 3300), Err(ResolveError::UnknownFrequency(4)));
        assert_eq!(resolve(1, 5, 1, 3300), Err(ResolveError::UnknownSequence(5)));
        assert_eq!(resolve(1, 1, 9, 3300), Err(ResolveError::UnknownPeakVoltage(9)));
        assert_eq!(resolve(7, 7, 7, 3300), Err(ResolveError::UnknownFrequency(7)));
    }

    #[test]
    fn zero_battery_is_rejected() {
        assert_eq!(resolve(1, 1, 1, 0), Err(ResolveError::BatteryUnavailable));
    }

    #[test]
    fn healthy_battery_keeps_base_fraction() {
        for raw in 1..=3 {
            let tier = PeakVoltageTier::from_raw(raw).expect("tier");
            for battery in [3300, 3600, u16::MAX] {
                let scale = amplitude_scale(tier, battery).expect("scale");
                assert_eq!(scale.value(), tier.base_fraction());
            }
        }
    }

    #[test]
    fn sagging_battery_boosts_then_caps() {
        let low = amplitude_scale(PeakVoltageTier::Low, 3000).expect("scale");
        let expected = (PeakVoltageTier::Low.base_fraction() * (3300.0 / 3000.0)).min(1.0);
        assert_eq!(low.value(), expected);
        assert!(low.value() > PeakVoltageTier::Low.base_fraction());

        let high = amplitude_scale(PeakVoltageTier::High, 3000).expect("scale");
        assert_eq!(high.value(), 1.0);

        let medium = amplitude_scale(PeakVoltageTier::Medium, 1).expect("scale");
        assert_eq!(medium.value(), 1.0);
    }

    #[test]
    fn resolution_is_idempotent() {
        let first = resolve(2, 3, 2, 3100);
        let second = resolve(2, 3, 2, 3100);
        assert_eq!(first, second);
    }

    #[test]
    fn delays_are_converted_from_profile() {
        let cfg = resolve(3, 2, 1, 3300).expect("valid");
        let delays = cfg.delays();
        assert_eq!(delays.hold_before, DelayUnits::ZERO);
        assert_eq!(delays.phase1, DelayUnits::from_micros(50));
        assert_eq!(delays.phase2, DelayUnits::from_micros(10));
        assert_eq!(delays.phase3, DelayUnits::from_micros(50));
        assert_eq!(cfg.gap(), DelayUnits::from_micros(390));
        assert_eq!(cfg.selection().sequence, SequenceId::Two);
    }

    struct CountingSensor {
        raw: u16,
        samples: usize,
    }

    impl crate::feedback::CurrentSensor for CountingSensor {
        fn sample(&mut self) -> u16 {
            self.samples += 1;
            self.raw
        }
    }

    #[test]
    fn empty_first_phase_keeps_previous_readout() {
        use crate::encoder::NoopActuator;
        use crate::engine::{NoopHold, PulseEngine};
        use crate::feedback::Readout;

        let cfg = resolve(3, 1, 1, 3300).expect("valid");
        let sensor = CountingSensor {
            raw: 1530,
            samples: 0,
        };
        let mut engine = PulseEngine::new(NoopActuator::new(), sensor, NoopHold);
        assert_eq!(engine.run_sequence(&cfg), Readout::with_current(10));
        assert_eq!(engine.sensor().samples, 1);

        let skipped = PulseSequenceConfig {
            delays: PhaseDelays {
                phase1: DelayUnits::ZERO,
                ..cfg.delays()
            },
            ..cfg
        };
        engine.sensor_mut().raw = 4095;
        assert_eq!(engine.run_sequence(&skipped), Readout::with_current(10));
        assert_eq!(engine.sensor().samples, 1);
        assert_eq!(engine.last_readout(), Readout::with_current(10));
    }
}
