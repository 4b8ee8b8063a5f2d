//! User selections and the key/value store that persists them.
//!
//! Stores hold raw bytes where `0` means "never set". [`Settings::load`]
//! turns that sentinel into an explicit default; values that are set but
//! out of range are passed through so the resolver can reject them.

use core::fmt;

use crate::profiles::SequenceId;
use crate::resolver::{FrequencyTier, PeakVoltageTier, PulseSequenceConfig, ResolveError, resolve};

/// Raw value a store reports for a key that was never written.
pub const UNSET: u8 = 0;

pub const DEFAULT_FREQUENCY: FrequencyTier = FrequencyTier::ThreeKhz;
pub const DEFAULT_SEQUENCE: SequenceId = SequenceId::One;
pub const DEFAULT_PEAK_VOLTAGE: PeakVoltageTier = PeakVoltageTier::Low;

/// Persisted selection keys.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SettingKey {
    Frequency,
    Sequence,
    PeakVoltage,
}

impl SettingKey {
    pub const ALL: [SettingKey; 3] = [
        SettingKey::Frequency,
        SettingKey::Sequence,
        SettingKey::PeakVoltage,
    ];

    pub const fn as_index(self) -> usize {
        match self {
            SettingKey::Frequency => 0,
            SettingKey::Sequence => 1,
            SettingKey::PeakVoltage => 2,
        }
    }

    /// Raw value used when the key is unset.
    pub const fn default_raw(self) -> u8 {
        match self {
            SettingKey::Frequency => DEFAULT_FREQUENCY.to_raw(),
            SettingKey::Sequence => DEFAULT_SEQUENCE.to_raw(),
            SettingKey::PeakVoltage => DEFAULT_PEAK_VOLTAGE.to_raw(),
        }
    }

    /// Returns `true` when `value` names a known selector for this key.
    pub const fn accepts(self, value: u8) -> bool {
        match self {
            SettingKey::Frequency => FrequencyTier::from_raw(value).is_some(),
            SettingKey::Sequence => SequenceId::from_raw(value).is_some(),
            SettingKey::PeakVoltage => PeakVoltageTier::from_raw(value).is_some(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SettingKey::Frequency => "frequency",
            SettingKey::Sequence => "sequence",
            SettingKey::PeakVoltage => "peak",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when writing a selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SettingsError {
    InvalidValue { key: SettingKey, value: u8 },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::InvalidValue { key, value } => {
                write!(f, "{value} is not a valid {key} selector")
            }
        }
    }
}

/// Byte-per-key settings storage.
pub trait SettingsStore {
    fn read_raw(&self, key: SettingKey) -> u8;

    fn write_raw(&mut self, key: SettingKey, value: u8);

    /// Stored value, or `None` when the key was never set.
    fn get(&self, key: SettingKey) -> Option<u8> {
        match self.read_raw(key) {
            UNSET => None,
            value => Some(value),
        }
    }

    /// Validates and stores `value`. Writing [`UNSET`] clears the key.
    fn set(&mut self, key: SettingKey, value: u8) -> Result<(), SettingsError> {
        if value != UNSET && !key.accepts(value) {
            return Err(SettingsError::InvalidValue { key, value });
        }
        self.write_raw(key, value);
        Ok(())
    }
}

/// In-memory store; every key starts unset.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MemorySettingsStore {
    values: [u8; SettingKey::ALL.len()],
}

impl MemorySettingsStore {
    pub const fn new() -> Self {
        Self {
            values: [UNSET; SettingKey::ALL.len()],
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn read_raw(&self, key: SettingKey) -> u8 {
        self.values[key.as_index()]
    }

    fn write_raw(&mut self, key: SettingKey, value: u8) {
        self.values[key.as_index()] = value;
    }
}

/// Raw selections with defaults applied.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Settings {
    pub frequency: u8,
    pub sequence: u8,
    pub peak_voltage: u8,
}

impl Settings {
    pub fn load<S: SettingsStore + ?Sized>(store: &S) -> Self {
        let value = |key: SettingKey| store.get(key).unwrap_or(key.default_raw());
        Self {
            frequency: value(SettingKey::Frequency),
            sequence: value(SettingKey::Sequence),
            peak_voltage: value(SettingKey::PeakVoltage),
        }
    }

    pub fn resolve(&self, battery_mv: u16) -> Result<PulseSequenceConfig, ResolveError> {
        resolve(self.frequency, self.sequence, self.peak_voltage, battery_mv)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load(&MemorySettingsStore::new())
    }
}
