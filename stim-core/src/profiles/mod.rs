//! Pulse profile table shared by firmware and host targets.
//!
//! Each profile describes the phase timing of one pulse sequence in
//! microseconds:
//!
//! ```text
//!              phase-1
//!             ---------
//!             |       |   phase-2
//! hold-before |       |------------|       |------ gap ------
//! ------------|                    |       |
//!                                  ---------
//!                                   phase-3
//! ```
//!
//! The resolver converts these durations into delay units once per
//! configuration change, so nothing in this module runs on the tick path.

use core::fmt;

/// Number of selectable pulse profiles.
pub const PROFILE_COUNT: usize = 4;

/// Output period the double-pulse gap is sized against (the 2 kHz tier).
///
/// Every profile satisfies `pulse_us() + gap_us == DOUBLE_PULSE_PERIOD_US`
/// so the second pulse of a doubled tick starts half a millisecond after
/// the first.
pub const DOUBLE_PULSE_PERIOD_US: u32 = 500;

/// Identifier for a pulse profile (stored as 1-4).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceId {
    One,
    Two,
    Three,
    Four,
}

impl SequenceId {
    /// Deterministic index for lookups into [`PROFILE_TABLE`].
    pub const fn as_index(self) -> usize {
        match self {
            SequenceId::One => 0,
            SequenceId::Two => 1,
            SequenceId::Three => 2,
            SequenceId::Four => 3,
        }
    }

    /// Attempts to construct a [`SequenceId`] from a raw index.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(SequenceId::One),
            1 => Some(SequenceId::Two),
            2 => Some(SequenceId::Three),
            3 => Some(SequenceId::Four),
            _ => None,
        }
    }

    /// Decodes the selector value used by the settings store.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1..=4 => Self::from_index(raw as usize - 1),
            _ => None,
        }
    }

    /// Encodes the selector value used by the settings store.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn to_raw(self) -> u8 {
        self.as_index() as u8 + 1
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq{}", self.to_raw())
    }
}

/// Phase timing for one pulse sequence, in microseconds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PulseProfile {
    pub id: SequenceId,
    pub hold_before_us: u16,
    pub phase1_us: u16,
    pub phase2_us: u16,
    pub phase3_us: u16,
    pub gap_us: u16,
}

impl PulseProfile {
    pub const fn new(
        id: SequenceId,
        hold_before_us: u16,
        phase1_us: u16,
        phase2_us: u16,
        phase3_us: u16,
        gap_us: u16,
    ) -> Self {
        Self {
            id,
            hold_before_us,
            phase1_us,
            phase2_us,
            phase3_us,
            gap_us,
        }
    }

    /// Total time spent inside one sequence, excluding the gap.
    pub const fn pulse_us(&self) -> u32 {
        self.hold_before_us as u32
            + self.phase1_us as u32
            + self.phase2_us as u32
            + self.phase3_us as u32
    }

    /// Returns `true` when the negative phase is part of the sequence.
    pub const fn is_biphasic(&self) -> bool {
        self.phase3_us > 0
    }
}

/// Compile-time catalog of every pulse profile.
pub const PROFILE_TABLE: [PulseProfile; PROFILE_COUNT] = [
    // Monophasic: long positive phase, no negative phase.
    PulseProfile::new(SequenceId::One, 0, 200, 50, 0, 250),
    // Symmetric biphasic with a short interphase rest.
    PulseProfile::new(SequenceId::Two, 0, 50, 10, 50, 390),
    // Narrow phases separated by a wide interphase rest.
    PulseProfile::new(SequenceId::Three, 0, 10, 90, 10, 390),
    // Wide symmetric biphasic.
    PulseProfile::new(SequenceId::Four, 0, 100, 20, 100, 280),
];

/// Retrieve a profile by identifier.
pub const fn profile_for(id: SequenceId) -> PulseProfile {
    PROFILE_TABLE[id.as_index()]
}
