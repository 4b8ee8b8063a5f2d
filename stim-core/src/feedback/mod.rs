//! Feedback transform from raw 12-bit current samples to calibrated readouts.
//!
//! The linearisation is deliberately lossy: samples below the offset are
//! treated as "no contact" rather than errors, and a saturated converter is
//! reported as an overload with the current forced to zero.

pub mod simulated;

pub use simulated::RampFeedback;

/// Raw samples below this value read as zero current.
pub const FEEDBACK_OFFSET: u16 = 1500;
/// Raw counts per readout unit above the offset.
pub const FEEDBACK_SCALE: u16 = 3;
/// Full-scale raw sample; the converter has saturated.
pub const FEEDBACK_SATURATION: u16 = 4095;
/// Largest current that can be reported without overload.
pub const MAX_READOUT_CURRENT: u16 = (FEEDBACK_SATURATION - 1 - FEEDBACK_OFFSET) / FEEDBACK_SCALE;

/// Synchronous 12-bit current sensor.
pub trait CurrentSensor {
    /// Takes one sample; blocks until the conversion completes.
    fn sample(&mut self) -> u16;
}

/// Calibrated feedback current plus overload flag.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Readout {
    current: u16,
    overload: bool,
}

impl Readout {
    /// Readout reported before any sample was taken.
    pub const NONE: Self = Self {
        current: 0,
        overload: false,
    };

    /// Readout for a saturated sensor. Current is always zero.
    pub const OVERLOAD: Self = Self {
        current: 0,
        overload: true,
    };

    /// Non-overloaded readout with the given current.
    pub const fn with_current(current: u16) -> Self {
        Self {
            current,
            overload: false,
        }
    }

    pub const fn current(self) -> u16 {
        self.current
    }

    pub const fn overload(self) -> bool {
        self.overload
    }
}

/// Converts a raw sample into a calibrated [`Readout`].
///
/// Samples above the 12-bit range are treated as saturated.
pub const fn transform(raw: u16) -> Readout {
    if raw >= FEEDBACK_SATURATION {
        Readout::OVERLOAD
    } else if raw < FEEDBACK_OFFSET {
        Readout::NONE
    } else {
        Readout::with_current((raw - FEEDBACK_OFFSET) / FEEDBACK_SCALE)
    }
}

/// Smallest raw sample that [`transform`]s to `current`.
///
/// Currents beyond [`MAX_READOUT_CURRENT`] clamp to the smallest sample
/// that reads as [`MAX_READOUT_CURRENT`].
pub const fn raw_for_current(current: u16) -> u16 {
    let current = if current > MAX_READOUT_CURRENT {
        MAX_READOUT_CURRENT
    } else {
        current
    };
    FEEDBACK_OFFSET + current * FEEDBACK_SCALE
}
