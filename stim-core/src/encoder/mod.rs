//! Output encoder for the 7-bit analog actuator.
//!
//! The actuator is a digital potentiometer whose tap range straddles the
//! zero-output point. Symbolic output levels are mapped to tap positions
//! around [`CENTER_TAP`] and scaled by the resolved amplitude.

use core::fmt;

/// Largest control word the actuator accepts.
pub const CONTROL_WORD_MAX: u8 = 0x7F;
/// Tap position that produces zero output.
pub const CENTER_TAP: u8 = 64;
/// Tap offset from center at full scale.
pub const FULL_SCALE_TAPS: u8 = 63;
/// Tap offset from center at half scale.
pub const HALF_SCALE_TAPS: u8 = 32;

/// Symbolic output level requested by the pulse engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputLevel {
    PositiveMax,
    PositiveHalf,
    Zero,
    NegativeHalf,
    NegativeMax,
}

/// Amplitude multiplier, always within `[0, 1]`.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct AmplitudeScale(f32);

impl AmplitudeScale {
    pub const ZERO: Self = Self(0.0);
    pub const FULL: Self = Self(1.0);

    /// Builds a scale, clamping into `[0, 1]`. NaN maps to zero.
    #[must_use]
    pub fn saturating(value: f32) -> Self {
        if value.is_nan() {
            Self::ZERO
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub const fn value(self) -> f32 {
        self.0
    }
}

impl fmt::Display for AmplitudeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// 7-bit actuator control word.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct ControlWord(u8);

impl ControlWord {
    /// Word that rests the output at zero.
    pub const ZERO: Self = Self(CENTER_TAP);

    /// Wraps a raw word, rejecting values outside the 7-bit range.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= CONTROL_WORD_MAX {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_offset(taps: u8, scale: AmplitudeScale) -> u8 {
    // Truncates toward zero; scale <= 1 keeps the result within `taps`.
    (f32::from(taps) * scale.value()) as u8
}

/// Maps a symbolic level and amplitude onto an actuator control word.
#[must_use]
pub fn encode(level: OutputLevel, scale: AmplitudeScale) -> ControlWord {
    let word = match level {
        OutputLevel::PositiveMax => CENTER_TAP + scaled_offset(FULL_SCALE_TAPS, scale),
        OutputLevel::PositiveHalf => CENTER_TAP + scaled_offset(HALF_SCALE_TAPS, scale),
        OutputLevel::Zero => CENTER_TAP,
        OutputLevel::NegativeHalf => CENTER_TAP - scaled_offset(HALF_SCALE_TAPS, scale),
        OutputLevel::NegativeMax => CENTER_TAP - scaled_offset(FULL_SCALE_TAPS, scale),
    };
    ControlWord(word)
}

/// Capability for the analog output actuator.
///
/// `commit` is best-effort. Implementations start the latch transaction and
/// return without confirming that the actuator applied the word, and no
/// failure is reported. A dropped write is corrected by the next phase,
/// which re-asserts its own level.
pub trait OutputActuator {
    /// Latches `word` into the actuator.
    fn commit(&mut self, word: ControlWord);
}

/// Actuator that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopActuator;

impl NoopActuator {
    /// Creates a new no-op actuator.
    pub const fn new() -> Self {
        Self
    }
}

impl OutputActuator for NoopActuator {
    fn commit(&mut self, _: ControlWord) {}
}

/// Latch-enable line guarding the actuator's input register.
pub trait LatchLine {
    fn set_low(&mut self);
    fn set_high(&mut self);
}

/// Serial link that shifts a control word into the actuator.
pub trait WordLink {
    type Error;

    fn transmit(&mut self, word: u8) -> Result<(), Self::Error>;
}

/// Two-step latched actuator: latch low, shift the word, latch high.
///
/// The rising edge of the latch line commits the new tap position.
pub struct LatchedActuator<L, W> {
    latch: L,
    link: W,
}

impl<L: LatchLine, W: WordLink> LatchedActuator<L, W> {
    pub fn new(mut latch: L, link: W) -> Self {
        latch.set_high();
        Self { latch, link }
    }

    pub fn into_parts(self) -> (L, W) {
        (self.latch, self.link)
    }
}

impl<L: LatchLine, W: WordLink> OutputActuator for LatchedActuator<L, W> {
    fn commit(&mut self, word: ControlWord) {
        self.latch.set_low();
        // Transmission errors are not surfaced; see `OutputActuator`.
        let _ = self.link.transmit(word.value());
        self.latch.set_high();
    }
}
