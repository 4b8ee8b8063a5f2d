//! Point-in-time status summary for operator displays and logs.

use core::fmt;

use crate::encoder::AmplitudeScale;
use crate::engagement::EngagementState;
use crate::feedback::Readout;
use crate::resolver::{PulseSequenceConfig, Selection};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub state: EngagementState,
    pub readout: Readout,
    pub selection: Option<Selection>,
    pub scale: AmplitudeScale,
    pub battery_mv: u16,
}

impl StatusSnapshot {
    pub fn new(
        state: EngagementState,
        readout: Readout,
        config: Option<&PulseSequenceConfig>,
        battery_mv: u16,
    ) -> Self {
        Self {
            state,
            readout,
            selection: config.map(PulseSequenceConfig::selection),
            scale: config.map_or(AmplitudeScale::ZERO, PulseSequenceConfig::scale),
            battery_mv,
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state={} current={}", self.state, self.readout.current())?;
        if self.readout.overload() {
            f.write_str(" OVERLOAD")?;
        }
        match self.selection {
            Some(selection) => write!(f, " {selection} scale={}", self.scale)?,
            None => f.write_str(" config=none")?,
        }
        write!(f, " battery={}mV", self.battery_mv)
    }
}
