#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The pulse task stores engagement state and the latest readout in atomics
//! after each executed tick; the config task stores the battery reading. Any
//! task can then build a `StatusSnapshot` without locking the tick path.

use portable_atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};
use stim_core::engagement::EngagementState;
use stim_core::feedback::Readout;
use stim_core::resolver::PulseSequenceConfig;
use stim_core::schedule::TickOutcome;
use stim_core::status::StatusSnapshot;

/// Battery reading in millivolts (0 == unknown).
static BATTERY_MV: AtomicU16 = AtomicU16::new(0);
static STATE: AtomicU8 = AtomicU8::new(0);
static CURRENT: AtomicU16 = AtomicU16::new(0);
static OVERLOAD: AtomicBool = AtomicBool::new(false);

const fn state_code(state: EngagementState) -> u8 {
    match state {
        EngagementState::Idle => 0,
        EngagementState::Run => 1,
        EngagementState::WaitingForRun => 2,
        EngagementState::WaitingForIdle => 3,
    }
}

const fn state_from_code(code: u8) -> EngagementState {
    match code {
        1 => EngagementState::Run,
        2 => EngagementState::WaitingForRun,
        3 => EngagementState::WaitingForIdle,
        _ => EngagementState::Idle,
    }
}

/// Stores the readout and state produced by an executed tick.
pub fn record_tick(outcome: &TickOutcome, state: EngagementState) {
    if let TickOutcome::Executed { readout, .. } = outcome {
        CURRENT.store(readout.current(), Ordering::Relaxed);
        OVERLOAD.store(readout.overload(), Ordering::Relaxed);
        STATE.store(state_code(state), Ordering::Relaxed);
    }
}

pub fn record_battery(battery_mv: u16) {
    BATTERY_MV.store(battery_mv, Ordering::Relaxed);
}

pub fn engagement_state() -> EngagementState {
    state_from_code(STATE.load(Ordering::Relaxed))
}

fn readout() -> Readout {
    if OVERLOAD.load(Ordering::Relaxed) {
        Readout::OVERLOAD
    } else {
        Readout::with_current(CURRENT.load(Ordering::Relaxed))
    }
}

/// Builds a [`StatusSnapshot`] from the stored values.
pub fn snapshot(config: Option<&PulseSequenceConfig>) -> StatusSnapshot {
    StatusSnapshot::new(
        engagement_state(),
        readout(),
        config,
        BATTERY_MV.load(Ordering::Relaxed),
    )
}
