//! Firmware telemetry ring and logging helpers.
//!
//! Records tick outcomes into the shared `stim-core` ring and mirrors every
//! recorded event to defmt (or stdout on host builds), so the tick path never
//! formats log lines for ticks that changed nothing.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::time::Duration;

use embassy_time::Instant;
use stim_core::engagement::Transition;
use stim_core::resolver::{PulseSequenceConfig, ResolveError};
use stim_core::schedule::TickOutcome;
use stim_core::status::StatusSnapshot;
use stim_core::telemetry::{self as core_telemetry, TelemetryEventKind, TelemetryInstant};

/// Monotonic timestamp backed by the embassy time driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        Duration::from_micros(elapsed.as_micros())
    }
}

pub type TelemetryRecorder = core_telemetry::TelemetryRecorder<FirmwareInstant>;

/// Records a tick outcome and logs whatever it added to the ring.
pub fn observe_tick(recorder: &mut TelemetryRecorder, outcome: &TickOutcome, now: FirmwareInstant) {
    let written = recorder.observe_tick(outcome, now);
    if written == 0 {
        return;
    }

    let overload_edge = written > 1 || outcome.transition().is_none();
    if overload_edge {
        log_overload(recorder.overload_active(), now);
    }
    if let Some(transition) = outcome.transition() {
        let dwell = recorder.latest().and_then(|record| record.dwell);
        log_transition(transition, dwell, now);
    }
}

/// Records and logs a freshly published configuration.
pub fn config_applied(
    recorder: &mut TelemetryRecorder,
    cfg: &PulseSequenceConfig,
    battery_mv: u16,
    now: FirmwareInstant,
) {
    recorder.record(TelemetryEventKind::ConfigApplied(cfg.selection()), now);
    log_config_applied(cfg, battery_mv);
}

/// Records and logs a resolver rejection. The previous config stays live.
pub fn config_rejected(recorder: &mut TelemetryRecorder, error: ResolveError, now: FirmwareInstant) {
    recorder.record(TelemetryEventKind::ConfigRejected(error), now);
    log_config_rejected(error);
}

#[cfg(target_os = "none")]
pub fn log_boot(sysclk_hz: u32) {
    defmt::info!("stim32: boot sysclk={}Hz", sysclk_hz);
}

#[cfg(not(target_os = "none"))]
pub fn log_boot(sysclk_hz: u32) {
    println!("stim32: boot sysclk={sysclk_hz}Hz");
}

#[cfg(target_os = "none")]
fn log_transition(transition: Transition, dwell: Option<Duration>, now: FirmwareInstant) {
    let t = now.into_embassy().as_micros();
    match dwell {
        Some(dwell) => defmt::info!(
            "engagement: {} -> {} t={}us dwell={}us",
            transition.from.as_str(),
            transition.to.as_str(),
            t,
            u64::try_from(dwell.as_micros()).unwrap_or(u64::MAX)
        ),
        None => defmt::info!(
            "engagement: {} -> {} t={}us",
            transition.from.as_str(),
            transition.to.as_str(),
            t
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn log_transition(transition: Transition, dwell: Option<Duration>, now: FirmwareInstant) {
    let t = now.into_embassy().as_micros();
    match dwell {
        Some(dwell) => println!(
            "engagement: {transition} t={t}us dwell={}us",
            dwell.as_micros()
        ),
        None => println!("engagement: {transition} t={t}us"),
    }
}

#[cfg(target_os = "none")]
fn log_overload(active: bool, now: FirmwareInstant) {
    let t = now.into_embassy().as_micros();
    if active {
        defmt::warn!("feedback: overload asserted t={}us", t);
    } else {
        defmt::info!("feedback: overload cleared t={}us", t);
    }
}

#[cfg(not(target_os = "none"))]
fn log_overload(active: bool, now: FirmwareInstant) {
    let t = now.into_embassy().as_micros();
    let edge = if active { "asserted" } else { "cleared" };
    println!("feedback: overload {edge} t={t}us");
}

#[cfg(target_os = "none")]
fn log_config_applied(cfg: &PulseSequenceConfig, battery_mv: u16) {
    let selection = cfg.selection();
    defmt::info!(
        "config: freq={}kHz seq={} peak={} divider={} pulses={} scale={} battery={}mV",
        selection.frequency.to_raw(),
        selection.sequence.to_raw(),
        selection.peak_voltage.to_raw(),
        cfg.divider().get(),
        cfg.multiplicity().pulses(),
        cfg.scale().value(),
        battery_mv
    );
}

#[cfg(not(target_os = "none"))]
fn log_config_applied(cfg: &PulseSequenceConfig, battery_mv: u16) {
    println!(
        "config: {} divider={} {} scale={} battery={battery_mv}mV",
        cfg.selection(),
        cfg.divider(),
        cfg.multiplicity(),
        cfg.scale()
    );
}

#[cfg(target_os = "none")]
fn log_config_rejected(error: ResolveError) {
    defmt::error!(
        "config: rejected ({}); keeping previous snapshot",
        defmt::Display2Format(&error)
    );
}

#[cfg(not(target_os = "none"))]
fn log_config_rejected(error: ResolveError) {
    eprintln!("config: rejected ({error}); keeping previous snapshot");
}

#[cfg(target_os = "none")]
pub fn log_battery(battery_mv: u16, compensation: f32) {
    defmt::debug!(
        "battery: {}mV compensation={}",
        battery_mv,
        compensation
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_battery(battery_mv: u16, compensation: f32) {
    println!("battery: {battery_mv}mV compensation={compensation:.3}");
}

#[cfg(target_os = "none")]
pub fn log_status(snapshot: &StatusSnapshot) {
    defmt::info!("status: {}", defmt::Display2Format(snapshot));
}

#[cfg(not(target_os = "none"))]
pub fn log_status(snapshot: &StatusSnapshot) {
    println!("status: {snapshot}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use stim_core::engagement::EngagementState;
    use stim_core::feedback::Readout;
    use stim_core::resolver::resolve;

    fn micros(value: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_micros(value))
    }

    #[test]
    fn firmware_instant_reports_elapsed_micros() {
        let elapsed = micros(1_250).saturating_duration_since(micros(1_000));
        assert_eq!(elapsed.as_micros(), 250);
        assert_eq!(micros(5).saturating_duration_since(micros(10)), Duration::ZERO);
    }

    #[test]
    fn tick_outcomes_land_in_the_ring() {
        let mut recorder = TelemetryRecorder::new();
        let outcome = TickOutcome::Executed {
            readout: Readout::OVERLOAD,
            pulses: 1,
            transition: Some(Transition {
                from: EngagementState::Run,
                to: EngagementState::WaitingForIdle,
            }),
        };

        observe_tick(&mut recorder, &outcome, micros(10));
        observe_tick(&mut recorder, &TickOutcome::Skipped, micros(20));

        assert_eq!(recorder.len(), 2);
        assert!(recorder.overload_active());
    }

    #[test]
    fn config_events_are_recorded() {
        let mut recorder = TelemetryRecorder::new();
        let cfg = resolve(1, 2, 3, 3300).expect("valid selection");
        config_applied(&mut recorder, &cfg, 3300, micros(1));
        config_rejected(&mut recorder, ResolveError::UnknownSequence(9), micros(2));

        let events: heapless::Vec<TelemetryEventKind, 2> =
            recorder.oldest_first().map(|record| record.event).collect();
        assert_eq!(
            events.as_slice(),
            &[
                TelemetryEventKind::ConfigApplied(cfg.selection()),
                TelemetryEventKind::ConfigRejected(ResolveError::UnknownSequence(9)),
            ]
        );
    }
}
