use embassy_time::{Duration, Ticker};
use stim_core::engagement::EngagementState;
use stim_core::schedule::TICK_RATE_HZ;

use super::{CONFIG, FirmwareStimulator, TELEMETRY};
use crate::hw::StatusLeds;
use crate::status;
use crate::telemetry::{self, FirmwareInstant};

#[embassy_executor::task]
pub async fn run(stimulator: &'static mut FirmwareStimulator, mut leds: StatusLeds<'static>) -> ! {
    let mut ticker = Ticker::every(Duration::from_hz(u64::from(TICK_RATE_HZ)));

    loop {
        ticker.next().await;

        // Output stays parked at zero until the first config resolves.
        let Some(cfg) = CONFIG.snapshot() else {
            continue;
        };

        let outcome = stimulator.on_tick(&cfg);
        if !outcome.is_executed() {
            continue;
        }

        let state = stimulator.state();
        status::record_tick(&outcome, state);
        let now = FirmwareInstant::now();
        TELEMETRY.lock(|recorder| {
            telemetry::observe_tick(&mut recorder.borrow_mut(), &outcome, now);
        });

        if outcome.transition().is_some() {
            leds.show(state);
            if matches!(state, EngagementState::Idle | EngagementState::Run) {
                telemetry::log_status(&status::snapshot(Some(&cfg)));
            }
        }
    }
}
