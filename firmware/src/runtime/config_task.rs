use embassy_futures::select::{Either, select};
use embassy_time::Timer;
use stim_core::resolver::{ResolveError, battery_compensation};
use stim_core::settings::Settings;

use super::{CONFIG, SETTINGS, TELEMETRY};
use crate::config::BATTERY_POLL_INTERVAL;
use crate::hw::battery::BatteryMonitor;
use crate::status;
use crate::telemetry::{self, FirmwareInstant};

#[embassy_executor::task]
pub async fn run(mut battery: BatteryMonitor<'static>) -> ! {
    let mut last_battery_mv = 0;
    let mut last_error: Option<ResolveError> = None;

    loop {
        let battery_mv = battery.read_millivolts();
        status::record_battery(battery_mv);
        if battery_mv != last_battery_mv {
            if let Ok(compensation) = battery_compensation(battery_mv) {
                telemetry::log_battery(battery_mv, compensation);
            }
            last_battery_mv = battery_mv;
        }

        last_error = apply(SETTINGS.load(), battery_mv, last_error);

        match select(SETTINGS.changed(), Timer::after(BATTERY_POLL_INTERVAL)).await {
            Either::First(_) | Either::Second(()) => {}
        }
    }
}

/// Resolves and publishes; returns the rejection that is now current, if any.
fn apply(
    settings: Settings,
    battery_mv: u16,
    last_error: Option<ResolveError>,
) -> Option<ResolveError> {
    let now = FirmwareInstant::now();
    match settings.resolve(battery_mv) {
        Ok(cfg) => {
            if CONFIG.snapshot() != Some(cfg) {
                CONFIG.publish(cfg);
                TELEMETRY.lock(|recorder| {
                    telemetry::config_applied(&mut recorder.borrow_mut(), &cfg, battery_mv, now);
                });
            }
            None
        }
        Err(error) => {
            if last_error != Some(error) {
                TELEMETRY.lock(|recorder| {
                    telemetry::config_rejected(&mut recorder.borrow_mut(), error, now);
                });
            }
            Some(error)
        }
    }
}
