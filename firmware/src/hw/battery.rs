//! Battery voltage sampling for amplitude compensation.
//!
//! The battery is read through a 2:1 divider on ADC1 and referenced against
//! VREFINT, so the reading stays correct as the analog supply itself sags.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

/// Supply voltage at which the factory VREFINT calibration was taken.
const VREFINT_CAL_MV: u32 = 3300;
/// Full-scale count of the 12-bit converter.
const ADC_FULL_SCALE: u32 = 4095;
/// Ratio of the battery sense divider.
const BATTERY_DIVIDER: u32 = 2;

/// Converts a battery sample into millivolts at the divider input.
///
/// Returns 0 when the VREFINT sample is missing, which the resolver treats
/// as an unavailable battery.
pub fn battery_millivolts(raw: u16, vrefint_raw: u16, vrefint_cal: u16) -> u16 {
    if vrefint_raw == 0 {
        return 0;
    }
    let vdda_mv = VREFINT_CAL_MV * u32::from(vrefint_cal) / u32::from(vrefint_raw);
    let pin_mv = u32::from(raw) * vdda_mv / ADC_FULL_SCALE;
    u16::try_from(pin_mv * BATTERY_DIVIDER).unwrap_or(u16::MAX)
}

#[cfg(target_os = "none")]
pub use monitor::BatteryMonitor;

#[cfg(target_os = "none")]
mod monitor {
    use core::ptr;

    use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime, VrefInt};
    use embassy_stm32::peripherals::ADC1;

    use super::battery_millivolts;

    /// Factory-programmed VREFINT calibration constant.
    const VREFINT_CAL_ADDR: *const u16 = 0x1FFF_7A2A as *const u16;

    fn read_vrefint_calibration() -> u16 {
        unsafe { ptr::read_volatile(VREFINT_CAL_ADDR) }
    }

    /// ADC1 wrapper producing calibrated battery readings.
    pub struct BatteryMonitor<'d> {
        adc: Adc<'d, ADC1>,
        vrefint: VrefInt,
        channel: AnyAdcChannel<ADC1>,
        calibration: u16,
        discard_next: bool,
    }

    impl<'d> BatteryMonitor<'d> {
        pub fn new(mut adc: Adc<'d, ADC1>, channel: AnyAdcChannel<ADC1>) -> Self {
            adc.set_sample_time(SampleTime::CYCLES480);
            let vrefint = adc.enable_vrefint();
            Self {
                adc,
                vrefint,
                channel,
                calibration: read_vrefint_calibration(),
                discard_next: true,
            }
        }

        pub fn read_millivolts(&mut self) -> u16 {
            if self.discard_next {
                let _ = self.adc.blocking_read(&mut self.vrefint);
                self.discard_next = false;
            }

            let vrefint_raw = self.adc.blocking_read(&mut self.vrefint);
            let raw = self.adc.blocking_read(&mut self.channel);
            battery_millivolts(raw, vrefint_raw, self.calibration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_supply_scales_through_divider() {
        // VDDA at the calibration voltage: VREFINT reads its calibration value.
        assert_eq!(battery_millivolts(2048, 1500, 1500), 3300);
        assert_eq!(battery_millivolts(4095, 1500, 1500), 6600);
        assert_eq!(battery_millivolts(0, 1500, 1500), 0);
    }

    #[test]
    fn sagging_supply_is_compensated() {
        // VDDA at 3.0 V makes VREFINT read 10% high.
        let mv = battery_millivolts(2048, 1650, 1500);
        assert_eq!(mv, 3000);
    }

    #[test]
    fn missing_reference_reads_as_unavailable() {
        assert_eq!(battery_millivolts(2048, 0, 1500), 0);
    }
}
