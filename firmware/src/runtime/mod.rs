use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel, AnyAdcChannel};
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::peripherals::ADC1;
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use static_cell::StaticCell;
use stim_core::encoder::LatchedActuator;
use stim_core::engagement::EngagementThresholds;
use stim_core::engine::{PulseEngine, SpinHold};
use stim_core::schedule::Stimulator;

use crate::config::{ConfigSlot, SettingsCell};
use crate::hw::battery::BatteryMonitor;
use crate::hw::{Digipot, LatchPin, SpiLink, StatusLeds};
use crate::telemetry::{self, TelemetryRecorder};

mod config_task;
mod pulse_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

const SYSCLK_HZ: u32 = 120_000_000;
const DIGIPOT_SPI_HZ: u32 = 10_000_000;

#[cfg(not(feature = "simulated-feedback"))]
type FeedbackSensor = crate::hw::AdcFeedback<'static>;
#[cfg(feature = "simulated-feedback")]
type FeedbackSensor = stim_core::feedback::RampFeedback;

pub(super) type FirmwareStimulator = Stimulator<Digipot<'static>, FeedbackSensor, SpinHold>;

pub(super) static CONFIG: ConfigSlot<CriticalSectionRawMutex> = ConfigSlot::new();
pub(super) static SETTINGS: SettingsCell<CriticalSectionRawMutex> = SettingsCell::new();
pub(super) static TELEMETRY: Mutex<CriticalSectionRawMutex, RefCell<TelemetryRecorder>> =
    Mutex::new(RefCell::new(TelemetryRecorder::new()));
static STIMULATOR: StaticCell<FirmwareStimulator> = StaticCell::new();

/// 8 MHz HSE through the PLL to a 120 MHz core clock, matching the
/// calibrated delay loop.
fn clock_config() -> hal::Config {
    use embassy_stm32::rcc::{
        AHBPrescaler, APBPrescaler, Hse, HseMode, Pll, PllMul, PllPDiv, PllPreDiv, PllQDiv,
        PllSource, Sysclk,
    };

    let mut config = hal::Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(8_000_000),
        mode: HseMode::Bypass,
    });
    config.rcc.pll_src = PllSource::HSE;
    config.rcc.pll = Some(Pll {
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL120,
        divp: Some(PllPDiv::DIV2),
        divq: Some(PllQDiv::DIV5),
        divr: None,
    });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV4;
    config.rcc.apb2_pre = APBPrescaler::DIV2;
    config
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let p = hal::init(clock_config());
    telemetry::log_boot(SYSCLK_HZ);

    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(DIGIPOT_SPI_HZ);
    let digipot = LatchedActuator::new(
        LatchPin::new(Output::new(p.PA4, Level::High, Speed::VeryHigh)),
        SpiLink::new(Spi::new_blocking_txonly(p.SPI1, p.PA5, p.PA7, spi_config)),
    );

    #[cfg(not(feature = "simulated-feedback"))]
    let sensor = {
        let channel: AnyAdcChannel<hal::peripherals::ADC2> = p.PA1.degrade_adc();
        crate::hw::AdcFeedback::new(Adc::new(p.ADC2), channel)
    };
    #[cfg(feature = "simulated-feedback")]
    let sensor = stim_core::feedback::RampFeedback::new(EngagementThresholds::default().run);

    let engine = PulseEngine::new(digipot, sensor, SpinHold);
    let stimulator = STIMULATOR.init(Stimulator::new(engine, EngagementThresholds::default()));

    let leds = StatusLeds::new(
        Output::new(p.PG14, Level::High, Speed::Low),
        Output::new(p.PG13, Level::Low, Speed::Low),
    );

    let battery_channel: AnyAdcChannel<ADC1> = p.PA2.degrade_adc();
    let battery = BatteryMonitor::new(Adc::new(p.ADC1), battery_channel);

    spawner
        .spawn(config_task::run(battery))
        .expect("failed to spawn config task");
    spawner
        .spawn(pulse_task::run(stimulator, leds))
        .expect("failed to spawn pulse task");

    core::future::pending::<()>().await;
}
