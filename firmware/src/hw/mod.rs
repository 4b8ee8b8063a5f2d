//! Board adapters that implement the `stim-core` capabilities.
//!
//! Pin map (STM32F429 board):
//!
//! | Signal            | Pin  | Peripheral   |
//! |-------------------|------|--------------|
//! | Digipot latch     | PA4  | GPIO         |
//! | Digipot clock     | PA5  | SPI1 SCK     |
//! | Digipot data      | PA7  | SPI1 MOSI    |
//! | Feedback current  | PA1  | ADC2         |
//! | Battery sense     | PA2  | ADC1         |
//! | Green LED         | PG13 | GPIO         |
//! | Red LED           | PG14 | GPIO         |

pub mod battery;

#[cfg(target_os = "none")]
pub use board::{AdcFeedback, Digipot, LatchPin, SpiLink, StatusLeds};

#[cfg(target_os = "none")]
mod board {
    use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
    use embassy_stm32::gpio::Output;
    use embassy_stm32::mode::Blocking;
    use embassy_stm32::peripherals::ADC2;
    use embassy_stm32::spi::{self, Spi};
    use stim_core::encoder::{LatchLine, LatchedActuator, WordLink};
    use stim_core::engagement::EngagementState;
    use stim_core::feedback::CurrentSensor;

    /// Latch-enable line of the digital potentiometer.
    pub struct LatchPin<'d>(Output<'d>);

    impl<'d> LatchPin<'d> {
        pub fn new(pin: Output<'d>) -> Self {
            Self(pin)
        }
    }

    impl LatchLine for LatchPin<'_> {
        fn set_low(&mut self) {
            self.0.set_low();
        }

        fn set_high(&mut self) {
            self.0.set_high();
        }
    }

    /// Transmit-only SPI link shifting one tap word per write.
    pub struct SpiLink<'d>(Spi<'d, Blocking>);

    impl<'d> SpiLink<'d> {
        pub fn new(spi: Spi<'d, Blocking>) -> Self {
            Self(spi)
        }
    }

    impl WordLink for SpiLink<'_> {
        type Error = spi::Error;

        fn transmit(&mut self, word: u8) -> Result<(), spi::Error> {
            self.0.blocking_write(&[word])
        }
    }

    pub type Digipot<'d> = LatchedActuator<LatchPin<'d>, SpiLink<'d>>;

    /// Mid-pulse current sense on ADC2.
    pub struct AdcFeedback<'d> {
        adc: Adc<'d, ADC2>,
        channel: AnyAdcChannel<ADC2>,
    }

    impl<'d> AdcFeedback<'d> {
        pub fn new(mut adc: Adc<'d, ADC2>, channel: AnyAdcChannel<ADC2>) -> Self {
            adc.set_sample_time(SampleTime::CYCLES15);
            Self { adc, channel }
        }
    }

    impl CurrentSensor for AdcFeedback<'_> {
        fn sample(&mut self) -> u16 {
            self.adc.blocking_read(&mut self.channel)
        }
    }

    /// Engagement indicator LEDs.
    pub struct StatusLeds<'d> {
        red: Output<'d>,
        green: Output<'d>,
    }

    impl<'d> StatusLeds<'d> {
        pub fn new(red: Output<'d>, green: Output<'d>) -> Self {
            let mut leds = Self { red, green };
            leds.show(EngagementState::Idle);
            leds
        }

        /// Applies the state's indicator; waiting states leave the LEDs alone.
        pub fn show(&mut self, state: EngagementState) {
            let Some(indicator) = state.indicator() else {
                return;
            };
            self.red.set_level(indicator.red.into());
            self.green.set_level(indicator.green.into());
        }
    }
}
