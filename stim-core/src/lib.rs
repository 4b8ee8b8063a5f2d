#![no_std]

// Real-time core of the STiM32 stimulator.
//
// Everything between the tick interrupt and the output word lives here
// without the standard library, so the STM32 firmware and the host emulator
// run the same logic.

pub mod encoder;
pub mod engagement;
pub mod engine;
pub mod feedback;
pub mod profiles;
pub mod resolver;
pub mod schedule;
pub mod settings;
pub mod status;
pub mod telemetry;
