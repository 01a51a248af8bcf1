//! Raspberry Pi side of the seeds-rs jobs: board wiring and the LED countdown.

pub mod hardware;
pub mod job;
pub mod leds;
