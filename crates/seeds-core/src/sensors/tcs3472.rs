use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, error, info};

use super::{Sensor, SensorError};
use crate::observation::Rgb;

// =============================================================================
// I2C Address
// =============================================================================

/// TCS3472 I2C address
pub const I2C_ADDR: u8 = 0x29;

// =============================================================================
// Register Addresses
// =============================================================================

/// Command bit, must be set on every register access
const COMMAND: u8 = 0x80;
/// Auto-increment protocol for multi-byte reads
const AUTO_INCREMENT: u8 = 0x20;

const REG_ENABLE: u8 = 0x00;
const REG_ATIME: u8 = 0x01;
const REG_CONTROL: u8 = 0x0F;
const REG_ID: u8 = 0x12;
const REG_STATUS: u8 = 0x13;
/// Clear, red, green, blue little-endian words follow in that order
const REG_CDATAL: u8 = 0x14;

const ENABLE_POWER_ON: u8 = 0x01;
const ENABLE_RGBC: u8 = 0x02;
const STATUS_AVALID: u8 = 0x01;

/// TCS34721/TCS34725 and TCS34723/TCS34727
const KNOWN_IDS: [u8; 2] = [0x44, 0x4D];

// =============================================================================
// Measurement Parameters
// =============================================================================

/// 511.2 ms at 2.4 ms per integration cycle
const INTEGRATION_CYCLES: u8 = 213;
const INTEGRATION_TIME_MS: u32 = 512;
const POWER_ON_SETTLE_MS: u32 = 3;
const READY_POLL_INTERVAL_MS: u32 = 100;
const MAX_READY_ATTEMPTS: u32 = 5;

/// AGAIN field of the control register: 4x analog gain
const CONTROL_GAIN_X4: u8 = 0b01;

/// Raw channel counts from one RGBC integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TCS3472Readings {
    pub clear: u16,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl TCS3472Readings {
    /// Colour channels scaled against the clear channel onto 0-255.
    ///
    /// A dark reading (clear == 0) has no colour and comes back as black.
    pub fn rgb(&self) -> Rgb {
        if self.clear == 0 {
            return Rgb::default();
        }
        let clear = f64::from(self.clear);
        let scale = |channel: u16| f64::from(channel) * 255.0 / clear;

        Rgb::new(scale(self.red), scale(self.green), scale(self.blue))
    }
}

pub struct TCS3472Sensor<I, D> {
    i2c: I,
    delay: D,
    initialized: bool,
}

impl<I: I2c, D: DelayNs> TCS3472Sensor<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            initialized: false,
        }
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(I2C_ADDR, &[COMMAND | register, value])
            .map_err(|e| {
                error!("TCS3472 write to {:#04x} failed: {:?}", register, e);
                SensorError::ReadFailed {
                    sensor: "TCS3472",
                    operation: "write register",
                    details: "I2C communication error",
                }
            })
    }

    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), SensorError> {
        self.i2c
            .write_read(I2C_ADDR, &[COMMAND | AUTO_INCREMENT | register], buffer)
            .map_err(|e| {
                error!("TCS3472 read from {:#04x} failed: {:?}", register, e);
                SensorError::ReadFailed {
                    sensor: "TCS3472",
                    operation: "read register",
                    details: "I2C communication error",
                }
            })
    }

    /// Verify the part, configure integration and gain, then power up.
    fn initialize(&mut self) -> Result<(), SensorError> {
        let mut id = [0u8; 1];
        self.read_registers(REG_ID, &mut id)?;
        if !KNOWN_IDS.contains(&id[0]) {
            return Err(SensorError::UnexpectedDevice {
                sensor: "TCS3472",
                found: id[0],
            });
        }

        self.write_register(REG_ATIME, 0u8.wrapping_sub(INTEGRATION_CYCLES))?;
        self.write_register(REG_CONTROL, CONTROL_GAIN_X4)?;
        self.write_register(REG_ENABLE, ENABLE_POWER_ON)?;
        self.delay.delay_ms(POWER_ON_SETTLE_MS);
        self.write_register(REG_ENABLE, ENABLE_POWER_ON | ENABLE_RGBC)?;

        info!("TCS3472: powered on, gain 4x");

        // The first result is only valid after a full integration cycle
        self.delay.delay_ms(INTEGRATION_TIME_MS);
        self.initialized = true;
        Ok(())
    }

    fn wait_for_data(&mut self) -> Result<(), SensorError> {
        let mut status = [0u8; 1];
        for _ in 0..MAX_READY_ATTEMPTS {
            self.read_registers(REG_STATUS, &mut status)?;
            if status[0] & STATUS_AVALID != 0 {
                return Ok(());
            }
            self.delay.delay_ms(READY_POLL_INTERVAL_MS);
        }

        error!("TCS3472 data not ready after {} attempts", MAX_READY_ATTEMPTS);
        Err(SensorError::Timeout {
            sensor: "TCS3472",
            operation: "wait for a valid RGBC integration",
        })
    }
}

impl<I: I2c, D: DelayNs> Sensor for TCS3472Sensor<I, D> {
    type Readings = TCS3472Readings;

    fn read(&mut self) -> Result<TCS3472Readings, SensorError> {
        if !self.initialized {
            self.initialize()?;
        }
        self.wait_for_data()?;

        let mut raw = [0u8; 8];
        self.read_registers(REG_CDATAL, &mut raw)?;
        let word = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);

        let readings = TCS3472Readings {
            clear: word(0),
            red: word(2),
            green: word(4),
            blue: word(6),
        };
        debug!("TCS3472: {:?}", readings);

        Ok(readings)
    }
}
