use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, error, info};

use super::{Sensor, SensorError};

// =============================================================================
// I2C Address
// =============================================================================

/// BMP280 I2C address with SDO pulled high, as wired on the Enviro pHAT
pub const I2C_ADDR: u8 = 0x77;

// =============================================================================
// Register Addresses
// =============================================================================

const REG_CALIBRATION: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
/// press_msb, press_lsb, press_xlsb, temp_msb, temp_lsb, temp_xlsb
const REG_DATA: u8 = 0xF7;

const CHIP_ID: u8 = 0x58;
const CALIBRATION_LEN: usize = 24;
const STATUS_MEASURING: u8 = 0x08;

/// osrs_t = x1, osrs_p = x1, forced mode
const CTRL_MEAS_FORCED_X1: u8 = (0b001 << 5) | (0b001 << 2) | 0b01;

const MEASUREMENT_TIME_MS: u32 = 7;
const MAX_READY_ATTEMPTS: u32 = 5;

/// Factory trimming parameters, read once per sensor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calibration {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
}

impl Calibration {
    pub fn from_bytes(bytes: &[u8; CALIBRATION_LEN]) -> Self {
        let unsigned = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let signed = |i: usize| i16::from_le_bytes([bytes[i], bytes[i + 1]]);

        Self {
            dig_t1: unsigned(0),
            dig_t2: signed(2),
            dig_t3: signed(4),
            dig_p1: unsigned(6),
            dig_p2: signed(8),
            dig_p3: signed(10),
            dig_p4: signed(12),
            dig_p5: signed(14),
            dig_p6: signed(16),
            dig_p7: signed(18),
            dig_p8: signed(20),
            dig_p9: signed(22),
        }
    }

    /// Floating-point compensation from the BMP280 datasheet (section 8.1).
    ///
    /// Returns (degrees Celsius, pascals). Pressure is zero when the
    /// calibration would divide by zero.
    pub fn compensate(&self, adc_t: i32, adc_p: i32) -> (f64, f64) {
        let adc_t = f64::from(adc_t);
        let adc_p = f64::from(adc_p);
        let t1 = f64::from(self.dig_t1);

        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * f64::from(self.dig_t2);
        let var2 = (adc_t / 131_072.0 - t1 / 8192.0).powi(2) * f64::from(self.dig_t3);
        let t_fine = var1 + var2;
        let temperature = t_fine / 5120.0;

        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * f64::from(self.dig_p6) / 32768.0;
        var2 += var1 * f64::from(self.dig_p5) * 2.0;
        var2 = var2 / 4.0 + f64::from(self.dig_p4) * 65536.0;
        var1 = (f64::from(self.dig_p3) * var1 * var1 / 524_288.0
            + f64::from(self.dig_p2) * var1)
            / 524_288.0;
        var1 = (1.0 + var1 / 32768.0) * f64::from(self.dig_p1);
        if var1 == 0.0 {
            return (temperature, 0.0);
        }

        let mut pressure = 1_048_576.0 - adc_p;
        pressure = (pressure - var2 / 4096.0) * 6250.0 / var1;
        let var1 = f64::from(self.dig_p9) * pressure * pressure / 2_147_483_648.0;
        let var2 = pressure * f64::from(self.dig_p8) / 32768.0;
        pressure += (var1 + var2 + f64::from(self.dig_p7)) / 16.0;

        (temperature, pressure)
    }
}

/// Typed readings from the BMP280 sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BMP280Readings {
    pub temperature_celsius: f64,
    pub pressure_hpa: f64,
}

pub struct BMP280Sensor<I, D> {
    i2c: I,
    delay: D,
    calibration: Option<Calibration>,
}

impl<I: I2c, D: DelayNs> BMP280Sensor<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            calibration: None,
        }
    }

    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), SensorError> {
        self.i2c
            .write_read(I2C_ADDR, &[register], buffer)
            .map_err(|e| {
                error!("BMP280 read from {:#04x} failed: {:?}", register, e);
                SensorError::ReadFailed {
                    sensor: "BMP280",
                    operation: "read register",
                    details: "I2C communication error",
                }
            })
    }

    /// Check the chip id and load the trimming parameters.
    fn initialize(&mut self) -> Result<Calibration, SensorError> {
        let mut id = [0u8; 1];
        self.read_registers(REG_CHIP_ID, &mut id)?;
        if id[0] != CHIP_ID {
            return Err(SensorError::UnexpectedDevice {
                sensor: "BMP280",
                found: id[0],
            });
        }

        let mut raw = [0u8; CALIBRATION_LEN];
        self.read_registers(REG_CALIBRATION, &mut raw)?;
        let calibration = Calibration::from_bytes(&raw);
        if calibration.dig_t1 == 0 || calibration.dig_p1 == 0 {
            return Err(SensorError::InitializationFailed {
                sensor: "BMP280",
                details: "Calibration block is blank",
            });
        }

        info!("BMP280: calibration loaded");
        self.calibration = Some(calibration);
        Ok(calibration)
    }

    fn trigger_measurement(&mut self) -> Result<(), SensorError> {
        self.i2c
            .write(I2C_ADDR, &[REG_CTRL_MEAS, CTRL_MEAS_FORCED_X1])
            .map_err(|e| {
                error!("BMP280 forced measurement failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: "BMP280",
                    operation: "start forced measurement",
                    details: "I2C communication error",
                }
            })?;

        let mut status = [0u8; 1];
        for _ in 0..MAX_READY_ATTEMPTS {
            self.delay.delay_ms(MEASUREMENT_TIME_MS);
            self.read_registers(REG_STATUS, &mut status)?;
            if status[0] & STATUS_MEASURING == 0 {
                return Ok(());
            }
        }

        error!("BMP280 still measuring after {} attempts", MAX_READY_ATTEMPTS);
        Err(SensorError::Timeout {
            sensor: "BMP280",
            operation: "finish forced measurement",
        })
    }
}

impl<I: I2c, D: DelayNs> Sensor for BMP280Sensor<I, D> {
    type Readings = BMP280Readings;

    fn read(&mut self) -> Result<BMP280Readings, SensorError> {
        let calibration = match self.calibration {
            Some(calibration) => calibration,
            None => self.initialize()?,
        };
        self.trigger_measurement()?;

        let mut raw = [0u8; 6];
        self.read_registers(REG_DATA, &mut raw)?;
        let adc = |b: &[u8]| {
            (i32::from(b[0]) << 12) | (i32::from(b[1]) << 4) | (i32::from(b[2]) >> 4)
        };
        let adc_p = adc(&raw[0..3]);
        let adc_t = adc(&raw[3..6]);

        let (temperature_celsius, pressure_pa) = calibration.compensate(adc_t, adc_p);
        debug!(
            "BMP280: adc_t={} adc_p={} -> {:.2} C {:.2} Pa",
            adc_t, adc_p, temperature_celsius, pressure_pa
        );

        Ok(BMP280Readings {
            temperature_celsius,
            pressure_hpa: pressure_pa / 100.0,
        })
    }
}
