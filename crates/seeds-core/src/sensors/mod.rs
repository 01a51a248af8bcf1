//! Sensor traits and the Enviro pHAT drivers.
//!
//! Drivers are written against the blocking `embedded-hal` 1.0 traits so they
//! run on the Pi through `linux-embedded-hal` and in tests against a fake bus.

mod bmp280;
mod tcs3472;

#[cfg(test)]
pub(crate) mod fake;

use log::error;
use thiserror::Error;

use crate::observation::Rgb;

pub use bmp280::{BMP280Readings, BMP280Sensor};
pub use tcs3472::{TCS3472Readings, TCS3472Sensor};

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("{sensor}: initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: {operation} failed: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: unexpected device id {found:#04x}")]
    UnexpectedDevice { sensor: &'static str, found: u8 },
    #[error("{sensor}: timed out waiting to {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
}

/// Trait for sensors that produce typed readings.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Readings;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> Result<Self::Readings, SensorError>;
}

/// Everything the sensing pass needs from the board, in display units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentReadings {
    /// Sensor-native light level
    pub light: f64,
    pub color: Rgb,
    /// Degrees Celsius
    pub temperature: f64,
    /// Hectopascals
    pub pressure: f64,
}

/// Source of environmental readings for one sensing pass.
pub trait EnvironmentSource {
    fn read_environment(&mut self) -> Result<EnvironmentReadings, SensorError>;
}

/// The Enviro pHAT: a light/colour sensor plus a weather sensor on one bus.
pub struct EnviroBoard<L, W> {
    light: L,
    weather: W,
}

impl<L, W> EnviroBoard<L, W>
where
    L: Sensor<Readings = TCS3472Readings>,
    W: Sensor<Readings = BMP280Readings>,
{
    pub fn new(light: L, weather: W) -> Self {
        Self { light, weather }
    }
}

impl<L, W> EnvironmentSource for EnviroBoard<L, W>
where
    L: Sensor<Readings = TCS3472Readings>,
    W: Sensor<Readings = BMP280Readings>,
{
    fn read_environment(&mut self) -> Result<EnvironmentReadings, SensorError> {
        let light = self.light.read().inspect_err(|e| {
            error!("Failed to read light sensor: {}", e);
        })?;
        let weather = self.weather.read().inspect_err(|e| {
            error!("Failed to read weather sensor: {}", e);
        })?;

        Ok(EnvironmentReadings {
            light: f64::from(light.clear),
            color: light.rgb(),
            temperature: weather.temperature_celsius,
            pressure: weather.pressure_hpa,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLight;
    struct FixedWeather;
    struct BrokenWeather;

    impl Sensor for FixedLight {
        type Readings = TCS3472Readings;

        fn read(&mut self) -> Result<TCS3472Readings, SensorError> {
            Ok(TCS3472Readings {
                clear: 1000,
                red: 500,
                green: 400,
                blue: 100,
            })
        }
    }

    impl Sensor for FixedWeather {
        type Readings = BMP280Readings;

        fn read(&mut self) -> Result<BMP280Readings, SensorError> {
            Ok(BMP280Readings {
                temperature_celsius: 19.5,
                pressure_hpa: 1002.25,
            })
        }
    }

    impl Sensor for BrokenWeather {
        type Readings = BMP280Readings;

        fn read(&mut self) -> Result<BMP280Readings, SensorError> {
            Err(SensorError::ReadFailed {
                sensor: "BMP280",
                operation: "read raw data",
                details: "bus error",
            })
        }
    }

    #[test]
    fn test_board_combines_both_sensors() {
        let mut board = EnviroBoard::new(FixedLight, FixedWeather);
        let readings = board.read_environment().unwrap();

        assert_eq!(readings.light, 1000.0);
        assert_eq!(readings.color, Rgb::new(127.5, 102.0, 25.5));
        assert_eq!(readings.temperature, 19.5);
        assert_eq!(readings.pressure, 1002.25);
    }

    #[test]
    fn test_board_propagates_sensor_failure() {
        let mut board = EnviroBoard::new(FixedLight, BrokenWeather);
        let err = board.read_environment().unwrap_err();

        assert!(matches!(err, SensorError::ReadFailed { sensor: "BMP280", .. }));
    }
}
