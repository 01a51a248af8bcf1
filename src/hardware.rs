//! Pi peripherals: the Enviro pHAT on `/dev/i2c-1` and its LEDs on GPIO 4.

use anyhow::{Result, anyhow};
use embedded_hal::digital::PinState;
use linux_embedded_hal::{Delay, I2cdev, SysfsPin};
use log::{error, info, warn};

use seeds_core::sensors::{BMP280Sensor, EnviroBoard, SensorError, TCS3472Sensor};

use crate::leds::LedCountdown;

pub const I2C_BUS: &str = "/dev/i2c-1";
pub const LED_GPIO: u64 = 4;

pub type Board = EnviroBoard<TCS3472Sensor<I2cdev, Delay>, BMP280Sensor<I2cdev, Delay>>;

/// Open the bus once per sensor; the kernel serialises the transfers.
pub fn enviro_board() -> Result<Board, SensorError> {
    let open = || {
        I2cdev::new(I2C_BUS).map_err(|e| {
            error!("Failed to open {}: {:?}", I2C_BUS, e);
            SensorError::InitializationFailed {
                sensor: "Enviro pHAT",
                details: "I2C bus unavailable",
            }
        })
    };
    let light_bus = open()?;
    let weather_bus = open()?;

    Ok(EnviroBoard::new(
        TCS3472Sensor::new(light_bus, Delay),
        BMP280Sensor::new(weather_bus, Delay),
    ))
}

pub fn leds() -> Result<LedCountdown<SysfsPin, Delay>> {
    let pin = SysfsPin::new(LED_GPIO);
    pin.export().map_err(|e| anyhow!("{e:?}"))?;
    let pin = pin
        .into_output_pin(PinState::Low)
        .map_err(|e| anyhow!("{e:?}"))?;
    Ok(LedCountdown::new(pin, Delay))
}

/// Blink the countdown; a missing or busy GPIO only costs the warning.
pub fn countdown() {
    let result = leds().and_then(|mut leds| leds.countdown().map_err(|e| anyhow!("{e:?}")));
    match result {
        Ok(()) => info!("LED countdown done"),
        Err(e) => warn!("LED countdown skipped: {e:#}"),
    }
}
