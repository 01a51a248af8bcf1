//! A single sensing pass, as logged and displayed.

use chrono::{NaiveDateTime, Timelike};

use crate::color;
use crate::sensors::EnvironmentReadings;

/// Timestamp format used in the log file and in archival file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Human-readable timestamp drawn on the annotated image.
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%H:%M, %a. %d %b %Y";

/// Colour reading on a 0-255 scale per channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Rgb {
    pub const fn new(red: f64, green: f64, blue: f64) -> Self {
        Self { red, green, blue }
    }

    /// Each channel rounded to one decimal place.
    pub fn rounded(self) -> Self {
        Self {
            red: round_to(self.red, 1),
            green: round_to(self.green, 1),
            blue: round_to(self.blue, 1),
        }
    }

    pub const fn channels(self) -> [f64; 3] {
        [self.red, self.green, self.blue]
    }
}

/// One row of the observation log.
///
/// Built once per invocation from the sensor readings, the disk probe and
/// the colour temperature estimate, then never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Local wall-clock time, truncated to the minute
    pub timestamp: NaiveDateTime,
    /// Degrees Celsius
    pub temperature: f64,
    /// Hectopascals
    pub pressure: f64,
    /// Sensor-native light level (TCS3472 clear channel count)
    pub light: f64,
    pub color: Rgb,
    /// Correlated colour temperature in Kelvin, `NaN` when out of domain
    pub cct: f64,
    /// Free space on the data volume in megabytes; absent for legacy rows
    pub free_disk_mb: Option<u64>,
}

impl Observation {
    /// Assemble an observation from fresh readings.
    ///
    /// Rounding follows the historical log: temperature and pressure to two
    /// decimals, colour channels to one, CCT to a whole Kelvin.
    pub fn from_readings(
        timestamp: NaiveDateTime,
        readings: &EnvironmentReadings,
        free_disk_mb: Option<u64>,
    ) -> Self {
        let color = readings.color.rounded();
        let cct = color::correlated_color_temperature(color).round();

        Self {
            timestamp: truncate_to_minute(timestamp),
            temperature: round_to(readings.temperature, 2),
            pressure: round_to(readings.pressure, 2),
            light: readings.light,
            color,
            cct,
            free_disk_mb,
        }
    }

    /// `YYYY-MM-DD-HH-MM`, as used in the log and file names.
    pub fn timestamp_label(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// `HH:MM, Ddd. DD Mon YYYY`, as drawn on the image.
    pub fn display_timestamp(&self) -> String {
        self.timestamp.format(DISPLAY_TIMESTAMP_FORMAT).to_string()
    }
}

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 2, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_from_readings_rounds_like_the_log() {
        let readings = EnvironmentReadings {
            light: 812.0,
            color: Rgb::new(120.04, 99.96, 80.56),
            temperature: 21.4567,
            pressure: 1013.2549,
        };

        let obs = Observation::from_readings(at(9, 30, 42), &readings, Some(2048));

        assert_eq!(obs.timestamp, at(9, 30, 0));
        assert_eq!(obs.temperature, 21.46);
        assert_eq!(obs.pressure, 1013.25);
        assert_eq!(obs.color, Rgb::new(120.0, 100.0, 80.6));
        assert_eq!(obs.cct, obs.cct.round());
        assert_eq!(obs.free_disk_mb, Some(2048));
    }

    #[test]
    fn test_timestamp_labels() {
        let readings = EnvironmentReadings::default();
        let obs = Observation::from_readings(at(9, 5, 0), &readings, None);

        assert_eq!(obs.timestamp_label(), "2017-02-14-09-05");
        assert_eq!(obs.display_timestamp(), "09:05, Tue. 14 Feb 2017");
    }
}
