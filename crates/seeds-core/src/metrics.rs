//! Tracked metrics
//!
//! The subset of observation fields that get a trend sparkline, in the order
//! they are drawn on the image.

use crate::observation::Observation;

/// A numeric observation column with a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Degrees Celsius
    Temperature,
    /// Hectopascals
    Pressure,
    /// Sensor-native light level
    Light,
    /// Correlated colour temperature in Kelvin
    ColorTemperature,
}

impl Metric {
    /// Sparkline order, top to bottom.
    pub const TRACKED: [Metric; 4] = [
        Self::Temperature,
        Self::Pressure,
        Self::Light,
        Self::ColorTemperature,
    ];

    /// Get the display label for this metric
    pub const fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temp",
            Self::Pressure => "Press",
            Self::Light => "Light",
            Self::ColorTemperature => "CCT",
        }
    }

    /// Pull this metric's value out of an observation.
    pub fn value(self, observation: &Observation) -> f64 {
        match self {
            Self::Temperature => observation.temperature,
            Self::Pressure => observation.pressure,
            Self::Light => observation.light,
            Self::ColorTemperature => observation.cct,
        }
    }
}
