//! Statistics over a trend series

/// Range of the finite values of a series.
///
/// Non-finite samples (missing CCT readings, damaged log rows) are skipped.
/// An all-missing series has `NaN` bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendStats {
    pub min: f64,
    pub max: f64,
}

impl Default for TrendStats {
    fn default() -> Self {
        Self {
            min: f64::NAN,
            max: f64::NAN,
        }
    }
}

impl TrendStats {
    pub fn from_values(values: &[f64]) -> Self {
        values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(Self::default(), |stats, value| {
                if stats.min.is_nan() {
                    Self {
                        min: value,
                        max: value,
                    }
                } else {
                    Self {
                        min: stats.min.min(value),
                        max: stats.max.max(value),
                    }
                }
            })
    }

    /// `max - min`; `NaN` for an all-missing series.
    pub fn extent(&self) -> f64 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_skip_missing_values() {
        let stats = TrendStats::from_values(&[3.0, f64::NAN, 1.0, 2.0]);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.extent(), 2.0);
    }

    #[test]
    fn test_stats_of_nothing() {
        let stats = TrendStats::from_values(&[f64::NAN]);
        assert!(stats.min.is_nan());
        assert!(stats.extent().is_nan());
    }
}
