use core::fmt;

use super::stats::TrendStats;
use crate::metrics::Metric;

/// Block glyphs from lowest to highest level
pub const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Highest level index
const TOP_LEVEL: f64 = (GLYPHS.len() - 1) as f64;

/// A downsampled series quantized onto the glyph levels.
///
/// `None` marks a missing (non-finite) sample. Levels are relative to the
/// series' own finite range, so two sparklines are not comparable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sparkline {
    pub metric: Metric,
    pub levels: Vec<Option<u8>>,
}

impl Sparkline {
    pub fn render(metric: Metric, values: &[f64]) -> Self {
        let stats = TrendStats::from_values(values);
        let extent = stats.extent();

        let levels = values
            .iter()
            .map(|&value| {
                if !value.is_finite() {
                    return None;
                }
                if extent <= 0.0 || !extent.is_finite() {
                    return Some(0);
                }
                let level = ((value - stats.min) / extent * TOP_LEVEL).round();
                Some(level.clamp(0.0, TOP_LEVEL) as u8)
            })
            .collect();

        Self { metric, levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl fmt::Display for Sparkline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in &self.levels {
            let glyph = level.map_or(' ', |l| GLYPHS[usize::from(l)]);
            write!(f, "{glyph}")?;
        }
        Ok(())
    }
}
