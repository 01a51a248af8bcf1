//! Trend summaries over the recent log window.
//!
//! The summarizer reads the last day of observations, downsamples each tracked
//! metric with [`compress`] and renders the result as a [`Sparkline`].

mod sparkline;
mod stats;

use log::{debug, warn};

use crate::config::TrendConfig;
use crate::metrics::Metric;
use crate::observation::Observation;
use crate::storage::{LogStore, StoreError};

pub use sparkline::{Sparkline, GLYPHS};
pub use stats::TrendStats;

/// One sample every ten minutes
pub const SAMPLES_PER_DAY: usize = 144;

/// Samples folded into one sparkline glyph
pub const DEFAULT_BIN_SIZE: usize = 4;

/// Downsample a series by bins of `bin` samples.
///
/// Each output value is `(series[i*bin] + series[i*bin + 1]) / bin`, for every
/// `i` whose pair lies inside the series. This is the historical arithmetic of
/// the log's trend graphics and is kept as-is: for `bin != 2` it is not a mean
/// and it ignores the rest of each bin. A zero bin yields nothing.
pub fn compress(series: &[f64], bin: usize) -> Vec<f64> {
    if bin == 0 {
        return Vec::new();
    }
    let divisor = bin as f64;

    (0usize..)
        .map_while(|i| i.checked_mul(bin))
        .take_while(|&start| start < series.len().saturating_sub(1))
        .map(|start| (series[start] + series[start + 1]) / divisor)
        .collect()
}

/// Read-only view of the most recent log rows, oldest first.
///
/// A row that could not be parsed is kept as a gap so the remaining rows
/// stay in place.
#[derive(Debug, Clone, Default)]
pub struct TrendWindow {
    rows: Vec<Option<Observation>>,
}

impl TrendWindow {
    pub fn new(rows: Vec<Option<Observation>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one metric across the window; gaps read as `NaN`.
    pub fn series(&self, metric: Metric) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.as_ref().map_or(f64::NAN, |o| metric.value(o)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendSummarizer {
    window_size: usize,
    bin_size: usize,
}

impl Default for TrendSummarizer {
    fn default() -> Self {
        Self::from_config(&TrendConfig::default())
    }
}

impl TrendSummarizer {
    pub const fn new(window_size: usize, bin_size: usize) -> Self {
        Self {
            window_size,
            bin_size,
        }
    }

    pub const fn from_config(config: &TrendConfig) -> Self {
        Self::new(config.window, config.bin)
    }

    /// Load the last `window_size` rows (all rows if fewer exist).
    ///
    /// Damaged rows are logged and become gaps in every sparkline.
    pub fn window(&self, store: &LogStore) -> Result<TrendWindow, StoreError> {
        let rows = store
            .tail_rows(self.window_size)?
            .into_iter()
            .map(|row| row.inspect_err(|e| warn!("Skipping log row: {}", e)).ok())
            .collect();
        Ok(TrendWindow::new(rows))
    }

    /// One sparkline per tracked metric, in [`Metric::TRACKED`] order.
    pub fn summarize(&self, store: &LogStore) -> Result<Vec<Sparkline>, StoreError> {
        let window = self.window(store)?;
        Ok(self.summarize_window(&window))
    }

    pub fn summarize_window(&self, window: &TrendWindow) -> Vec<Sparkline> {
        debug!(
            "Summarizing {} rows with bin size {}",
            window.len(),
            self.bin_size
        );

        Metric::TRACKED
            .iter()
            .map(|&metric| {
                let compressed = compress(&window.series(metric), self.bin_size);
                Sparkline::render(metric, &compressed)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::Rgb;
    use crate::storage::LogSchema;
    use chrono::{Duration, NaiveDate};
    use tempfile::TempDir;

    fn synthetic(i: usize) -> Observation {
        let phase = i as f64 / SAMPLES_PER_DAY as f64 * std::f64::consts::TAU;
        Observation {
            timestamp: NaiveDate::from_ymd_opt(2017, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + Duration::minutes(10 * i as i64),
            temperature: 20.0 + 5.0 * phase.sin(),
            pressure: 1010.0 + 3.0 * phase.cos(),
            light: (800.0 * phase.sin()).max(0.0).trunc(),
            color: Rgb::new(100.0, 90.0, 80.0),
            cct: (5000.0 + 1000.0 * phase.cos()).trunc(),
            free_disk_mb: Some(4096),
        }
    }

    #[test]
    fn test_compress_pairs() {
        assert_eq!(compress(&[10.0, 20.0, 30.0, 40.0], 2), vec![15.0, 35.0]);
    }

    #[test]
    fn test_compress_keeps_historical_divisor() {
        // (10 + 20) / 4, not the mean of the bin
        assert_eq!(compress(&[10.0, 20.0, 30.0], 4), vec![7.5]);
        assert_eq!(
            compress(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0], 4),
            vec![0.75, 2.75]
        );
    }

    #[test]
    fn test_compress_degenerate_inputs() {
        assert!(compress(&[], 4).is_empty());
        assert!(compress(&[1.0], 2).is_empty());
        assert!(compress(&[1.0, 2.0, 3.0], 0).is_empty());
        assert_eq!(compress(&[1.0, 2.0, 3.0], 1), vec![3.0, 5.0]);
    }

    #[test]
    fn test_day_of_rows_gives_four_sparklines() {
        let rows = (0..SAMPLES_PER_DAY).map(|i| Some(synthetic(i))).collect();
        let window = TrendWindow::new(rows);
        let sparklines = TrendSummarizer::default().summarize_window(&window);

        let metrics: Vec<Metric> = sparklines.iter().map(|s| s.metric).collect();
        assert_eq!(metrics, Metric::TRACKED.to_vec());
        for sparkline in &sparklines {
            assert_eq!(sparkline.len(), 36);
            assert!(!sparkline.to_string().trim().is_empty());
        }
    }

    #[test]
    fn test_summarize_uses_all_rows_when_short() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::new(dir.path().join("seeds.log"), LogSchema::WithDiskFree);
        for i in 0..10 {
            store.append(&synthetic(i)).unwrap();
        }

        let summarizer = TrendSummarizer::new(SAMPLES_PER_DAY, 2);
        assert_eq!(summarizer.window(&store).unwrap().len(), 10);

        let sparklines = summarizer.summarize(&store).unwrap();
        assert_eq!(sparklines.len(), 4);
        assert!(sparklines.iter().all(|s| s.len() == 5));
    }

    #[test]
    fn test_summarize_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::new(dir.path().join("seeds.log"), LogSchema::WithDiskFree);

        let sparklines = TrendSummarizer::default().summarize(&store).unwrap();
        assert_eq!(sparklines.len(), 4);
        assert!(sparklines.iter().all(Sparkline::is_empty));
    }

    #[test]
    fn test_window_takes_most_recent_rows() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::new(dir.path().join("seeds.log"), LogSchema::WithDiskFree);
        for i in 0..20 {
            store.append(&synthetic(i)).unwrap();
        }

        let window = TrendSummarizer::new(8, 4).window(&store).unwrap();
        assert_eq!(window.len(), 8);
        assert_eq!(window.series(Metric::Light)[0], synthetic(12).light);
    }

    #[test]
    fn test_damaged_row_becomes_a_gap() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::new(dir.path().join("seeds.log"), LogSchema::WithDiskFree);
        for i in 0..4 {
            store.append(&synthetic(i)).unwrap();
        }
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(store.path())
            .unwrap();
        std::io::Write::write_all(&mut file, b"2017-06-01-00-40\t21.0").unwrap();
        drop(file);
        for i in 5..8 {
            store.append(&synthetic(i)).unwrap();
        }

        let window = TrendSummarizer::new(SAMPLES_PER_DAY, 2).window(&store).unwrap();
        assert_eq!(window.len(), 8);
        assert!(window.series(Metric::Temperature)[4].is_nan());

        let sparklines = TrendSummarizer::new(SAMPLES_PER_DAY, 2)
            .summarize(&store)
            .unwrap();
        for sparkline in &sparklines {
            assert_eq!(sparkline.len(), 4);
            assert_eq!(sparkline.levels[2], None);
            assert!(sparkline.levels[0].is_some());
            assert!(sparkline.levels[3].is_some());
        }
    }
}
