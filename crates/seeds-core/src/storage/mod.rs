//! Observation log storage.
//!
//! The log is a tab-separated text file with one header line and one row per
//! sensing pass. Two record schemas exist in the wild: the legacy layout
//! without a disk-free column, and the current layout with it. A given store
//! is opened with exactly one schema; files written with the other one are
//! rejected rather than mixed (see [`migrate`] for the one-time upgrade).

mod log_store;
pub mod migrate;

use std::io;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observation::{Observation, Rgb, TIMESTAMP_FORMAT};

pub use log_store::LogStore;

/// Written for a non-finite integer column, read back as `NaN` / absent.
const MISSING_VALUE: &str = "nan";

const LEGACY_COLUMNS: [&str; 8] = [
    "time", "temp", "press", "light", "red", "green", "blue", "cct",
];
const WITH_DISK_FREE_COLUMNS: [&str; 9] = [
    "time", "temp", "press", "light", "red", "green", "blue", "cct", "df",
];

/// Column layout of a log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSchema {
    /// `time temp press light red green blue cct`
    Legacy,
    /// Legacy columns plus `df`, free disk space in megabytes
    #[default]
    WithDiskFree,
}

impl LogSchema {
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Legacy => &LEGACY_COLUMNS,
            Self::WithDiskFree => &WITH_DISK_FREE_COLUMNS,
        }
    }

    pub const fn column_count(self) -> usize {
        self.columns().len()
    }

    /// Header line, without the trailing newline
    pub fn header(self) -> String {
        self.columns().join("\t")
    }

    /// Identify the schema a header line was written with.
    pub fn from_header(header: &str) -> Option<Self> {
        [Self::Legacy, Self::WithDiskFree]
            .into_iter()
            .find(|schema| schema.header() == header)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} has header {found:?}, expected the {expected:?} schema", .path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: LogSchema,
        found: String,
    },
    #[error("{}:{line}: expected {expected} columns, found {found}", .path.display())]
    ColumnCount {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{}:{line}: invalid {column} value {value:?}", .path.display())]
    InvalidField {
        path: PathBuf,
        line: usize,
        column: &'static str,
        value: String,
    },
    #[error("observation at {timestamp} has no disk-free value to log")]
    MissingDiskFree { timestamp: String },
}

/// Integer columns are written truncated, like the historical `%i` format.
pub(crate) fn format_integer(value: f64) -> String {
    if value.is_finite() {
        (value.trunc() as i64).to_string()
    } else {
        MISSING_VALUE.to_string()
    }
}

/// Serialize one observation without the trailing newline.
pub(crate) fn format_row(
    schema: LogSchema,
    observation: &Observation,
) -> Result<String, StoreError> {
    let mut row = format!(
        "{}\t{:.2}\t{:.2}\t{}\t{}\t{}\t{}\t{}",
        observation.timestamp_label(),
        observation.temperature,
        observation.pressure,
        format_integer(observation.light),
        format_integer(observation.color.red),
        format_integer(observation.color.green),
        format_integer(observation.color.blue),
        format_integer(observation.cct),
    );

    if schema == LogSchema::WithDiskFree {
        let free = observation
            .free_disk_mb
            .ok_or_else(|| StoreError::MissingDiskFree {
                timestamp: observation.timestamp_label(),
            })?;
        row.push('\t');
        row.push_str(&free.to_string());
    }

    Ok(row)
}

/// Parse one data row. `line` is the 1-based line number for error reports.
pub(crate) fn parse_row(
    schema: LogSchema,
    path: &std::path::Path,
    line: usize,
    text: &str,
) -> Result<Observation, StoreError> {
    let fields: Vec<&str> = text.split('\t').collect();
    if fields.len() != schema.column_count() {
        return Err(StoreError::ColumnCount {
            path: path.to_path_buf(),
            line,
            expected: schema.column_count(),
            found: fields.len(),
        });
    }

    let invalid = |column: &'static str, value: &str| StoreError::InvalidField {
        path: path.to_path_buf(),
        line,
        column,
        value: value.to_string(),
    };
    let number = |index: usize| -> Result<f64, StoreError> {
        fields[index]
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(schema.columns()[index], fields[index]))
    };

    let timestamp = NaiveDateTime::parse_from_str(fields[0], TIMESTAMP_FORMAT)
        .map_err(|_| invalid("time", fields[0]))?;

    let free_disk_mb = match schema {
        LogSchema::Legacy => None,
        LogSchema::WithDiskFree => {
            let raw = fields[8].trim();
            if raw.is_empty() || raw.eq_ignore_ascii_case(MISSING_VALUE) {
                None
            } else {
                Some(raw.parse::<u64>().map_err(|_| invalid("df", raw))?)
            }
        }
    };

    Ok(Observation {
        timestamp,
        temperature: number(1)?,
        pressure: number(2)?,
        light: number(3)?,
        color: Rgb::new(number(4)?, number(5)?, number(6)?),
        cct: number(7)?,
        free_disk_mb,
    })
}
