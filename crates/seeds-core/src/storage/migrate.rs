//! One-time upgrade of a legacy log to the disk-free schema.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{parse_row, LogSchema, StoreError, MISSING_VALUE};

/// What [`migrate_legacy`] did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Rewritten with a `df` column; `rows` data rows were carried over
    Migrated { rows: usize },
    /// Already in the current schema, left untouched
    AlreadyCurrent,
    /// No log at that path
    Missing,
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io {
        action,
        path,
        source,
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".migrating");
    path.with_file_name(name)
}

/// Copy the legacy rows after the header into `staging` with `backfill`
/// appended, and sync it. Returns the number of rows written.
fn write_staging(
    lines: impl Iterator<Item = io::Result<String>>,
    path: &Path,
    staging: &Path,
    backfill: &str,
) -> Result<usize, StoreError> {
    let mut out = BufWriter::new(File::create(staging).map_err(io_error("create", staging))?);
    writeln!(out, "{}", LogSchema::WithDiskFree.header()).map_err(io_error("write", staging))?;

    let mut rows = 0;
    for (index, line) in lines.enumerate() {
        let line = line.map_err(io_error("read", path))?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        // Refuse to carry a corrupt row into the new schema
        parse_row(LogSchema::Legacy, path, index + 2, line)?;
        writeln!(out, "{line}\t{backfill}").map_err(io_error("write", staging))?;
        rows += 1;
    }

    let file = out
        .into_inner()
        .map_err(|e| io_error("write", staging)(e.into_error()))?;
    file.sync_all().map_err(io_error("sync", staging))?;
    Ok(rows)
}

/// Rewrite a legacy log so every row carries a `df` column.
///
/// Existing rows keep their text byte-for-byte; `backfill` (or `nan`) is
/// appended as the disk-free value. The new file is written next to the old
/// one and renamed over it, so an interrupted migration leaves the legacy log
/// intact. A failed migration removes the staging file. Running it again on a
/// migrated log is a no-op.
pub fn migrate_legacy(path: &Path, backfill: Option<u64>) -> Result<MigrationOutcome, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("No log at {}, nothing to migrate", path.display());
            return Ok(MigrationOutcome::Missing);
        }
        Err(e) => return Err(io_error("open", path)(e)),
    };

    let mut lines = BufReader::new(file).lines();
    let header = match lines.next() {
        Some(line) => line.map_err(io_error("read", path))?,
        None => return Ok(MigrationOutcome::Missing),
    };
    let header = header.trim_end_matches('\r');

    match LogSchema::from_header(header) {
        Some(LogSchema::WithDiskFree) => {
            info!("{} is already current", path.display());
            return Ok(MigrationOutcome::AlreadyCurrent);
        }
        Some(LogSchema::Legacy) => {}
        None => {
            return Err(StoreError::SchemaMismatch {
                path: path.to_path_buf(),
                expected: LogSchema::Legacy,
                found: header.to_string(),
            });
        }
    }

    let backfill = backfill.map_or_else(|| MISSING_VALUE.to_string(), |df| df.to_string());
    let staging = staging_path(path);
    let rows = write_staging(lines, path, &staging, &backfill)
        .and_then(|rows| {
            fs::rename(&staging, path).map_err(io_error("replace", path))?;
            Ok(rows)
        })
        .inspect_err(|_| {
            let _ = fs::remove_file(&staging);
        })?;

    info!("Migrated {} rows in {} (df = {})", rows, path.display(), backfill);
    Ok(MigrationOutcome::Migrated { rows })
}
