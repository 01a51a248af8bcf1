//! Upgrade a legacy log to the disk-free schema.
//!
//! Usage: `seeds-migrate [config.json] [backfill-mb]`. Rows carried over get
//! `backfill-mb` as their disk-free value, or `nan` when it is not given.

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use log::{info, warn};

use seeds_core::storage::LogSchema;
use seeds_core::storage::migrate::{MigrationOutcome, migrate_legacy};
use seeds_rs::job;

fn run() -> Result<()> {
    let config = job::load_config()?;
    let backfill = env::args()
        .nth(2)
        .map(|value| value.parse::<u64>())
        .transpose()
        .context("backfill must be a whole number of megabytes")?;

    let path = config.log_path();
    match migrate_legacy(&path, backfill)? {
        MigrationOutcome::Migrated { rows } => {
            info!("Migrated {} rows in {}", rows, path.display())
        }
        MigrationOutcome::AlreadyCurrent => info!("{} is already current", path.display()),
        MigrationOutcome::Missing => warn!("No log at {}", path.display()),
    }

    if config.log.schema == LogSchema::Legacy {
        warn!("Configuration still selects the legacy schema; set log.schema to with_disk_free");
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    job::finish("seeds-migrate", run())
}
