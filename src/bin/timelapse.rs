//! Monthly timelapse of the annotated archive.
//!
//! Usage: `seeds-timelapse [config.json] [YYYY-MM]`. Without a month, the
//! previous calendar month is assembled.

use std::env;
use std::process::ExitCode;

use anyhow::Result;
use chrono::Local;
use log::info;

use seeds_core::timelapse::{TimelapsePlan, previous_month};
use seeds_rs::job;

fn run() -> Result<()> {
    let config = job::load_config()?;
    let month = env::args()
        .nth(2)
        .unwrap_or_else(|| previous_month(Local::now().naive_local()));

    let plan = TimelapsePlan::new(
        &config.timelapse,
        &config.data_dir,
        config.resolve(&config.timelapse.scratch_dir),
        &config.resolve(&config.timelapse.output_dir),
        &config.image.archive_prefix,
        month,
    )?;
    let video = plan.run()?;

    info!("Timelapse written to {}", video.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    job::finish("seeds-timelapse", run())
}
