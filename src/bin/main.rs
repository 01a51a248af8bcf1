//! Sensing pass, run every ten minutes from cron.

use std::process::ExitCode;

use anyhow::Result;
use chrono::Local;
use log::info;

use seeds_core::camera::CommandCamera;
use seeds_core::disk::SystemDiskProbe;
use seeds_core::pipeline::Pipeline;
use seeds_rs::{hardware, job};

fn run() -> Result<()> {
    let config = job::load_config()?;
    job::prepare_data_dir(&config)?;

    let camera = CommandCamera::new(
        config.camera.clone(),
        &config.data_dir,
        config.image.width,
        config.image.height,
    );
    let board = hardware::enviro_board()?;
    let mut pipeline = Pipeline::from_config(&config, camera, board, SystemDiskProbe)?;

    hardware::countdown();
    let report = pipeline.run(Local::now().naive_local())?;

    for sparkline in &report.sparklines {
        info!("{:>11}: {}", sparkline.metric.label(), sparkline);
    }
    info!("Wrote {}", report.image.archive.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    job::finish("seeds-rs", run())
}
