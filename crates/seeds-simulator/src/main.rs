//! Desktop simulator for the seeds-rs sensing pass.
//!
//! Runs the full pipeline against a synthetic camera and a mock Enviro pHAT,
//! writing the log and annotated images to a scratch directory so the
//! overlay and sparklines can be inspected without a Pi.
//!
//! Usage: `seeds-simulator [out-dir] [passes]` (defaults: `sim-data`, 144,
//! one simulated day at ten-minute intervals).

use std::env;
use std::f64::consts::TAU;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDateTime, Timelike};
use image::{Rgb as Pixel, RgbImage};
use log::{error, info};

use seeds_core::camera::{Camera, CaptureError, raw_image_name};
use seeds_core::config::Config;
use seeds_core::disk::FixedDiskProbe;
use seeds_core::pipeline::Pipeline;
use seeds_core::Rgb;
use seeds_core::sensors::{EnvironmentReadings, EnvironmentSource, SensorError};

const DEFAULT_OUT_DIR: &str = "sim-data";
const DEFAULT_PASSES: usize = 144;
const PASS_INTERVAL_MINUTES: i64 = 10;
const SIMULATED_FREE_MB: u64 = 12_288;

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Day-cycle readings for a seed tray on a windowsill.
struct MockEnviroBoard {
    clock: NaiveDateTime,
}

impl MockEnviroBoard {
    /// Fraction of the day elapsed, 0.0 at midnight
    fn day_phase(&self) -> f64 {
        f64::from(self.clock.num_seconds_from_midnight()) / 86_400.0
    }
}

impl EnvironmentSource for MockEnviroBoard {
    fn read_environment(&mut self) -> Result<EnvironmentReadings, SensorError> {
        let phase = self.day_phase();
        // Peaks at noon, zero through the night
        let daylight = (-(TAU * phase).cos()).max(0.0);

        let temperature = 17.0 + 6.0 * daylight + 0.4 * (TAU * phase * 7.0).sin();
        let pressure = 1012.0 + 4.0 * (TAU * phase).sin();
        let light = 20.0 + 1800.0 * daylight;

        // Warmer light at the ends of the day
        let warmth = 1.0 - daylight;
        let color = Rgb::new(90.0 + 20.0 * warmth, 85.0, 80.0 - 25.0 * warmth);

        Ok(EnvironmentReadings {
            light,
            color,
            temperature,
            pressure,
        })
    }
}

/// Writes a gradient frame whose brightness follows the simulated daylight.
struct SyntheticCamera {
    dir: PathBuf,
    width: u32,
    height: u32,
}

impl Camera for SyntheticCamera {
    fn capture(&mut self, timestamp: NaiveDateTime) -> Result<PathBuf, CaptureError> {
        let phase = f64::from(timestamp.num_seconds_from_midnight()) / 86_400.0;
        let level = 0.15 + 0.85 * (-(TAU * phase).cos()).max(0.0);

        let frame = RgbImage::from_fn(self.width, self.height, |x, y| {
            let sky = 1.0 - f64::from(y) / f64::from(self.height);
            let tint = f64::from(x) / f64::from(self.width);
            Pixel([
                (level * (120.0 + 60.0 * tint)) as u8,
                (level * (140.0 + 80.0 * sky)) as u8,
                (level * (90.0 + 150.0 * sky)) as u8,
            ])
        });

        let path = self.dir.join(raw_image_name("image-", timestamp));
        frame.save(&path).map_err(|e| CaptureError::Write {
            path: path.clone(),
            source: io::Error::other(e),
        })?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_OUT_DIR.to_string()));
    let passes = args
        .next()
        .map(|v| v.parse::<usize>())
        .transpose()
        .context("passes must be a whole number")?
        .unwrap_or(DEFAULT_PASSES);

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let config = Config {
        data_dir: out_dir.clone(),
        ..Config::default()
    };
    // Camera resolution is independent of the overlay canvas
    let camera = SyntheticCamera {
        dir: out_dir.clone(),
        width: 640,
        height: 480,
    };

    let now = Local::now().naive_local();
    let step = Duration::minutes(PASS_INTERVAL_MINUTES);
    let start = now - step * i32::try_from(passes).context("too many passes")?;

    let board = MockEnviroBoard { clock: start };
    let mut pipeline =
        Pipeline::from_config(&config, camera, board, FixedDiskProbe(SIMULATED_FREE_MB))?;

    info!(
        "Simulating {} passes from {} into {}",
        passes,
        start,
        out_dir.display()
    );

    let mut clock = start;
    for _ in 0..passes {
        clock += step;
        pipeline.sensors_mut().clock = clock;
        let report = pipeline.run(clock)?;
        info!(
            "{}: {:.2} C, {:.2} hPa, cct {}",
            report.observation.timestamp_label(),
            report.observation.temperature,
            report.observation.pressure,
            report.observation.cct
        );
    }

    info!("Log: {}", config.log_path().display());
    info!("Latest image: {}", config.latest_stamped_path().display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    info!("Starting seeds-rs simulator");

    match run() {
        Ok(()) => {
            info!("Simulator exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Simulation failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
