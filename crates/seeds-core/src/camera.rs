//! Still capture.
//!
//! The camera itself is an external program; this module only names the
//! files and hands the latest raw frame to the annotator.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::NaiveDateTime;
use log::info;
use thiserror::Error;

use crate::config::CameraConfig;
use crate::observation::TIMESTAMP_FORMAT;
use crate::process::{self, CommandError};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture command failed: {0}")]
    Command(#[from] CommandError),
    #[error("capture produced no file at {}", .0.display())]
    NoOutput(PathBuf),
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Something that can take a photo.
pub trait Camera {
    /// Capture a still for `timestamp` and return the path of the latest
    /// raw photo.
    fn capture(&mut self, timestamp: NaiveDateTime) -> Result<PathBuf, CaptureError>;
}

/// Archive name of a raw capture.
pub fn raw_image_name(prefix: &str, timestamp: NaiveDateTime) -> String {
    format!("{prefix}{}.jpg", timestamp.format(TIMESTAMP_FORMAT))
}

/// Camera driven by a still-capture program such as `libcamera-still`.
///
/// Each capture is archived as `<raw_prefix>YYYY-MM-DD-HH-MM.jpg` in `dir`
/// and copied to `latest_name`.
pub struct CommandCamera {
    config: CameraConfig,
    dir: PathBuf,
    width: u32,
    height: u32,
}

impl CommandCamera {
    pub fn new(config: CameraConfig, dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            config,
            dir: dir.into(),
            width,
            height,
        }
    }

    fn command(&self, output: &Path) -> Command {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .arg("--width")
            .arg(self.width.to_string())
            .arg("--height")
            .arg(self.height.to_string())
            .arg("-o")
            .arg(output);
        command
    }
}

impl Camera for CommandCamera {
    fn capture(&mut self, timestamp: NaiveDateTime) -> Result<PathBuf, CaptureError> {
        let raw = self
            .dir
            .join(raw_image_name(&self.config.raw_prefix, timestamp));
        process::run(&mut self.command(&raw))?;
        if !raw.is_file() {
            return Err(CaptureError::NoOutput(raw));
        }

        let latest = self.dir.join(&self.config.latest_name);
        fs::copy(&raw, &latest).map_err(|source| CaptureError::Copy {
            from: raw.clone(),
            to: latest.clone(),
            source,
        })?;

        info!("Captured {}", raw.display());
        Ok(latest)
    }
}
