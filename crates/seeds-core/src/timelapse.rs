//! Monthly timelapse assembly.
//!
//! The annotated archive images of the previous month are hard-linked into a
//! scratch directory as a gap-free numbered sequence, which the external
//! GStreamer pipeline encodes into one AVI.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use chrono::{Duration, NaiveDateTime};
use log::{debug, info};
use thiserror::Error;

use crate::config::TimelapseConfig;
use crate::error::ErrorCategory;
use crate::process::{self, CommandError};

/// Month label of archive file names
pub const MONTH_FORMAT: &str = "%Y-%m";

/// Numbered frame pattern understood by `multifilesrc`
const FRAME_PATTERN: &str = "%05d.jpg";

#[derive(Debug, Error)]
pub enum TimelapseError {
    #[error("no frames for {month} in {}", .dir.display())]
    NoFrames { month: String, dir: PathBuf },
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encoder failed: {0}")]
    Encoder(#[from] CommandError),
}

impl TimelapseError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoFrames { .. } | Self::Io { .. } => ErrorCategory::Storage,
            Self::Encoder(_) => ErrorCategory::Hardware,
        }
    }
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> TimelapseError {
    let path = path.to_path_buf();
    move |source| TimelapseError::Io {
        action,
        path,
        source,
    }
}

/// The month before the one `now` falls in, run on the first of the month.
pub fn previous_month(now: NaiveDateTime) -> String {
    (now - Duration::days(1)).format(MONTH_FORMAT).to_string()
}

/// Archive images of `month` in `dir`, in name (and so time) order.
pub fn collect_frames(
    dir: &Path,
    archive_prefix: &str,
    month: &str,
) -> Result<Vec<PathBuf>, TimelapseError> {
    let wanted = format!("{archive_prefix}{month}");
    let mut frames = Vec::new();

    for entry in fs::read_dir(dir).map_err(io_error("list", dir))? {
        let entry = entry.map_err(io_error("list", dir))?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(&wanted) && name.ends_with(".jpg"));
        if matches && path.is_file() {
            frames.push(path);
        }
    }

    frames.sort();
    debug!("Found {} frames for {}", frames.len(), month);
    Ok(frames)
}

/// Link `frames` into `scratch` as `00000.jpg`, `00001.jpg`, ...
///
/// Numbered files left over from an earlier month are removed first so the
/// encoder never picks up a stale tail.
pub fn stage(frames: &[PathBuf], scratch: &Path) -> Result<(), TimelapseError> {
    fs::create_dir_all(scratch).map_err(io_error("create", scratch))?;

    for entry in fs::read_dir(scratch).map_err(io_error("list", scratch))? {
        let path = entry.map_err(io_error("list", scratch))?.path();
        if is_numbered_frame(&path) {
            fs::remove_file(&path).map_err(io_error("remove", &path))?;
        }
    }

    for (index, frame) in frames.iter().enumerate() {
        let link = scratch.join(format!("{index:05}.jpg"));
        fs::hard_link(frame, &link).map_err(io_error("link", &link))?;
    }
    Ok(())
}

fn is_numbered_frame(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "jpg")
        && path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.len() == 5 && stem.bytes().all(|b| b.is_ascii_digit()))
}

/// Everything needed to encode one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelapsePlan {
    pub month: String,
    pub frames: Vec<PathBuf>,
    pub scratch: PathBuf,
    pub output: PathBuf,
    pub fps: u32,
    pub program: String,
    pub encoder: String,
}

impl TimelapsePlan {
    /// Collect the frames for `month` from `frames_dir`.
    pub fn new(
        config: &TimelapseConfig,
        frames_dir: &Path,
        scratch: PathBuf,
        output_dir: &Path,
        archive_prefix: &str,
        month: String,
    ) -> Result<Self, TimelapseError> {
        let frames = collect_frames(frames_dir, archive_prefix, &month)?;
        if frames.is_empty() {
            return Err(TimelapseError::NoFrames {
                month,
                dir: frames_dir.to_path_buf(),
            });
        }

        let output = output_dir.join(format!("TimeLapse_Stamped_FPS{}_{}.avi", config.fps, month));
        Ok(Self {
            month,
            frames,
            scratch,
            output,
            fps: config.fps,
            program: config.command.clone(),
            encoder: config.encoder.clone(),
        })
    }

    /// The `gst-launch-1.0` invocation for the staged sequence.
    pub fn encoder_command(&self) -> Command {
        let location = self.scratch.join(FRAME_PATTERN);
        let mut command = Command::new(&self.program);
        command
            .arg("multifilesrc")
            .arg(format!("location={}", location.display()))
            .arg("index=0")
            .arg(format!("caps=image/jpeg,framerate={}/1", self.fps))
            .args(["!", "jpegdec", "!"])
            .arg(&self.encoder)
            .args(["!", "avimux", "!", "filesink"])
            .arg(format!("location={}", self.output.display()));
        command
    }

    /// Stage the frames and run the encoder; returns the video path.
    pub fn run(&self) -> Result<PathBuf, TimelapseError> {
        stage(&self.frames, &self.scratch)?;
        if let Some(parent) = self.output.parent() {
            fs::create_dir_all(parent).map_err(io_error("create", parent))?;
        }

        info!(
            "Encoding {} frames for {} into {}",
            self.frames.len(),
            self.month,
            self.output.display()
        );
        let started = Instant::now();
        process::run(&mut self.encoder_command())?;
        info!("Encoder took {:.1?}", started.elapsed());

        Ok(self.output.clone())
    }
}
