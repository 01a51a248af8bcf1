//! JSON configuration, loaded once per invocation.
//!
//! Every section except the credential ones (`telemetry`, `social`) has
//! defaults and may be left out entirely. A section that is present must be
//! complete; a credential section a job needs but the file lacks is reported
//! through [`ConfigError::MissingSection`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::LogSchema;
use crate::trend::{DEFAULT_BIN_SIZE, SAMPLES_PER_DAY};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "SEEDS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("configuration has no `{0}` section")]
    MissingSection(&'static str),
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base directory for relative paths in every other section
    pub data_dir: PathBuf,
    pub log: LogConfig,
    pub trend: TrendConfig,
    pub image: ImageConfig,
    pub camera: CameraConfig,
    pub timelapse: TimelapseConfig,
    pub telemetry: Option<TelemetryConfig>,
    pub social: Option<SocialConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log: LogConfig::default(),
            trend: TrendConfig::default(),
            image: ImageConfig::default(),
            camera: CameraConfig::default(),
            timelapse: TimelapseConfig::default(),
            telemetry: None,
            social: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub file: PathBuf,
    pub schema: LogSchema,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("internet-of-seeds.log"),
            schema: LogSchema::WithDiskFree,
        }
    }
}

/// Window and bin sizes for the trend summary
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendConfig {
    /// Number of most recent rows considered
    pub window: usize,
    /// Samples per sparkline glyph
    pub bin: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: SAMPLES_PER_DAY,
            bin: DEFAULT_BIN_SIZE,
        }
    }
}

/// Annotated image layout and output names
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
    /// PNG overlay pasted with its alpha channel; none when absent
    pub watermark: Option<PathBuf>,
    pub watermark_position: (i64, i64),
    /// Overwritten on every pass
    pub latest_name: String,
    /// Archive images are `<prefix>YYYY-MM-DD-HH-MM.jpg`
    pub archive_prefix: String,
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 1438,
            height: 1080,
            watermark: None,
            watermark_position: (0, 996),
            latest_name: "latest_ts.jpg".to_string(),
            archive_prefix: "image_ts-".to_string(),
            jpeg_quality: 90,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CameraConfig {
    /// Still-capture program
    pub command: String,
    /// Extra arguments placed before the output options
    pub args: Vec<String>,
    /// Raw captures are `<prefix>YYYY-MM-DD-HH-MM.jpg`
    pub raw_prefix: String,
    pub latest_name: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: "libcamera-still".to_string(),
            args: vec![
                "--nopreview".to_string(),
                "--hflip".to_string(),
                "--vflip".to_string(),
                "--quality".to_string(),
                "100".to_string(),
            ],
            raw_prefix: "image-".to_string(),
            latest_name: "latest.jpg".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimelapseConfig {
    /// Scratch directory for the numbered frame links
    pub scratch_dir: PathBuf,
    pub output_dir: PathBuf,
    pub fps: u32,
    /// Pipeline launcher
    pub command: String,
    /// H.264 encoder element
    pub encoder: String,
}

impl Default for TimelapseConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("timelapse-scratch"),
            output_dir: PathBuf::from("timelapse"),
            fps: 24,
            command: "gst-launch-1.0".to_string(),
            encoder: "omxh264enc".to_string(),
        }
    }
}

/// Telemetry channel credentials and broker
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub channel_id: String,
    pub api_key: String,
    pub host: String,
    pub port: u16,
}

/// Social feed credentials and the posting command
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SocialConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_key: String,
    pub access_secret: String,
    /// Program and leading arguments; invoked as `<command...> <status> <image>`
    pub command: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.width == 0 || self.image.height == 0 {
            return Err(ConfigError::Invalid {
                field: "image",
                reason: "canvas dimensions must be non-zero",
            });
        }
        if !(1..=100).contains(&self.image.jpeg_quality) {
            return Err(ConfigError::Invalid {
                field: "image.jpeg_quality",
                reason: "must be between 1 and 100",
            });
        }
        if self.timelapse.fps == 0 {
            return Err(ConfigError::Invalid {
                field: "timelapse.fps",
                reason: "must be non-zero",
            });
        }
        if let Some(telemetry) = &self.telemetry
            && (telemetry.channel_id.is_empty() || telemetry.api_key.is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "telemetry",
                reason: "channel_id and api_key must be set",
            });
        }
        if let Some(social) = &self.social
            && social.command.is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "social.command",
                reason: "must name a program",
            });
        }
        Ok(())
    }

    /// Resolve a configured path against `data_dir`.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log.file)
    }

    pub fn watermark_path(&self) -> Option<PathBuf> {
        self.image.watermark.as_ref().map(|p| self.resolve(p))
    }

    pub fn latest_stamped_path(&self) -> PathBuf {
        self.resolve(&self.image.latest_name)
    }

    pub fn telemetry(&self) -> Result<&TelemetryConfig, ConfigError> {
        self.telemetry
            .as_ref()
            .ok_or(ConfigError::MissingSection("telemetry"))
    }

    pub fn social(&self) -> Result<&SocialConfig, ConfigError> {
        self.social
            .as_ref()
            .ok_or(ConfigError::MissingSection("social"))
    }
}

/// Configuration file for this invocation: `$SEEDS_CONFIG`, then the first
/// command-line argument, then `config.json`.
pub fn config_path(env_value: Option<String>, first_arg: Option<String>) -> PathBuf {
    env_value
        .filter(|v| !v.is_empty())
        .or(first_arg)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}
