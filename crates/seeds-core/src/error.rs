//! Pipeline-level error aggregation.

use thiserror::Error;

use crate::annotate::AnnotateError;
use crate::camera::CaptureError;
use crate::config::ConfigError;
use crate::disk::DiskError;
use crate::notify::PublishError;
use crate::sensors::SensorError;
use crate::storage::StoreError;
use crate::timelapse::TimelapseError;

/// How a failure is treated by the job that hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Sensor, camera or disk probe failure; fatal
    Hardware,
    /// Log or image write failure; fatal
    Storage,
    /// Telemetry or social feed failure; logged, never fatal
    Publish,
    /// Missing or invalid configuration, assets or log schema; fatal at startup
    Configuration,
}

impl ErrorCategory {
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Publish)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Storage => "storage",
            Self::Publish => "publish",
            Self::Configuration => "configuration",
        }
    }
}

impl core::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Disk(#[from] DiskError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Annotate(#[from] AnnotateError),
    #[error(transparent)]
    Timelapse(#[from] TimelapseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Sensor(_) | Self::Capture(_) | Self::Disk(_) => ErrorCategory::Hardware,
            Self::Store(StoreError::SchemaMismatch { .. }) => ErrorCategory::Configuration,
            Self::Store(_) => ErrorCategory::Storage,
            Self::Annotate(e) => match e {
                AnnotateError::MissingWatermark(_) | AnnotateError::Watermark { .. } => {
                    ErrorCategory::Configuration
                }
                AnnotateError::Photo { .. } => ErrorCategory::Hardware,
                AnnotateError::Encode { .. }
                | AnnotateError::ArchiveExists(_)
                | AnnotateError::Io { .. } => ErrorCategory::Storage,
            },
            Self::Timelapse(e) => e.category(),
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Publish(_) => ErrorCategory::Publish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LogSchema;
    use std::path::PathBuf;

    #[test]
    fn test_categories() {
        let sensor: PipelineError = SensorError::Timeout {
            sensor: "BMP280",
            operation: "measure",
        }
        .into();
        assert_eq!(sensor.category(), ErrorCategory::Hardware);

        let mismatch: PipelineError = StoreError::SchemaMismatch {
            path: PathBuf::from("seeds.log"),
            expected: LogSchema::WithDiskFree,
            found: "time\ttemp".to_string(),
        }
        .into();
        assert_eq!(mismatch.category(), ErrorCategory::Configuration);

        let missing: PipelineError =
            AnnotateError::MissingWatermark(PathBuf::from("wm.png")).into();
        assert_eq!(missing.category(), ErrorCategory::Configuration);

        let config: PipelineError = ConfigError::MissingSection("social").into();
        assert_eq!(config.category(), ErrorCategory::Configuration);
        assert_eq!(config.to_string(), "configuration has no `social` section");
    }

    #[test]
    fn test_only_publish_is_recoverable() {
        assert!(!ErrorCategory::Publish.is_fatal());
        assert!(ErrorCategory::Storage.is_fatal());
        assert_eq!(ErrorCategory::Hardware.to_string(), "hardware");
    }
}
