//! Plumbing shared by the batch binaries: configuration lookup and exit
//! status.

use std::env;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use log::{error, info, warn};

use seeds_core::{ErrorCategory, PipelineError};
use seeds_core::config::{CONFIG_ENV, Config, ConfigError, config_path};
use seeds_core::notify::PublishError;
use seeds_core::sensors::SensorError;
use seeds_core::storage::StoreError;
use seeds_core::timelapse::TimelapseError;

/// Load the configuration named by `$SEEDS_CONFIG` or the first argument.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path(env::var(CONFIG_ENV).ok(), env::args().nth(1));
    info!("Loading configuration from {}", path.display());
    Config::load(&path)
}

pub fn prepare_data_dir(config: &Config) -> Result<()> {
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))
}

/// Category of the first categorised error in the chain.
pub fn category(error: &anyhow::Error) -> Option<ErrorCategory> {
    error.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<PipelineError>() {
            Some(e.category())
        } else if cause.is::<SensorError>() {
            Some(ErrorCategory::Hardware)
        } else if cause.is::<ConfigError>() {
            Some(ErrorCategory::Configuration)
        } else if let Some(e) = cause.downcast_ref::<TimelapseError>() {
            Some(e.category())
        } else if let Some(StoreError::SchemaMismatch { .. }) = cause.downcast_ref() {
            Some(ErrorCategory::Configuration)
        } else if cause.is::<StoreError>() {
            Some(ErrorCategory::Storage)
        } else if cause.is::<PublishError>() {
            Some(ErrorCategory::Publish)
        } else {
            None
        }
    })
}

/// Log the outcome of a job and turn it into the process exit status.
///
/// Publish failures are logged but still exit successfully.
pub fn finish(job: &str, result: Result<()>) -> ExitCode {
    let Err(e) = result else {
        info!("{job} finished");
        return ExitCode::SUCCESS;
    };

    match category(&e) {
        Some(category) if !category.is_fatal() => {
            warn!("{job}: {category} error: {e:#}");
            ExitCode::SUCCESS
        }
        Some(category) => {
            error!("{job} failed with a {category} error: {e:#}");
            ExitCode::FAILURE
        }
        None => {
            error!("{job} failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_category_through_context() {
        let sensor: PipelineError = SensorError::Timeout {
            sensor: "BMP280",
            operation: "finish forced measurement",
        }
        .into();
        let e = anyhow::Error::new(sensor).context("sensing pass");
        assert_eq!(category(&e), Some(ErrorCategory::Hardware));

        let e = anyhow::Error::new(SensorError::UnexpectedDevice {
            sensor: "TCS3472",
            found: 0x12,
        });
        assert_eq!(category(&e), Some(ErrorCategory::Hardware));

        let e = anyhow::Error::new(ConfigError::MissingSection("social"));
        assert_eq!(category(&e), Some(ErrorCategory::Configuration));

        let e = anyhow::Error::new(StoreError::MissingDiskFree {
            timestamp: "2017-02-14-09-05".to_string(),
        });
        assert_eq!(category(&e), Some(ErrorCategory::Storage));

        assert_eq!(category(&anyhow::anyhow!("plain")), None);
    }

    #[test]
    fn test_publish_failure_exits_successfully() {
        let e = anyhow::Error::new(PublishError::Skipped {
            notifier: "status".to_string(),
            reason: "no annotated image to attach",
        });
        assert_eq!(finish("status", Err(e)), ExitCode::SUCCESS);

        let e = anyhow::Error::new(StoreError::SchemaMismatch {
            path: PathBuf::from("seeds.log"),
            expected: seeds_core::storage::LogSchema::WithDiskFree,
            found: "time".to_string(),
        });
        assert_eq!(finish("seeds-rs", Err(e)), ExitCode::FAILURE);
    }
}
