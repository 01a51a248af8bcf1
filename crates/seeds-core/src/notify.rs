//! Best-effort publishing of an observation to remote endpoints.
//!
//! Both endpoints are reached through external programs: telemetry through
//! `mosquitto_pub`, the social feed through a configured posting command.
//! A failed publish is reported as a [`PublishOutcome`], never as a pipeline
//! error.

use std::path::Path;
use std::process::Command;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{SocialConfig, TelemetryConfig};
use crate::observation::Observation;
use crate::process::{self, CommandError};
use crate::storage::format_integer;

/// CA directory passed to the broker client for TLS
pub const CA_PATH: &str = "/etc/ssl/certs";

/// Environment variables carrying the social credentials to the posting
/// command.
pub const CONSUMER_KEY_ENV: &str = "SEEDS_CONSUMER_KEY";
pub const CONSUMER_SECRET_ENV: &str = "SEEDS_CONSUMER_SECRET";
pub const ACCESS_KEY_ENV: &str = "SEEDS_ACCESS_KEY";
pub const ACCESS_SECRET_ENV: &str = "SEEDS_ACCESS_SECRET";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("{notifier} was skipped: {reason}")]
    Skipped {
        notifier: String,
        reason: &'static str,
    },
}

/// Result of one publish attempt.
#[must_use]
#[derive(Debug)]
pub enum PublishOutcome {
    Delivered,
    /// Nothing was sent, for a reason that is not a failure
    Skipped(&'static str),
    Failed(PublishError),
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Treat anything but a delivery as an error, for jobs whose only purpose
    /// is the publish.
    pub fn into_result(self, notifier: &str) -> Result<(), PublishError> {
        match self {
            Self::Delivered => Ok(()),
            Self::Skipped(reason) => Err(PublishError::Skipped {
                notifier: notifier.to_string(),
                reason,
            }),
            Self::Failed(e) => Err(e),
        }
    }
}

impl From<Result<(), CommandError>> for PublishOutcome {
    fn from(result: Result<(), CommandError>) -> Self {
        match result {
            Ok(()) => Self::Delivered,
            Err(e) => Self::Failed(e.into()),
        }
    }
}

pub trait Notifier {
    fn name(&self) -> &str;

    fn publish(&mut self, observation: &Observation, image: Option<&Path>) -> PublishOutcome;
}

/// Publish to every notifier in turn; failures are logged and returned.
pub fn publish_all(
    notifiers: &mut [Box<dyn Notifier>],
    observation: &Observation,
    image: Option<&Path>,
) -> Vec<PublishOutcome> {
    notifiers
        .iter_mut()
        .map(|notifier| {
            let outcome = notifier.publish(observation, image);
            match &outcome {
                PublishOutcome::Delivered => info!("Published to {}", notifier.name()),
                PublishOutcome::Skipped(reason) => {
                    debug!("Skipped {}: {}", notifier.name(), reason)
                }
                PublishOutcome::Failed(e) => {
                    warn!("Publishing to {} failed: {}", notifier.name(), e)
                }
            }
            outcome
        })
        .collect()
}

/// `field1=temp&field2=press&field3=light&field4=cct&field5=df`, with `nan`
/// for a disk-free figure the store does not record.
pub fn telemetry_payload(observation: &Observation) -> String {
    let free = format_disk_free(observation.free_disk_mb);

    format!(
        "field1={:.2}&field2={:.2}&field3={}&field4={}&field5={}",
        observation.temperature,
        observation.pressure,
        format_integer(observation.light),
        format_integer(observation.cct),
        free,
    )
}

fn format_disk_free(free_disk_mb: Option<u64>) -> String {
    free_disk_mb.map_or_else(|| "nan".to_string(), |df| df.to_string())
}

/// One-line status for the social feed, in the log's number formats.
pub fn status_line(observation: &Observation) -> String {
    let free = format_disk_free(observation.free_disk_mb);

    format!(
        "{}: Temp: {:.2} C, Press: {:.2} hPa, Light: {} lux, CCT: {}K, Disk Free: {} Mb",
        observation.timestamp_label(),
        observation.temperature,
        observation.pressure,
        format_integer(observation.light),
        format_integer(observation.cct),
        free,
    )
}

/// Publishes readings to a telemetry channel over MQTT/TLS.
pub struct TelemetryNotifier {
    config: TelemetryConfig,
    program: String,
}

impl TelemetryNotifier {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            program: "mosquitto_pub".to_string(),
        }
    }

    /// Use a different client program.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn topic(&self) -> String {
        format!(
            "channels/{}/publish/{}",
            self.config.channel_id, self.config.api_key
        )
    }

    fn command(&self, payload: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-h")
            .arg(&self.config.host)
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg("--capath")
            .arg(CA_PATH)
            .arg("-t")
            .arg(self.topic())
            .arg("-m")
            .arg(payload);
        command
    }
}

impl Notifier for TelemetryNotifier {
    fn name(&self) -> &str {
        "telemetry"
    }

    fn publish(&mut self, observation: &Observation, _image: Option<&Path>) -> PublishOutcome {
        let payload = telemetry_payload(observation);
        debug!("Telemetry payload: {}", payload);
        process::run(&mut self.command(&payload)).into()
    }
}

/// Posts the status line and annotated image to the social feed.
pub struct StatusNotifier {
    config: SocialConfig,
}

impl StatusNotifier {
    pub fn new(config: SocialConfig) -> Self {
        Self { config }
    }

    fn command(&self, status: &str, image: &Path) -> Command {
        let (program, leading) = self
            .config
            .command
            .split_first()
            .map_or(("", &[][..]), |(program, rest)| (program.as_str(), rest));
        let mut command = Command::new(program);
        command
            .args(leading)
            .arg(status)
            .arg(image)
            .env(CONSUMER_KEY_ENV, &self.config.consumer_key)
            .env(CONSUMER_SECRET_ENV, &self.config.consumer_secret)
            .env(ACCESS_KEY_ENV, &self.config.access_key)
            .env(ACCESS_SECRET_ENV, &self.config.access_secret);
        command
    }
}

impl Notifier for StatusNotifier {
    fn name(&self) -> &str {
        "status"
    }

    fn publish(&mut self, observation: &Observation, image: Option<&Path>) -> PublishOutcome {
        let Some(image) = image else {
            return PublishOutcome::Skipped("no annotated image to attach");
        };
        let status = status_line(observation);
        info!("Posting status: {}", status);
        process::run(&mut self.command(&status, image)).into()
    }
}
