//! One sensing pass: capture, read, log, summarize, annotate, publish.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use log::{info, warn};

use crate::annotate::{AnnotatedImage, ImageAnnotator};
use crate::camera::Camera;
use crate::config::Config;
use crate::disk::DiskSpaceProbe;
use crate::error::PipelineError;
use crate::notify::{self, Notifier, PublishOutcome, TelemetryNotifier};
use crate::observation::{truncate_to_minute, Observation};
use crate::sensors::EnvironmentSource;
use crate::storage::{LogSchema, LogStore};
use crate::trend::{Sparkline, TrendSummarizer};

/// What a completed pass produced.
#[derive(Debug)]
pub struct PassReport {
    pub observation: Observation,
    pub sparklines: Vec<Sparkline>,
    pub image: AnnotatedImage,
    /// One outcome per notifier, in registration order
    pub published: Vec<PublishOutcome>,
}

pub struct Pipeline<C, E, D> {
    camera: C,
    sensors: E,
    disk: D,
    store: LogStore,
    summarizer: TrendSummarizer,
    annotator: ImageAnnotator,
    notifiers: Vec<Box<dyn Notifier>>,
    data_dir: PathBuf,
}

impl<C, E, D> Pipeline<C, E, D>
where
    C: Camera,
    E: EnvironmentSource,
    D: DiskSpaceProbe,
{
    pub fn new(
        camera: C,
        sensors: E,
        disk: D,
        store: LogStore,
        summarizer: TrendSummarizer,
        annotator: ImageAnnotator,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            camera,
            sensors,
            disk,
            store,
            summarizer,
            annotator,
            notifiers: Vec::new(),
            data_dir: data_dir.into(),
        }
    }

    /// Wire up the pass described by `config`. Telemetry is enabled when the
    /// configuration has a `telemetry` section.
    pub fn from_config(
        config: &Config,
        camera: C,
        sensors: E,
        disk: D,
    ) -> Result<Self, PipelineError> {
        let store = LogStore::new(config.log_path(), config.log.schema);
        let annotator = ImageAnnotator::from_config(config)?;
        let mut pipeline = Self::new(
            camera,
            sensors,
            disk,
            store,
            TrendSummarizer::from_config(&config.trend),
            annotator,
            &config.data_dir,
        );

        if let Some(telemetry) = &config.telemetry {
            pipeline.add_notifier(Box::new(TelemetryNotifier::new(telemetry.clone())));
        }
        Ok(pipeline)
    }

    pub fn add_notifier(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn sensors_mut(&mut self) -> &mut E {
        &mut self.sensors
    }

    /// Run one pass for `now`.
    ///
    /// Capture, sensor, storage and annotation failures abort the pass;
    /// publishing failures are logged and reported in the [`PassReport`].
    /// A pass for a minute that is already archived fails before anything is
    /// captured or logged.
    pub fn run(&mut self, now: NaiveDateTime) -> Result<PassReport, PipelineError> {
        let timestamp = truncate_to_minute(now);
        self.annotator.ensure_archive_free(timestamp)?;

        let photo = self.camera.capture(timestamp)?;
        let readings = self.sensors.read_environment()?;
        let free_disk_mb = match self.store.schema() {
            LogSchema::WithDiskFree => Some(self.disk.free_mb(&self.data_dir)?),
            LogSchema::Legacy => None,
        };

        let observation = Observation::from_readings(timestamp, &readings, free_disk_mb);
        info!(
            "{}: {:.2} C, {:.2} hPa, light {}, cct {}",
            observation.timestamp_label(),
            observation.temperature,
            observation.pressure,
            observation.light,
            observation.cct
        );
        if observation.cct.is_nan() {
            warn!("Colour temperature out of range for {:?}", observation.color);
        }

        self.store.append(&observation)?;
        let sparklines = self.summarizer.summarize(&self.store)?;
        let image = self.annotator.compose(&photo, &observation, &sparklines)?;

        let published =
            notify::publish_all(&mut self.notifiers, &observation, Some(&image.latest));

        Ok(PassReport {
            observation,
            sparklines,
            image,
            published,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CaptureError;
    use crate::config::ImageConfig;
    use crate::disk::FixedDiskProbe;
    use crate::error::ErrorCategory;
    use crate::notify::PublishError;
    use crate::observation::Rgb;
    use crate::process::CommandError;
    use crate::sensors::{EnvironmentReadings, SensorError};
    use chrono::NaiveDate;
    use image::RgbImage;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct StillCamera {
        dir: PathBuf,
    }

    impl Camera for StillCamera {
        fn capture(&mut self, _timestamp: NaiveDateTime) -> Result<PathBuf, CaptureError> {
            let path = self.dir.join("latest.jpg");
            RgbImage::new(160, 120)
                .save(&path)
                .map_err(|e| CaptureError::Write {
                    path: path.clone(),
                    source: std::io::Error::other(e.to_string()),
                })?;
            Ok(path)
        }
    }

    struct FixedBoard(Result<EnvironmentReadings, ()>);

    impl EnvironmentSource for FixedBoard {
        fn read_environment(&mut self) -> Result<EnvironmentReadings, SensorError> {
            self.0.map_err(|()| SensorError::Timeout {
                sensor: "TCS3472",
                operation: "wait for a valid RGBC integration",
            })
        }
    }

    struct Unreachable;

    impl Notifier for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn publish(&mut self, _: &Observation, _: Option<&Path>) -> PublishOutcome {
            PublishOutcome::Failed(PublishError::Command(CommandError::Spawn {
                program: "mosquitto_pub".to_string(),
                source: std::io::Error::other("connection refused"),
            }))
        }
    }

    fn readings() -> EnvironmentReadings {
        EnvironmentReadings {
            light: 412.0,
            color: Rgb::new(120.63, 98.24, 77.91),
            temperature: 21.456,
            pressure: 1013.204,
        }
    }

    fn pipeline(
        dir: &TempDir,
        board: FixedBoard,
    ) -> Pipeline<StillCamera, FixedBoard, FixedDiskProbe> {
        Pipeline::new(
            StillCamera {
                dir: dir.path().to_path_buf(),
            },
            board,
            FixedDiskProbe(2048),
            LogStore::new(dir.path().join("seeds.log"), LogSchema::WithDiskFree),
            TrendSummarizer::default(),
            ImageAnnotator::new(&ImageConfig::default(), dir.path(), None).unwrap(),
            dir.path(),
        )
    }

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 2, 14)
            .unwrap()
            .and_hms_opt(9, minute, 42)
            .unwrap()
    }

    #[test]
    fn test_failing_notifier_does_not_block_outputs() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, FixedBoard(Ok(readings())));
        pipeline.add_notifier(Box::new(Unreachable));

        let report = pipeline.run(at(5)).unwrap();

        assert!(matches!(
            report.published.as_slice(),
            [PublishOutcome::Failed(_)]
        ));
        assert_eq!(report.observation.temperature, 21.46);
        assert_eq!(report.observation.color, Rgb::new(120.6, 98.2, 77.9));
        assert_eq!(report.observation.free_disk_mb, Some(2048));
        assert_eq!(report.sparklines.len(), 4);

        let log = fs::read_to_string(dir.path().join("seeds.log")).unwrap();
        assert_eq!(log.lines().count(), 2);
        let row = log.lines().nth(1).unwrap();
        assert!(row.starts_with("2017-02-14-09-05\t21.46\t1013.20\t412\t120\t98\t77\t"));
        assert!(row.ends_with("\t2048"));

        assert_eq!(report.image.archive, dir.path().join("image_ts-2017-02-14-09-05.jpg"));
        assert_eq!(
            fs::read(&report.image.latest).unwrap(),
            fs::read(&report.image.archive).unwrap()
        );
    }

    #[test]
    fn test_sensor_failure_aborts_before_logging() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, FixedBoard(Err(())));

        let err = pipeline.run(at(5)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Hardware);
        assert!(!dir.path().join("seeds.log").exists());
        assert!(!dir.path().join("latest_ts.jpg").exists());
    }

    #[test]
    fn test_consecutive_passes_grow_the_log() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, FixedBoard(Ok(readings())));

        for minute in [0, 10, 20] {
            pipeline.run(at(minute)).unwrap();
        }

        let rows = pipeline.store().read_all().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(dir.path().join("image_ts-2017-02-14-09-20.jpg").exists());
    }

    #[test]
    fn test_rerun_in_same_minute_leaves_log_untouched() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, FixedBoard(Ok(readings())));
        pipeline.run(at(5)).unwrap();
        let latest = fs::read(dir.path().join("latest_ts.jpg")).unwrap();

        let err = pipeline.run(at(5)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert_eq!(pipeline.store().read_all().unwrap().len(), 1);
        assert_eq!(fs::read(dir.path().join("latest_ts.jpg")).unwrap(), latest);
    }

    #[test]
    fn test_torn_row_does_not_stop_later_passes() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, FixedBoard(Ok(readings())));
        pipeline.run(at(0)).unwrap();

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join("seeds.log"))
            .unwrap();
        std::io::Write::write_all(&mut file, b"2017-02-14-09-10\t21.0").unwrap();
        drop(file);

        for minute in [20, 30, 40] {
            let report = pipeline.run(at(minute)).unwrap();
            assert_eq!(report.sparklines.len(), 4);
        }
        assert!(dir.path().join("image_ts-2017-02-14-09-40.jpg").exists());

        let log = fs::read_to_string(dir.path().join("seeds.log")).unwrap();
        assert_eq!(log.lines().count(), 6);
        assert_eq!(log.lines().nth(2), Some("2017-02-14-09-10\t21.0"));
    }

    #[test]
    fn test_schema_mismatch_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("seeds.log"),
            format!("{}\n", LogSchema::Legacy.header()),
        )
        .unwrap();
        let mut pipeline = pipeline(&dir, FixedBoard(Ok(readings())));

        let err = pipeline.run(at(5)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
