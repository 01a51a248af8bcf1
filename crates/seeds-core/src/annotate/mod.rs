//! Photo overlay: timestamp, current readings and trend sparklines.

mod canvas;
mod layout;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageError, RgbImage, RgbaImage};
use log::{debug, info};
use thiserror::Error;

use crate::config::{Config, ImageConfig};
use crate::observation::{Observation, TIMESTAMP_FORMAT};
use crate::trend::Sparkline;

pub use canvas::{Canvas, Magnified};
use layout::*;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("watermark {} not found", .0.display())]
    MissingWatermark(PathBuf),
    #[error("failed to load watermark {}: {source}", .path.display())]
    Watermark {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("failed to read photo {}: {source}", .path.display())]
    Photo {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("archive image {} already exists", .0.display())]
    ArchiveExists(PathBuf),
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Output of one [`ImageAnnotator::compose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedImage {
    /// Overwritten on every pass
    pub latest: PathBuf,
    /// `<archive_prefix>YYYY-MM-DD-HH-MM.jpg`, never overwritten
    pub archive: PathBuf,
}

struct Watermark {
    image: RgbaImage,
    x: i64,
    y: i64,
}

pub struct ImageAnnotator {
    width: u32,
    height: u32,
    watermark: Option<Watermark>,
    output_dir: PathBuf,
    latest_name: String,
    archive_prefix: String,
    jpeg_quality: u8,
}

impl ImageAnnotator {
    /// Build an annotator writing into `output_dir`.
    ///
    /// The watermark, if any, is decoded once here so a missing asset is
    /// reported before the camera fires.
    pub fn new(
        config: &ImageConfig,
        output_dir: impl Into<PathBuf>,
        watermark: Option<&Path>,
    ) -> Result<Self, AnnotateError> {
        let watermark = watermark.map(load_watermark).transpose()?.map(|image| Watermark {
            image,
            x: config.watermark_position.0,
            y: config.watermark_position.1,
        });

        Ok(Self {
            width: config.width,
            height: config.height,
            watermark,
            output_dir: output_dir.into(),
            latest_name: config.latest_name.clone(),
            archive_prefix: config.archive_prefix.clone(),
            jpeg_quality: config.jpeg_quality,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AnnotateError> {
        Self::new(
            &config.image,
            &config.data_dir,
            config.watermark_path().as_deref(),
        )
    }

    pub fn latest_path(&self) -> PathBuf {
        self.output_dir.join(&self.latest_name)
    }

    /// Archive image for a pass at `timestamp` (minute resolution).
    pub fn archive_path(&self, timestamp: NaiveDateTime) -> PathBuf {
        self.output_dir.join(format!(
            "{}{}.jpg",
            self.archive_prefix,
            timestamp.format(TIMESTAMP_FORMAT)
        ))
    }

    /// Fail early when a pass at `timestamp` has already been archived.
    pub fn ensure_archive_free(&self, timestamp: NaiveDateTime) -> Result<(), AnnotateError> {
        let archive = self.archive_path(timestamp);
        if archive.exists() {
            return Err(AnnotateError::ArchiveExists(archive));
        }
        Ok(())
    }

    /// Overlay `observation` and `sparklines` on `photo`, write the latest
    /// image and copy it to the archive.
    pub fn compose(
        &self,
        photo: &Path,
        observation: &Observation,
        sparklines: &[Sparkline],
    ) -> Result<AnnotatedImage, AnnotateError> {
        let source = image::open(photo).map_err(|source| AnnotateError::Photo {
            path: photo.to_path_buf(),
            source,
        })?;
        let rendered = self.render(source, observation, sparklines);

        let latest = self.latest_path();
        self.write_jpeg(&rendered, &latest)?;

        let archive = self.archive_path(observation.timestamp);
        copy_new(&latest, &archive)?;

        info!("Annotated image written to {}", archive.display());
        Ok(AnnotatedImage { latest, archive })
    }

    /// Resize `photo` to the canvas and draw the overlay.
    pub fn render(
        &self,
        photo: DynamicImage,
        observation: &Observation,
        sparklines: &[Sparkline],
    ) -> RgbImage {
        let mut base = photo
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgba8();
        if let Some(watermark) = &self.watermark {
            imageops::overlay(&mut base, &watermark.image, watermark.x, watermark.y);
        }

        let mut canvas = Canvas::new(DynamicImage::ImageRgba8(base).to_rgb8());
        for (y, line) in text_lines(observation) {
            draw_text(&mut canvas, &line, y);
        }
        for (row, sparkline) in sparklines.iter().enumerate() {
            let top = SPARKLINE_TOP_PX + SPARKLINE_PITCH_PX * row as i32;
            draw_sparkline(&mut canvas, sparkline, top);
        }

        canvas.into_image()
    }

    fn write_jpeg(&self, image: &RgbImage, path: &Path) -> Result<(), AnnotateError> {
        let file = File::create(path).map_err(|source| AnnotateError::Io {
            action: "create",
            path: path.to_path_buf(),
            source,
        })?;
        let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), self.jpeg_quality);
        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|source| AnnotateError::Encode {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Wrote {}x{} JPEG to {}", image.width(), image.height(), path.display());
        Ok(())
    }
}

fn load_watermark(path: &Path) -> Result<RgbaImage, AnnotateError> {
    if !path.is_file() {
        return Err(AnnotateError::MissingWatermark(path.to_path_buf()));
    }
    let image = image::open(path).map_err(|source| AnnotateError::Watermark {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgba8())
}

/// Copy `from` to a file that must not exist yet.
fn copy_new(from: &Path, to: &Path) -> Result<(), AnnotateError> {
    let io_error = |action, path: &Path| {
        let path = path.to_path_buf();
        move |source| AnnotateError::Io {
            action,
            path,
            source,
        }
    };

    let mut reader = File::open(from).map_err(io_error("open", from))?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .map_err(io_error("create archive", to))?;
    if let Err(source) = io::copy(&mut reader, &mut writer) {
        drop(writer);
        let _ = fs::remove_file(to);
        return Err(io_error("copy into", to)(source));
    }
    Ok(())
}

/// Overlay text rows as (top y, text), top to bottom.
fn text_lines(observation: &Observation) -> [(i32, String); 6] {
    let [r, g, b] = observation.color.channels().map(|c| c.trunc() as i64);

    [
        (TIMESTAMP_Y_PX, observation.display_timestamp()),
        (TEMPERATURE_Y_PX, format!("Temp: {:.1}", observation.temperature)),
        (PRESSURE_Y_PX, format!("Press: {:.0}", observation.pressure)),
        (LIGHT_Y_PX, format!("Light: {:.0}", observation.light)),
        (RGB_Y_PX, format!("RGB: {r},{g},{b}")),
        (CCT_Y_PX, format!("CCT:  {:.0}", observation.cct)),
    ]
}

fn draw_text(canvas: &mut Canvas, text: &str, top: i32) {
    let style = MonoTextStyle::new(TEXT_FONT, TEXT_COLOR);
    let mut target = Magnified::new(canvas, Point::new(MARGIN_LEFT_PX, top), TEXT_SCALE);
    let Ok(_) = Text::with_baseline(text, Point::zero(), style, Baseline::Top).draw(&mut target);
}

/// Bar height in pixels for a glyph level, bottom-aligned in its row.
fn bar_height(level: u8) -> u32 {
    (u32::from(level) + 1) * SPARKLINE_HEIGHT_PX / crate::trend::GLYPHS.len() as u32
}

fn draw_sparkline(canvas: &mut Canvas, sparkline: &Sparkline, top: i32) {
    let bottom = top + SPARKLINE_HEIGHT_PX as i32;
    let style = PrimitiveStyle::with_fill(TEXT_COLOR);

    for (i, level) in sparkline.levels.iter().enumerate() {
        let Some(level) = level else {
            continue;
        };
        let height = bar_height(*level);
        let x = MARGIN_LEFT_PX + SPARKLINE_CELL_WIDTH_PX * i as i32;
        let Ok(_) = Rectangle::new(
            Point::new(x, bottom - height as i32),
            Size::new(SPARKLINE_BAR_WIDTH_PX, height),
        )
        .into_styled(style)
        .draw(canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metric;
    use crate::observation::Rgb;
    use chrono::NaiveDate;
    use image::Rgba;
    use tempfile::TempDir;

    fn observation() -> Observation {
        Observation {
            timestamp: NaiveDate::from_ymd_opt(2017, 2, 14)
                .unwrap()
                .and_hms_opt(9, 5, 0)
                .unwrap(),
            temperature: 21.46,
            pressure: 1013.2,
            light: 412.0,
            color: Rgb::new(120.6, 98.2, 77.9),
            cct: 3890.0,
            free_disk_mb: Some(2048),
        }
    }

    fn black_photo(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("latest.jpg");
        RgbImage::new(320, 240).save(&path).unwrap();
        path
    }

    fn is_white(image: &RgbImage, x: u32, y: u32) -> bool {
        image.get_pixel(x, y).0.iter().all(|&c| c > 200)
    }

    #[test]
    fn test_text_lines() {
        let lines = text_lines(&observation());
        let text: Vec<&str> = lines.iter().map(|(_, t)| t.as_str()).collect();

        assert_eq!(
            text,
            [
                "09:05, Tue. 14 Feb 2017",
                "Temp: 21.5",
                "Press: 1013",
                "Light: 412",
                "RGB: 120,98,77",
                "CCT:  3890",
            ]
        );
        let ys: Vec<i32> = lines.iter().map(|(y, _)| *y).collect();
        assert_eq!(ys, [10, 50, 90, 130, 170, 210]);
    }

    #[test]
    fn test_bar_heights() {
        assert_eq!(bar_height(0), 2);
        assert_eq!(bar_height(3), 10);
        assert_eq!(bar_height(7), 20);
    }

    #[test]
    fn test_render_draws_text_and_bars() {
        let annotator = ImageAnnotator::new(&ImageConfig::default(), "/unused", None).unwrap();
        let sparkline = Sparkline {
            metric: Metric::Temperature,
            levels: vec![Some(7), Some(0), None],
        };
        let image = annotator.render(
            DynamicImage::new_rgb8(64, 48),
            &observation(),
            &[sparkline],
        );

        assert_eq!(image.dimensions(), (1438, 1080));

        let text_band_lit = (10..50)
            .flat_map(|y| (10..300).map(move |x| (x, y)))
            .any(|(x, y)| is_white(&image, x, y));
        assert!(text_band_lit);

        // Full bar in the first cell, a 2 px stub in the second, nothing in the third
        assert!(is_white(&image, 12, 266));
        assert!(!is_white(&image, 22, 266));
        assert!(is_white(&image, 22, 284));
        assert!(!is_white(&image, 32, 284));
        assert!(!is_white(&image, 500, 700));
    }

    #[test]
    fn test_compose_writes_identical_latest_and_archive() {
        let dir = TempDir::new().unwrap();
        let photo = black_photo(&dir);
        let annotator = ImageAnnotator::new(&ImageConfig::default(), dir.path(), None).unwrap();

        let output = annotator.compose(&photo, &observation(), &[]).unwrap();
        assert_eq!(output.latest, dir.path().join("latest_ts.jpg"));
        assert_eq!(
            output.archive,
            dir.path().join("image_ts-2017-02-14-09-05.jpg")
        );
        assert_eq!(fs::read(&output.latest).unwrap(), fs::read(&output.archive).unwrap());

        let decoded = image::open(&output.latest).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1438, 1080));
    }

    #[test]
    fn test_archive_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let photo = black_photo(&dir);
        let annotator = ImageAnnotator::new(&ImageConfig::default(), dir.path(), None).unwrap();

        annotator.compose(&photo, &observation(), &[]).unwrap();
        assert!(matches!(
            annotator.compose(&photo, &observation(), &[]),
            Err(AnnotateError::Io { action: "create archive", .. })
        ));
    }

    #[test]
    fn test_ensure_archive_free() {
        let dir = TempDir::new().unwrap();
        let photo = black_photo(&dir);
        let annotator = ImageAnnotator::new(&ImageConfig::default(), dir.path(), None).unwrap();
        let timestamp = observation().timestamp;

        annotator.ensure_archive_free(timestamp).unwrap();
        annotator.compose(&photo, &observation(), &[]).unwrap();
        assert!(matches!(
            annotator.ensure_archive_free(timestamp),
            Err(AnnotateError::ArchiveExists(path)) if path == annotator.archive_path(timestamp)
        ));
    }

    #[test]
    fn test_missing_watermark_fails_construction() {
        let dir = TempDir::new().unwrap();
        let result = ImageAnnotator::new(
            &ImageConfig::default(),
            dir.path(),
            Some(&dir.path().join("watermark.png")),
        );
        assert!(matches!(result, Err(AnnotateError::MissingWatermark(_))));
    }

    #[test]
    fn test_watermark_is_pasted() {
        let dir = TempDir::new().unwrap();
        let mark = dir.path().join("watermark.png");
        RgbaImage::from_pixel(40, 40, Rgba([255, 0, 0, 255]))
            .save(&mark)
            .unwrap();

        let annotator =
            ImageAnnotator::new(&ImageConfig::default(), dir.path(), Some(&mark)).unwrap();
        let image = annotator.render(DynamicImage::new_rgb8(64, 48), &observation(), &[]);

        assert_eq!(image.get_pixel(5, 1000).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(50, 1000).0, [0, 0, 0]);
    }

    #[test]
    fn test_unreadable_photo() {
        let dir = TempDir::new().unwrap();
        let photo = dir.path().join("latest.jpg");
        fs::write(&photo, b"not a jpeg").unwrap();
        let annotator = ImageAnnotator::new(&ImageConfig::default(), dir.path(), None).unwrap();

        assert!(matches!(
            annotator.compose(&photo, &observation(), &[]),
            Err(AnnotateError::Photo { .. })
        ));
    }
}
