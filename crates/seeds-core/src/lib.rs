//! Hardware-independent core library for seeds-rs
//!
//! This crate contains all platform-agnostic logic for the seeds timelapse and
//! environmental logger: sensor trait definitions and register-level drivers
//! written against `embedded-hal`, colour temperature estimation, the
//! tab-separated observation log, trend sparklines, image annotation, and the
//! best-effort notifier boundary.
//!
//! The Raspberry Pi binaries (root package) and the desktop simulator both
//! drive a sensing pass through [`pipeline::Pipeline`].

pub mod annotate;
pub mod camera;
pub mod color;
pub mod config;
pub mod disk;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod observation;
pub mod pipeline;
pub mod process;
pub mod sensors;
pub mod storage;
pub mod timelapse;
pub mod trend;

pub use error::{ErrorCategory, PipelineError};
pub use observation::{Observation, Rgb};
