// SPDX-License-Identifier: GPL-3.0-only

//! depth-relay - Kinect depth segmentation and streaming
//!
//! Takes depth frames from a Kinect v1, gates them into a foreground mask
//! with a near/far threshold band, extracts blob contours, optionally builds
//! a colored point cloud, and republishes the depth image as a live video
//! stream.
//!
//! # Architecture
//!
//! - [`pipeline`]: per-frame processing stages and the [`Pipeline`] driver
//! - [`backends`]: depth sources (Kinect, synthetic) and frame sinks
//!   (GStreamer, in-memory)
//! - [`app`]: session state, input dispatch and the headless loop
//! - [`terminal`]: terminal viewer
//! - [`config`]: persisted settings

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipeline;
pub mod terminal;

pub use app::App;
pub use config::Settings;
pub use errors::{AppError, AppResult};
pub use pipeline::{InputEvent, Pipeline, PipelineConfig, SegmentationPolicy};
