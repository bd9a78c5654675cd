// SPDX-License-Identifier: GPL-3.0-only

//! Sensor and transport backends
//!
//! The processing pipeline only sees three narrow interfaces:
//!
//! - [`DepthSource`]: latest depth raster plus per-pixel distance, color and
//!   world-coordinate lookups
//! - [`SensorControl`]: open/close, motor tilt, LED, depth mapping mode and
//!   accelerometer
//! - [`FrameSink`]: fire-and-forget hand-off of the outbound raster
//!
//! Concrete implementations:
//!
//! - [`kinect`]: Kinect v1 through the V4L2 kernel driver
//! - [`synthetic`]: generated scenes for tests and device-less runs
//! - [`stream`]: GStreamer transport and an in-memory sink

pub mod depth_map;
pub mod kinect;
pub mod stream;
pub mod synthetic;
mod types;

pub use types::{BackendError, BackendResult, LedMode};

use crate::pipeline::{DepthRaster, OutboundFrame, Rgb};
use image::RgbImage;

/// Source of synchronized depth and color frames
///
/// Lookups outside the frame, or before the first frame arrived, return
/// invalid values (distance 0, black, origin) rather than failing.
pub trait DepthSource {
    /// Pull the most recent frame from the device, if any
    fn update(&mut self);

    /// True if the last [`update`](Self::update) produced a new frame
    fn is_frame_new(&self) -> bool;

    fn is_connected(&self) -> bool;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Latest 8-bit depth raster, `None` until the first frame
    fn depth_raster(&self) -> Option<&DepthRaster>;

    /// Distance in millimetres; `<= 0` means no return
    fn distance_at(&self, x: u32, y: u32) -> f32;

    /// Registered color of the depth pixel
    fn color_at(&self, x: u32, y: u32) -> Rgb;

    /// Latest color camera image, unregistered
    fn color_image(&self) -> Option<&RgbImage>;

    /// Position in sensor space (millimetres)
    fn world_coordinate_at(&self, x: u32, y: u32) -> [f32; 3];
}

/// Device management operations driven by user input
pub trait SensorControl {
    fn open(&mut self) -> BackendResult<()>;

    fn close(&mut self);

    fn has_tilt_control(&self) -> bool;

    fn set_tilt(&mut self, degrees: i8) -> BackendResult<()>;

    fn set_led(&mut self, mode: LedMode) -> BackendResult<()>;

    /// Map near objects to bright values (true) or dark values (false)
    fn set_near_value_white(&mut self, enabled: bool);

    /// Gravity vector in m/s², `None` if the device reports none
    fn accelerometer(&self) -> Option<[f32; 3]>;
}

/// A device that is both a frame source and controllable
pub trait Sensor: DepthSource + SensorControl {}

impl<T: DepthSource + SensorControl + ?Sized> Sensor for T {}

impl<S: DepthSource + ?Sized> DepthSource for Box<S> {
    fn update(&mut self) {
        (**self).update()
    }

    fn is_frame_new(&self) -> bool {
        (**self).is_frame_new()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn depth_raster(&self) -> Option<&DepthRaster> {
        (**self).depth_raster()
    }

    fn distance_at(&self, x: u32, y: u32) -> f32 {
        (**self).distance_at(x, y)
    }

    fn color_at(&self, x: u32, y: u32) -> Rgb {
        (**self).color_at(x, y)
    }

    fn color_image(&self) -> Option<&RgbImage> {
        (**self).color_image()
    }

    fn world_coordinate_at(&self, x: u32, y: u32) -> [f32; 3] {
        (**self).world_coordinate_at(x, y)
    }
}

impl<S: SensorControl + ?Sized> SensorControl for Box<S> {
    fn open(&mut self) -> BackendResult<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn has_tilt_control(&self) -> bool {
        (**self).has_tilt_control()
    }

    fn set_tilt(&mut self, degrees: i8) -> BackendResult<()> {
        (**self).set_tilt(degrees)
    }

    fn set_led(&mut self, mode: LedMode) -> BackendResult<()> {
        (**self).set_led(mode)
    }

    fn set_near_value_white(&mut self, enabled: bool) {
        (**self).set_near_value_white(enabled)
    }

    fn accelerometer(&self) -> Option<[f32; 3]> {
        (**self).accelerometer()
    }
}

/// Receiver of outbound frames
pub trait FrameSink {
    /// Hand over one frame. Failures are logged by the sink, never returned.
    fn send_frame(&mut self, frame: &OutboundFrame);
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn send_frame(&mut self, frame: &OutboundFrame) {
        (**self).send_frame(frame)
    }
}
