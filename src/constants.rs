// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Kinect v1 depth/color resolution used for every session
pub const SENSOR_WIDTH: u32 = 640;
pub const SENSOR_HEIGHT: u32 = 480;

/// Outbound stream defaults
///
/// The sender resolution is independent of the sensor resolution; the
/// composer scales the depth view to fit.
pub mod sender {
    pub const DEFAULT_NAME: &str = "depth-relay";
    pub const DEFAULT_WIDTH: u32 = 400;
    pub const DEFAULT_HEIGHT: u32 = 300;
}

/// Segmentation defaults
pub mod thresholds {
    pub const DEFAULT_NEAR: u8 = 230;
    pub const DEFAULT_FAR: u8 = 70;
}

/// Blob extraction defaults
pub mod blobs {
    use super::{SENSOR_HEIGHT, SENSOR_WIDTH};

    pub const DEFAULT_MIN_AREA: u32 = 10;
    /// Half of the sensor frame
    pub const DEFAULT_MAX_AREA: u32 = SENSOR_WIDTH * SENSOR_HEIGHT / 2;
    /// Largest blobs kept per frame
    pub const DEFAULT_MAX_BLOBS: usize = 20;
}

/// Point cloud defaults
pub mod point_cloud {
    pub const DEFAULT_STEP: u32 = 2;
    /// Points are drawn mirrored and pushed back by this many millimetres
    pub const VIEW_OFFSET_MM: f32 = 1000.0;
}

/// Sensor motor limits (degrees)
pub mod tilt {
    pub const MIN_DEGREES: i8 = -30;
    pub const MAX_DEGREES: i8 = 30;
}

/// Depth range mapped onto the 8-bit raster (millimetres)
pub mod depth_clip {
    pub const DEFAULT_NEAR_MM: u16 = 500;
    pub const DEFAULT_FAR_MM: u16 = 4000;
}

/// Target tick rate of the processing loop
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Report a stale source after this many ticks without a new frame
pub const STALE_TICK_WARNING: u64 = 120;

/// Timeout used while waiting for the transport pipeline to start
pub const SINK_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Tick interval for a given frame rate
pub fn tick_interval(frame_rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / frame_rate.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval() {
        assert_eq!(tick_interval(50), Duration::from_millis(20));
        // A zero frame rate must not divide by zero
        assert_eq!(tick_interval(0), Duration::from_secs(1));
    }

    #[test]
    fn test_default_max_area_is_half_frame() {
        assert_eq!(blobs::DEFAULT_MAX_AREA, 153_600);
    }
}
