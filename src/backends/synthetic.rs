// SPDX-License-Identifier: GPL-3.0-only

//! Generated depth source
//!
//! Runs the full pipeline without a sensor. Two scenes are available: a fixed
//! raster handed in by the caller (test fixtures) and an animated demo with a
//! ball circling in front of a back wall.

use super::depth_map::{DepthMapping, Intrinsics};
use super::{BackendError, BackendResult, DepthSource, LedMode, SensorControl};
use crate::constants::{depth_clip, tilt};
use crate::pipeline::{DepthRaster, Rgb};
use image::RgbImage;
use tracing::{debug, info};

const WALL_MM: f32 = 3000.0;
const BALL_MM: f32 = 1200.0;
const GRAVITY: f32 = 9.81;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scene {
    /// Caller-provided raster, one new frame per push
    Fixed,
    /// Animated ball, one new frame per update
    Orbit,
}

pub struct SyntheticSource {
    scene: Scene,
    width: u32,
    height: u32,
    mapping: DepthMapping,
    intrinsics: Intrinsics,
    depth: Option<DepthRaster>,
    distance_mm: Vec<f32>,
    color: Option<RgbImage>,
    pending: bool,
    frame_new: bool,
    connected: bool,
    frame_index: u64,
    tilt_degrees: i8,
    led: LedMode,
    has_motor: bool,
}

impl SyntheticSource {
    /// Source that yields `raster` once as a fresh frame, then goes stale
    ///
    /// Distances are reconstructed from raster values with the default clip
    /// range, near values white.
    pub fn from_raster(raster: DepthRaster) -> Self {
        let mut source = Self::empty(Scene::Fixed, raster.width(), raster.height());
        source.connected = true;
        source.push_raster(raster);
        source
    }

    /// Animated demo scene; produces frames once opened
    pub fn orbit(width: u32, height: u32, mapping: DepthMapping) -> Self {
        info!(width, height, "Creating synthetic orbit source");
        let mut source = Self::empty(Scene::Orbit, width, height);
        source.mapping = mapping;
        source
    }

    fn empty(scene: Scene, width: u32, height: u32) -> Self {
        Self {
            scene,
            width,
            height,
            mapping: DepthMapping::new(
                depth_clip::DEFAULT_NEAR_MM,
                depth_clip::DEFAULT_FAR_MM,
                true,
            ),
            intrinsics: Intrinsics::KINECT_V1.scaled_to(width),
            depth: None,
            distance_mm: Vec::new(),
            color: None,
            pending: false,
            frame_new: false,
            connected: false,
            frame_index: 0,
            tilt_degrees: 0,
            led: LedMode::default(),
            has_motor: true,
        }
    }

    /// Behave like a sensor without motor, LED or accelerometer
    pub fn without_motor(mut self) -> Self {
        self.has_motor = false;
        self
    }

    /// Replace the fixed raster; the next update reports a new frame
    pub fn push_raster(&mut self, raster: DepthRaster) {
        self.width = raster.width();
        self.height = raster.height();
        self.intrinsics = Intrinsics::KINECT_V1.scaled_to(self.width);
        self.distance_mm = raster
            .as_raw()
            .iter()
            .map(|&v| self.mapping.to_mm(v))
            .collect();
        self.color = Some(RgbImage::from_fn(raster.width(), raster.height(), |x, y| {
            let v = raster.get(x, y);
            image::Rgb([v, v, v])
        }));
        self.depth = Some(raster);
        self.pending = true;
    }

    pub fn tilt_degrees(&self) -> i8 {
        self.tilt_degrees
    }

    pub fn led(&self) -> LedMode {
        self.led
    }

    pub fn near_value_white(&self) -> bool {
        self.mapping.near_white()
    }

    fn render_orbit(&mut self) {
        let (w, h) = (self.width, self.height);
        let phase = self.frame_index as f32 * 0.03;
        let center_x = w as f32 * (0.5 + 0.3 * phase.cos());
        let center_y = h as f32 * (0.5 + 0.25 * phase.sin());
        let radius = w as f32 * 0.12;

        let mut mm = vec![0.0f32; (w * h) as usize];
        let mut color = RgbImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let dx = x as f32 - center_x;
                let dy = y as f32 - center_y;
                let r2 = (dx * dx + dy * dy) / (radius * radius);
                let idx = (y * w + x) as usize;

                // A strip along the left edge returns nothing
                if x < w / 32 {
                    continue;
                }

                if r2 < 1.0 {
                    let bulge = (1.0 - r2).sqrt();
                    mm[idx] = BALL_MM - bulge * radius;
                    let shade = (120.0 + 135.0 * bulge) as u8;
                    color.put_pixel(x, y, image::Rgb([shade, 60, 40]));
                } else {
                    mm[idx] = WALL_MM + (y as f32 / h as f32) * 400.0;
                    let shade = (60 + (x * 120 / w.max(1))) as u8;
                    color.put_pixel(x, y, image::Rgb([40, shade, 140]));
                }
            }
        }

        let raster: Vec<u8> = mm.iter().map(|&d| self.mapping.to_gray(d as u16)).collect();
        self.depth = DepthRaster::from_raw(w, h, raster);
        self.distance_mm = mm;
        self.color = Some(color);
        self.frame_index += 1;
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }
}

impl DepthSource for SyntheticSource {
    fn update(&mut self) {
        self.frame_new = false;
        if !self.connected {
            return;
        }
        match self.scene {
            Scene::Fixed => {
                self.frame_new = std::mem::take(&mut self.pending);
            }
            Scene::Orbit => {
                self.render_orbit();
                self.frame_new = true;
            }
        }
    }

    fn is_frame_new(&self) -> bool {
        self.frame_new
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn depth_raster(&self) -> Option<&DepthRaster> {
        self.depth.as_ref()
    }

    fn distance_at(&self, x: u32, y: u32) -> f32 {
        self.index(x, y)
            .and_then(|i| self.distance_mm.get(i).copied())
            .unwrap_or(0.0)
    }

    fn color_at(&self, x: u32, y: u32) -> Rgb {
        match &self.color {
            Some(color) if x < color.width() && y < color.height() => {
                let [r, g, b] = color.get_pixel(x, y).0;
                Rgb::new(r, g, b)
            }
            _ => Rgb::BLACK,
        }
    }

    fn color_image(&self) -> Option<&RgbImage> {
        self.color.as_ref()
    }

    fn world_coordinate_at(&self, x: u32, y: u32) -> [f32; 3] {
        self.intrinsics.unproject(x, y, self.distance_at(x, y))
    }
}

impl SensorControl for SyntheticSource {
    fn open(&mut self) -> BackendResult<()> {
        if !self.connected {
            info!("Synthetic source opened");
            self.connected = true;
            self.pending = self.depth.is_some();
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.connected {
            info!("Synthetic source closed");
        }
        self.connected = false;
        self.frame_new = false;
    }

    fn has_tilt_control(&self) -> bool {
        self.has_motor
    }

    fn set_tilt(&mut self, degrees: i8) -> BackendResult<()> {
        if !self.has_motor {
            return Err(BackendError::NotAvailable("no tilt control on this device".into()));
        }
        self.tilt_degrees = degrees.clamp(tilt::MIN_DEGREES, tilt::MAX_DEGREES);
        debug!(degrees = self.tilt_degrees, "Synthetic tilt set");
        Ok(())
    }

    fn set_led(&mut self, mode: LedMode) -> BackendResult<()> {
        self.led = mode;
        debug!(%mode, "Synthetic LED set");
        Ok(())
    }

    fn set_near_value_white(&mut self, enabled: bool) {
        self.mapping.set_near_white(enabled);
    }

    /// Gravity as seen by a sensor pitched by the current tilt
    fn accelerometer(&self) -> Option<[f32; 3]> {
        if !self.has_motor {
            return None;
        }
        let pitch = (self.tilt_degrees as f32).to_radians();
        Some([0.0, GRAVITY * pitch.cos(), GRAVITY * pitch.sin()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_raster_is_new_once() {
        let raster = DepthRaster::from_rows(&[[0u8, 255], [128, 0]]).unwrap();
        let mut source = SyntheticSource::from_raster(raster);

        source.update();
        assert!(source.is_frame_new());
        source.update();
        assert!(!source.is_frame_new());
        assert!(source.depth_raster().is_some());
    }

    #[test]
    fn test_zero_depth_has_no_distance() {
        let raster = DepthRaster::from_rows(&[[0u8, 255]]).unwrap();
        let source = SyntheticSource::from_raster(raster);
        assert_eq!(source.distance_at(0, 0), 0.0);
        assert_eq!(source.distance_at(1, 0), 500.0);
        assert_eq!(source.distance_at(5, 5), 0.0);
        assert_eq!(source.world_coordinate_at(0, 0), [0.0; 3]);
    }

    #[test]
    fn test_orbit_needs_open() {
        let mut source = SyntheticSource::orbit(64, 48, DepthMapping::new(500, 4000, true));
        source.update();
        assert!(!source.is_frame_new());
        assert!(source.depth_raster().is_none());

        source.open().unwrap();
        source.update();
        assert!(source.is_frame_new());
        let depth = source.depth_raster().unwrap();
        assert_eq!((depth.width(), depth.height()), (64, 48));
        // Left strip has no return
        assert_eq!(source.distance_at(0, 10), 0.0);
    }

    #[test]
    fn test_orbit_ball_is_brighter_than_wall() {
        let mut source = SyntheticSource::orbit(64, 48, DepthMapping::new(500, 4000, true));
        source.open().unwrap();
        source.update();
        let depth = source.depth_raster().unwrap();
        let max = depth.as_raw().iter().copied().max().unwrap();
        // Wall sits around 3000-3400 mm, ball around 1200 mm
        assert!(max > depth.get(63, 0));
    }

    #[test]
    fn test_orbit_color_image_matches_depth_size() {
        let mut source = SyntheticSource::orbit(32, 24, DepthMapping::new(500, 4000, true));
        assert!(source.color_image().is_none());
        source.open().unwrap();
        source.update();
        let color = source.color_image().unwrap();
        assert_eq!(color.dimensions(), (32, 24));
    }

    #[test]
    fn test_accelerometer_follows_tilt() {
        let raster = DepthRaster::from_rows(&[[10u8]]).unwrap();
        let mut source = SyntheticSource::from_raster(raster);
        let level = source.accelerometer().unwrap();
        assert_eq!(level, [0.0, GRAVITY, 0.0]);

        source.set_tilt(30).unwrap();
        let tilted = source.accelerometer().unwrap();
        assert!((tilted[2] - GRAVITY / 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_close_stops_frames() {
        let raster = DepthRaster::from_rows(&[[10u8]]).unwrap();
        let mut source = SyntheticSource::from_raster(raster);
        source.close();
        source.update();
        assert!(!source.is_frame_new());
        source.open().unwrap();
        source.update();
        assert!(source.is_frame_new());
    }
}
