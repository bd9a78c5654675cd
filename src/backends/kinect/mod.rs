// SPDX-License-Identifier: GPL-3.0-only

//! Kinect v1 through the V4L2 kernel driver
//!
//! Depth and color are captured on two background threads. Depth frames are
//! handed to the control thread over a bounded channel; color is published
//! as a single latest image. [`KinectSource::update`] drains the channel and
//! keeps only the newest depth frame.
//!
//! Motor tilt uses the driver's camera-class tilt controls. The LED and the
//! accelerometer are not exposed by the kernel driver. Color lookups are
//! registered to depth with a per-millimetre baseline shift.

mod controls;
mod discovery;
mod format_converters;
mod frame_loop;

pub use discovery::{KinectDevicePair, find_kinect_pairs, select_pair};
pub use frame_loop::{CaptureLoopController, LoopAction};

use super::depth_map::{DepthMapping, Intrinsics, Registration};
use super::{BackendError, BackendResult, DepthSource, LedMode, SensorControl};
use crate::constants::{SENSOR_HEIGHT, SENSOR_WIDTH};
use crate::pipeline::{DepthRaster, Rgb};
use discovery::{FOURCC_GRBG, FOURCC_UYVY, FOURCC_Y10B, FOURCC_Y16};
use futures::channel::mpsc;
use image::RgbImage;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

const CAPTURE_BUFFERS: u32 = 4;
const DEPTH_CHANNEL_CAPACITY: usize = 4;
const CAPTURE_TIMEOUT: Duration = Duration::from_millis(250);

/// Depth frame in millimetres, 0 = no return
struct DepthFrame {
    depth_mm: Vec<u16>,
    sequence: u64,
}

struct DepthCapture {
    stream: Stream<'static>,
    fourcc: FourCC,
    width: u32,
    height: u32,
    sequence: u64,
    sender: mpsc::Sender<DepthFrame>,
}

struct ColorCapture {
    stream: Stream<'static>,
    fourcc: FourCC,
    width: u32,
    height: u32,
}

/// Open `path` with the first format of `preferred` the driver accepts
fn open_stream(
    path: &str,
    width: u32,
    height: u32,
    preferred: &[[u8; 4]],
) -> Result<(Stream<'static>, Format), String> {
    let dev = Device::with_path(path).map_err(|e| format!("Failed to open {}: {}", path, e))?;

    let mut format = None;
    for code in preferred {
        if let Ok(f) = dev.set_format(&Format::new(width, height, FourCC::new(code)))
            && f.fourcc == FourCC::new(code)
        {
            format = Some(f);
            break;
        }
    }
    let format = format.ok_or_else(|| format!("No supported format on {}", path))?;

    info!(
        path,
        width = format.width,
        height = format.height,
        fourcc = %format.fourcc,
        "V4L2 format configured"
    );

    let mut stream = Stream::with_buffers(&dev, Type::VideoCapture, CAPTURE_BUFFERS)
        .map_err(|e| format!("Failed to create stream on {}: {}", path, e))?;
    stream.set_timeout(CAPTURE_TIMEOUT);
    Ok((stream, format))
}

fn depth_loop(state: &mut DepthCapture) -> LoopAction {
    let depth_mm = match state.stream.next() {
        Ok((buf, _meta)) => {
            if state.fourcc == FourCC::new(&FOURCC_Y16) {
                format_converters::y16_to_mm(buf, state.width, state.height)
            } else {
                format_converters::y10b_to_mm(buf, state.width, state.height)
            }
        }
        Err(e) if e.kind() == ErrorKind::TimedOut => return LoopAction::Continue,
        Err(e) => {
            warn!(error = %e, "Failed to capture depth frame");
            return LoopAction::Continue;
        }
    };

    if depth_mm.len() != (state.width * state.height) as usize {
        debug!(len = depth_mm.len(), "Short depth buffer, skipping");
        return LoopAction::Continue;
    }

    state.sequence += 1;
    let frame = DepthFrame {
        depth_mm,
        sequence: state.sequence,
    };
    match state.sender.try_send(frame) {
        Ok(()) => LoopAction::Continue,
        Err(e) if e.is_disconnected() => LoopAction::Stop,
        Err(_) => {
            debug!("Depth channel full, dropping frame");
            LoopAction::Continue
        }
    }
}

fn color_loop(state: &mut ColorCapture, latest: &Mutex<Option<RgbImage>>) -> LoopAction {
    let image = match state.stream.next() {
        Ok((buf, _meta)) => {
            if state.fourcc == FourCC::new(&FOURCC_UYVY) {
                format_converters::uyvy_to_rgb(buf, state.width, state.height)
            } else {
                format_converters::grbg_to_rgb(buf, state.width, state.height)
            }
        }
        Err(e) if e.kind() == ErrorKind::TimedOut => return LoopAction::Continue,
        Err(e) => {
            warn!(error = %e, "Failed to capture color frame");
            return LoopAction::Continue;
        }
    };

    if let Ok(mut guard) = latest.lock() {
        *guard = Some(image);
    }
    LoopAction::Continue
}

/// Kinect sensor as a [`DepthSource`] and [`SensorControl`]
pub struct KinectSource {
    pair: KinectDevicePair,
    tilt_node: Option<String>,
    mapping: DepthMapping,
    intrinsics: Intrinsics,
    registration: Registration,
    depth_rx: Option<mpsc::Receiver<DepthFrame>>,
    latest_color: Arc<Mutex<Option<RgbImage>>>,
    depth_loop: Option<CaptureLoopController>,
    color_loop: Option<CaptureLoopController>,
    depth_mm: Vec<u16>,
    raster: Option<DepthRaster>,
    color: Option<RgbImage>,
    frame_new: bool,
    last_sequence: u64,
}

impl KinectSource {
    /// Wrap a device pair; capture starts on [`open`](SensorControl::open)
    pub fn new(pair: KinectDevicePair, mapping: DepthMapping) -> Self {
        let tilt_node = pair.tilt_node().map(str::to_string);
        info!(
            depth_path = %pair.depth_path,
            color_path = %pair.color_path,
            tilt_node = ?tilt_node,
            "Kinect source created"
        );
        Self {
            pair,
            tilt_node,
            mapping,
            intrinsics: Intrinsics::KINECT_V1.scaled_to(SENSOR_WIDTH),
            registration: Registration::kinect(),
            depth_rx: None,
            latest_color: Arc::new(Mutex::new(None)),
            depth_loop: None,
            color_loop: None,
            depth_mm: Vec::new(),
            raster: None,
            color: None,
            frame_new: false,
            last_sequence: 0,
        }
    }

    /// Open the first Kinect, or the one with depth node `depth_path`
    pub fn discover(depth_path: Option<&str>, mapping: DepthMapping) -> BackendResult<Self> {
        let pair = select_pair(depth_path).ok_or_else(|| {
            BackendError::DeviceNotFound(match depth_path {
                Some(path) => format!("no Kinect with depth node {}", path),
                None => "no Kinect found (is the kinect kernel driver loaded?)".to_string(),
            })
        })?;
        Ok(Self::new(pair, mapping))
    }

    fn start_depth(&mut self) {
        let (sender, receiver) = mpsc::channel(DEPTH_CHANNEL_CAPACITY);
        let path = self.pair.depth_path.clone();
        self.depth_rx = Some(receiver);
        self.depth_loop = Some(CaptureLoopController::start(
            "kinect-depth",
            move || {
                let (stream, format) = open_stream(
                    &path,
                    SENSOR_WIDTH,
                    SENSOR_HEIGHT,
                    &[FOURCC_Y16, FOURCC_Y10B],
                )?;
                Ok(DepthCapture {
                    stream,
                    fourcc: format.fourcc,
                    width: format.width,
                    height: format.height,
                    sequence: 0,
                    sender,
                })
            },
            depth_loop,
        ));
    }

    fn start_color(&mut self) {
        let path = self.pair.color_path.clone();
        let latest = Arc::clone(&self.latest_color);
        self.color_loop = Some(CaptureLoopController::start(
            "kinect-color",
            move || {
                let (stream, format) = open_stream(
                    &path,
                    SENSOR_WIDTH,
                    SENSOR_HEIGHT,
                    &[FOURCC_UYVY, FOURCC_GRBG],
                )?;
                Ok(ColorCapture {
                    stream,
                    fourcc: format.fourcc,
                    width: format.width,
                    height: format.height,
                })
            },
            move |state| color_loop(state, &latest),
        ));
    }

    fn remap_raster(&mut self) {
        let gray: Vec<u8> = self
            .depth_mm
            .iter()
            .map(|&mm| self.mapping.to_gray(mm))
            .collect();
        self.raster = DepthRaster::from_raw(SENSOR_WIDTH, SENSOR_HEIGHT, gray);
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < SENSOR_WIDTH && y < SENSOR_HEIGHT).then(|| (y * SENSOR_WIDTH + x) as usize)
    }
}

impl DepthSource for KinectSource {
    fn update(&mut self) {
        self.frame_new = false;
        let Some(rx) = self.depth_rx.as_mut() else {
            return;
        };

        let mut newest = None;
        while let Ok(Some(frame)) = rx.try_next() {
            newest = Some(frame);
        }
        let Some(frame) = newest else {
            return;
        };
        if frame.depth_mm.len() != (SENSOR_WIDTH * SENSOR_HEIGHT) as usize {
            warn!(
                len = frame.depth_mm.len(),
                expected = SENSOR_WIDTH * SENSOR_HEIGHT,
                "Depth frame size does not match the sensor, dropping"
            );
            return;
        }

        if frame.sequence > self.last_sequence + 1 && self.last_sequence > 0 {
            debug!(
                skipped = frame.sequence - self.last_sequence - 1,
                "Skipped depth frames"
            );
        }
        self.last_sequence = frame.sequence;
        self.depth_mm = frame.depth_mm;
        self.remap_raster();

        if let Ok(guard) = self.latest_color.lock() {
            self.color = guard.clone();
        }
        self.frame_new = true;
    }

    fn is_frame_new(&self) -> bool {
        self.frame_new
    }

    fn is_connected(&self) -> bool {
        self.depth_loop
            .as_ref()
            .is_some_and(CaptureLoopController::is_running)
    }

    fn width(&self) -> u32 {
        SENSOR_WIDTH
    }

    fn height(&self) -> u32 {
        SENSOR_HEIGHT
    }

    fn depth_raster(&self) -> Option<&DepthRaster> {
        self.raster.as_ref()
    }

    fn distance_at(&self, x: u32, y: u32) -> f32 {
        self.index(x, y)
            .and_then(|i| self.depth_mm.get(i))
            .map_or(0.0, |&mm| mm as f32)
    }

    fn color_at(&self, x: u32, y: u32) -> Rgb {
        let Some(color) = &self.color else {
            return Rgb::BLACK;
        };
        let depth_mm = self
            .index(x, y)
            .and_then(|i| self.depth_mm.get(i))
            .copied()
            .unwrap_or(0);
        self.registration
            .rgb_coords(
                x,
                y,
                depth_mm,
                (SENSOR_WIDTH, SENSOR_HEIGHT),
                color.dimensions(),
            )
            .and_then(|(cx, cy)| color.get_pixel_checked(cx, cy))
            .map_or(Rgb::BLACK, |p| Rgb::new(p.0[0], p.0[1], p.0[2]))
    }

    fn color_image(&self) -> Option<&RgbImage> {
        self.color.as_ref()
    }

    fn world_coordinate_at(&self, x: u32, y: u32) -> [f32; 3] {
        self.intrinsics.unproject(x, y, self.distance_at(x, y))
    }
}

impl SensorControl for KinectSource {
    fn open(&mut self) -> BackendResult<()> {
        if self.depth_loop.is_some() {
            return Ok(());
        }
        info!(depth_path = %self.pair.depth_path, "Opening Kinect");
        self.start_depth();
        self.start_color();
        Ok(())
    }

    fn close(&mut self) {
        if self.depth_loop.is_none() && self.color_loop.is_none() {
            return;
        }
        info!(depth_path = %self.pair.depth_path, "Closing Kinect");
        // Dropping the receiver lets the depth loop exit on its next send
        self.depth_rx = None;
        if let Some(mut controller) = self.depth_loop.take() {
            controller.stop();
        }
        if let Some(mut controller) = self.color_loop.take() {
            controller.stop();
        }
        self.frame_new = false;
    }

    fn has_tilt_control(&self) -> bool {
        self.tilt_node.is_some()
    }

    fn set_tilt(&mut self, degrees: i8) -> BackendResult<()> {
        let Some(node) = &self.tilt_node else {
            return Err(BackendError::NotAvailable("no tilt control on this device".into()));
        };
        if degrees == 0 {
            controls::reset_tilt(node).or_else(|_| controls::set_tilt(node, 0))?;
        } else {
            controls::set_tilt(node, degrees)?;
        }
        Ok(())
    }

    fn set_led(&mut self, mode: LedMode) -> BackendResult<()> {
        Err(BackendError::NotAvailable(format!(
            "LED control ({}) is not exposed by the kinect kernel driver",
            mode
        )))
    }

    fn set_near_value_white(&mut self, enabled: bool) {
        if self.mapping.near_white() != enabled {
            info!(enabled, "Near value white");
            self.mapping.set_near_white(enabled);
            if !self.depth_mm.is_empty() {
                self.remap_raster();
            }
        }
    }

    fn accelerometer(&self) -> Option<[f32; 3]> {
        None
    }
}

impl Drop for KinectSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;

    fn detached_source() -> (KinectSource, mpsc::Sender<DepthFrame>) {
        let pair = KinectDevicePair {
            color_path: "/nonexistent/kinect-color".to_string(),
            depth_path: "/nonexistent/kinect-depth".to_string(),
            bus_info: "usb-test".to_string(),
            card_name: "Kinect".to_string(),
        };
        let mut source = KinectSource::new(pair, DepthMapping::new(500, 4000, true));
        let (sender, receiver) = mpsc::channel(DEPTH_CHANNEL_CAPACITY);
        source.depth_rx = Some(receiver);
        (source, sender)
    }

    fn frame(len: usize, mm: u16, sequence: u64) -> DepthFrame {
        DepthFrame {
            depth_mm: vec![mm; len],
            sequence,
        }
    }

    #[test]
    fn test_missing_nodes_have_no_tilt() {
        let (source, _sender) = detached_source();
        assert!(!source.has_tilt_control());
        assert_eq!(source.accelerometer(), None);
    }

    #[test]
    fn test_update_keeps_newest_frame() {
        let (mut source, mut sender) = detached_source();
        let full = (SENSOR_WIDTH * SENSOR_HEIGHT) as usize;
        futures::executor::block_on(async {
            sender.send(frame(full, 1000, 1)).await.unwrap();
            sender.send(frame(full, 2000, 2)).await.unwrap();
        });

        source.update();
        assert!(source.is_frame_new());
        assert_eq!(source.distance_at(10, 10), 2000.0);
        assert!(source.depth_raster().is_some());

        source.update();
        assert!(!source.is_frame_new());
    }

    #[test]
    fn test_wrong_sized_frame_rejected() {
        let (mut source, mut sender) = detached_source();
        futures::executor::block_on(sender.send(frame(320 * 240, 1000, 1))).unwrap();

        source.update();
        assert!(!source.is_frame_new());
        assert!(source.depth_raster().is_none());
        assert_eq!(source.distance_at(10, 10), 0.0);
    }

    #[test]
    fn test_color_lookup_is_registered() {
        let (mut source, mut sender) = detached_source();
        let full = (SENSOR_WIDTH * SENSOR_HEIGHT) as usize;
        futures::executor::block_on(sender.send(frame(full, 1000, 1))).unwrap();
        source.update();

        let mut color = RgbImage::new(SENSOR_WIDTH, SENSOR_HEIGHT);
        color.put_pixel(114, 50, image::Rgb([200, 10, 20]));
        source.color = Some(color);

        // 25 mm baseline at 1 m shifts the color by 14 pixels
        assert_eq!(source.color_at(100, 50), Rgb::new(200, 10, 20));
        assert_eq!(source.color_at(114, 50), Rgb::BLACK);
        assert!(source.color_image().is_some());
    }
}
