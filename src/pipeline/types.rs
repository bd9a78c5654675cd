// SPDX-License-Identifier: GPL-3.0-only

//! Raster and geometry types shared by the pipeline stages

use bytemuck::{Pod, Zeroable};
use image::{GrayImage, Luma, RgbaImage};

/// Foreground value in a [`BinaryMask`]
pub const MASK_ON: u8 = 255;
/// Background value in a [`BinaryMask`]
pub const MASK_OFF: u8 = 0;

/// 8-bit depth image: 0 = far or invalid, 255 = near
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthRaster(GrayImage);

impl DepthRaster {
    /// All-zero raster of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Wrap raw row-major samples. Returns `None` if the length does not match.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, data).map(Self)
    }

    /// Build from a row-major slice of rows (test fixtures, synthetic scenes)
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Option<Self> {
        let height = rows.len() as u32;
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0) as u32;
        if rows.iter().any(|r| r.as_ref().len() as u32 != width) {
            return None;
        }
        let data = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Self::from_raw(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Sample at (x, y); out-of-range reads return 0
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.0.get_pixel_checked(x, y).map(|p| p.0[0]).unwrap_or(0)
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width() && y < self.height() {
            self.0.put_pixel(x, y, Luma([value]));
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }
}

/// Segmentation result: every cell is [`MASK_ON`] or [`MASK_OFF`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Build a mask by evaluating `accept` on every sample of `depth`
    pub fn from_predicate(depth: &DepthRaster, accept: impl Fn(u8) -> bool) -> Self {
        let data = depth
            .as_raw()
            .iter()
            .map(|&v| if accept(v) { MASK_ON } else { MASK_OFF })
            .collect();
        // Length always matches the source raster
        Self(GrayImage::from_raw(depth.width(), depth.height(), data).unwrap_or_default())
    }

    /// Wrap an already binarized image; any non-zero sample counts as foreground
    pub fn from_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image
            .into_raw()
            .into_iter()
            .map(|v| if v > 0 { MASK_ON } else { MASK_OFF })
            .collect();
        Self(GrayImage::from_raw(width, height, data).unwrap_or_default())
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn is_on(&self, x: u32, y: u32) -> bool {
        self.0
            .get_pixel_checked(x, y)
            .map(|p| p.0[0] == MASK_ON)
            .unwrap_or(false)
    }

    pub fn count_on(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v == MASK_ON).count()
    }

    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }
}

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(v: u8) -> Self {
        Self::new(v, v, v)
    }
}

/// One colored point of a point cloud
///
/// `position` is in sensor world space (millimetres). The layout is `Pod` so a
/// whole cloud can be handed to a GPU buffer or a socket as bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CloudPoint {
    pub position: [f32; 3],
    /// RGBA, alpha always 255
    pub color: [u8; 4],
}

impl CloudPoint {
    pub fn new(position: [f32; 3], color: Rgb) -> Self {
        Self {
            position,
            color: [color.r, color.g, color.b, 255],
        }
    }

    pub fn rgb(&self) -> Rgb {
        Rgb::new(self.color[0], self.color[1], self.color[2])
    }
}

/// Colored points in raster scan order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<CloudPoint>,
}

impl PointCloud {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: CloudPoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[CloudPoint] {
        &self.points
    }

    /// Raw bytes of the cloud (16 bytes per point)
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.points)
    }
}

/// Fixed-size RGBA raster handed to the transport every tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame(RgbaImage);

impl OutboundFrame {
    /// Opaque black frame of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self(RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 255])))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Packed RGBA bytes, `width * height * 4` long
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.0
    }

    pub fn as_image_mut(&mut self) -> &mut RgbaImage {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        assert!(DepthRaster::from_rows(&[vec![1, 2], vec![3]]).is_none());
        let raster = DepthRaster::from_rows(&[[1u8, 2], [3, 4]]).unwrap();
        assert_eq!(raster.get(1, 1), 4);
        assert_eq!(raster.get(5, 5), 0);
    }

    #[test]
    fn test_mask_from_image_binarizes() {
        let image = GrayImage::from_raw(3, 1, vec![0, 7, 255]).unwrap();
        let mask = BinaryMask::from_image(image);
        assert_eq!(mask.as_raw(), &[0, 255, 255]);
        assert_eq!(mask.count_on(), 2);
    }

    #[test]
    fn test_cloud_point_is_sixteen_bytes() {
        let mut cloud = PointCloud::default();
        cloud.push(CloudPoint::new([1.0, 2.0, 3.0], Rgb::new(10, 20, 30)));
        assert_eq!(cloud.as_bytes().len(), 16);
        assert_eq!(cloud.points()[0].rgb(), Rgb::new(10, 20, 30));
    }

    #[test]
    fn test_outbound_frame_layout() {
        let frame = OutboundFrame::new(4, 3);
        assert_eq!(frame.as_bytes().len(), 4 * 3 * 4);
        assert_eq!(&frame.as_bytes()[..4], &[0, 0, 0, 255]);
    }
}
