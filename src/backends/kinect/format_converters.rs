// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for Kinect V4L2 buffers
//!
//! Color arrives as UYVY or Bayer GRBG, depth as Y16 (millimetres) or Y10B
//! (packed 10-bit disparity).

use crate::backends::depth_map::disparity_to_mm;
use image::RgbImage;

/// Convert UYVY (YUV 4:2:2) to RGB, BT.601
///
/// Each 4-byte group `U0 Y0 V0 Y1` encodes two pixels. A short buffer leaves
/// the remaining pixels black.
pub fn uyvy_to_rgb(data: &[u8], width: u32, height: u32) -> RgbImage {
    let mut rgb = RgbImage::new(width, height);
    let mut pixels = rgb.pixels_mut();

    'outer: for chunk in data.chunks_exact(4) {
        let u = chunk[0] as f32 - 128.0;
        let v = chunk[2] as f32 - 128.0;

        for y in [chunk[1] as f32, chunk[3] as f32] {
            let Some(px) = pixels.next() else {
                break 'outer;
            };
            px.0 = [
                (y + 1.402 * v).clamp(0.0, 255.0) as u8,
                (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8,
                (y + 1.772 * u).clamp(0.0, 255.0) as u8,
            ];
        }
    }

    rgb
}

/// Demosaic Bayer GRBG to RGB, one color per 2x2 block
///
/// ```text
/// G R
/// B G
/// ```
pub fn grbg_to_rgb(data: &[u8], width: u32, height: u32) -> RgbImage {
    let w = width as usize;
    let h = height as usize;
    let mut rgb = RgbImage::new(width, height);
    if data.len() < w * h {
        return rgb;
    }

    for y in (0..h.saturating_sub(1)).step_by(2) {
        for x in (0..w.saturating_sub(1)).step_by(2) {
            let g0 = data[y * w + x] as u16;
            let r = data[y * w + x + 1];
            let b = data[(y + 1) * w + x];
            let g1 = data[(y + 1) * w + x + 1] as u16;
            let g = ((g0 + g1) / 2) as u8;

            for dy in 0..2 {
                for dx in 0..2 {
                    rgb.put_pixel((x + dx) as u32, (y + dy) as u32, image::Rgb([r, g, b]));
                }
            }
        }
    }

    rgb
}

/// Unpack Y10B into raw 10-bit samples
///
/// Four samples per 5 bytes:
/// ```text
/// [A9:A2][B9:B2][C9:C2][D9:D2][D1:D0,C1:C0,B1:B0,A1:A0]
/// ```
pub fn unpack_y10b(data: &[u8], width: u32, height: u32) -> Vec<u16> {
    let pixel_count = (width * height) as usize;
    let mut output = Vec::with_capacity(pixel_count);

    for chunk in data.chunks_exact(5) {
        let low = chunk[4] as u16;
        for (i, &high) in chunk[..4].iter().enumerate() {
            if output.len() >= pixel_count {
                return output;
            }
            output.push(((high as u16) << 2) | ((low >> (2 * i)) & 0x03));
        }
    }

    output
}

/// Y16 little-endian samples (already millimetres)
pub fn y16_to_mm(data: &[u8], width: u32, height: u32) -> Vec<u16> {
    data.chunks_exact(2)
        .take((width * height) as usize)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

/// Y10B disparity buffer to millimetres
pub fn y10b_to_mm(data: &[u8], width: u32, height: u32) -> Vec<u16> {
    unpack_y10b(data, width, height)
        .into_iter()
        .map(disparity_to_mm)
        .collect()
}
