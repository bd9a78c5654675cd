// SPDX-License-Identifier: GPL-3.0-only

//! Outbound frame composition
//!
//! The outbound stream always carries the raw depth view (grayscale expanded
//! to RGBA), never the thresholded mask.

use super::types::{DepthRaster, OutboundFrame};
use crate::backends::DepthSource;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Expand a depth raster to opaque RGBA at its own resolution
pub fn depth_to_rgba(depth: &DepthRaster) -> RgbaImage {
    let mut rgba = RgbaImage::new(depth.width(), depth.height());
    for (dst, &v) in rgba.pixels_mut().zip(depth.as_raw()) {
        *dst = Rgba([v, v, v, 255]);
    }
    rgba
}

/// Render the source's depth view into `target`, scaled to the target size
///
/// Returns false and leaves `target` untouched if the source has no frame.
pub fn compose<S: DepthSource + ?Sized>(source: &S, target: &mut OutboundFrame) -> bool {
    let Some(depth) = source.depth_raster() else {
        return false;
    };
    compose_raster(depth, target);
    true
}

/// Render `depth` into `target`, overwriting every pixel
pub fn compose_raster(depth: &DepthRaster, target: &mut OutboundFrame) {
    let (width, height) = (target.width(), target.height());
    let rgba = depth_to_rgba(depth);

    if rgba.dimensions() == (width, height) {
        *target.as_image_mut() = rgba;
    } else {
        *target.as_image_mut() = imageops::resize(&rgba, width, height, FilterType::Triangle);
    }
}
