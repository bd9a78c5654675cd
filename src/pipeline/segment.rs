// SPDX-License-Identifier: GPL-3.0-only

//! Dual-threshold depth segmentation
//!
//! Two policies produce the foreground mask:
//!
//! - [`SegmentationPolicy::BitwiseAnd`]: two independent binary thresholds
//!   (inverted at `near`, regular at `far`) combined with a bitwise AND.
//!   Threshold convention matches OpenCV: `v > t` for binary, `v <= t` for
//!   inverted, so the accepted band is `(far, near]`.
//! - [`SegmentationPolicy::RangeTest`]: a single per-pixel test
//!   `far < v < near`, accepted band `(far, near)`.
//!
//! The policies differ only for samples equal to `near`.

use super::types::{BinaryMask, DepthRaster, MASK_OFF, MASK_ON};
use serde::{Deserialize, Serialize};

/// How the near/far band is applied to the depth raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmentationPolicy {
    /// Threshold twice, then AND the two masks
    #[default]
    BitwiseAnd,
    /// Single pass exclusive range test
    RangeTest,
}

impl SegmentationPolicy {
    /// The other policy
    pub fn toggled(self) -> Self {
        match self {
            SegmentationPolicy::BitwiseAnd => SegmentationPolicy::RangeTest,
            SegmentationPolicy::RangeTest => SegmentationPolicy::BitwiseAnd,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SegmentationPolicy::BitwiseAnd => "threshold+and",
            SegmentationPolicy::RangeTest => "range test",
        }
    }
}

/// Threshold variants used by the bitwise policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThresholdKind {
    /// `max` where `v > t`, else 0
    Binary,
    /// 0 where `v > t`, else `max`
    BinaryInv,
}

fn threshold(depth: &DepthRaster, t: u8, kind: ThresholdKind) -> Vec<u8> {
    depth
        .as_raw()
        .iter()
        .map(|&v| match (kind, v > t) {
            (ThresholdKind::Binary, true) | (ThresholdKind::BinaryInv, false) => MASK_ON,
            _ => MASK_OFF,
        })
        .collect()
}

/// Segment `depth` into a foreground mask
///
/// The input raster is left untouched; it is consumed again by the point
/// cloud and the outbound composer within the same tick.
pub fn segment(
    depth: &DepthRaster,
    near: u8,
    far: u8,
    policy: SegmentationPolicy,
) -> BinaryMask {
    match policy {
        SegmentationPolicy::BitwiseAnd => {
            let near_mask = threshold(depth, near, ThresholdKind::BinaryInv);
            let far_mask = threshold(depth, far, ThresholdKind::Binary);
            let combined: Vec<u8> = near_mask
                .iter()
                .zip(&far_mask)
                .map(|(a, b)| a & b)
                .collect();
            image::GrayImage::from_raw(depth.width(), depth.height(), combined)
                .map(BinaryMask::from_image)
                .unwrap_or_else(|| BinaryMask::new(depth.width(), depth.height()))
        }
        SegmentationPolicy::RangeTest => {
            BinaryMask::from_predicate(depth, |v| v < near && v > far)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> DepthRaster {
        let data: Vec<u8> = (0..=255u8).collect();
        DepthRaster::from_raw(16, 16, data).unwrap()
    }

    #[test]
    fn test_bitwise_band_includes_near() {
        let mask = segment(&ramp(), 200, 100, SegmentationPolicy::BitwiseAnd);
        let on: Vec<usize> = mask
            .as_raw()
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == MASK_ON)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(on.first(), Some(&101));
        assert_eq!(on.last(), Some(&200));
        assert_eq!(on.len(), 100);
    }

    #[test]
    fn test_range_band_excludes_both_edges() {
        let mask = segment(&ramp(), 200, 100, SegmentationPolicy::RangeTest);
        assert_eq!(mask.count_on(), 99);
        assert!(!mask.is_on(100 % 16, 100 / 16));
        assert!(!mask.is_on(200 % 16, 200 / 16));
        assert!(mask.is_on(150 % 16, 150 / 16));
    }

    #[test]
    fn test_inverted_band_is_empty_for_both_policies() {
        for policy in [SegmentationPolicy::BitwiseAnd, SegmentationPolicy::RangeTest] {
            assert_eq!(segment(&ramp(), 50, 50, policy).count_on(), 0);
            assert_eq!(segment(&ramp(), 40, 90, policy).count_on(), 0);
        }
    }

    #[test]
    fn test_input_not_mutated() {
        let depth = ramp();
        let before = depth.clone();
        let _ = segment(&depth, 230, 70, SegmentationPolicy::BitwiseAnd);
        let _ = segment(&depth, 230, 70, SegmentationPolicy::RangeTest);
        assert_eq!(depth, before);
    }

    #[test]
    fn test_policy_toggle() {
        let policy = SegmentationPolicy::default();
        assert_eq!(policy, SegmentationPolicy::BitwiseAnd);
        assert_eq!(policy.toggled().toggled(), policy);
    }
}
