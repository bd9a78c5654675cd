// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for segmentation and blob extraction

use depth_relay::pipeline::{
    DepthRaster, MASK_ON, SegmentationPolicy, find_blobs, segment,
};

fn square() -> DepthRaster {
    DepthRaster::from_rows(&[
        [0u8, 0, 0, 0],
        [0, 200, 200, 0],
        [0, 200, 200, 0],
        [0, 0, 0, 0],
    ])
    .unwrap()
}

fn all_values() -> DepthRaster {
    DepthRaster::from_raw(16, 16, (0..=255u8).collect()).unwrap()
}

#[test]
fn test_square_yields_single_blob() {
    let mask = segment(&square(), 230, 70, SegmentationPolicy::RangeTest);
    for y in 0..4 {
        for x in 0..4 {
            let inside = (1..=2).contains(&x) && (1..=2).contains(&y);
            assert_eq!(mask.is_on(x, y), inside, "pixel ({x}, {y})");
        }
    }
    assert!(mask.as_raw().iter().all(|&v| v == 0 || v == MASK_ON));

    let blobs = find_blobs(&mask, 1, 16, false);
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].area, 4);
    assert_eq!(blobs[0].centroid, (1.5, 1.5));
}

#[test]
fn test_band_below_data_finds_nothing() {
    for policy in [SegmentationPolicy::BitwiseAnd, SegmentationPolicy::RangeTest] {
        let mask = segment(&square(), 10, 5, policy);
        assert_eq!(mask.count_on(), 0);
        assert!(find_blobs(&mask, 1, 16, false).is_empty());
    }
}

#[test]
fn test_policies_agree_except_at_near() {
    let depth = all_values();
    let (near, far) = (180u8, 60u8);
    let a = segment(&depth, near, far, SegmentationPolicy::BitwiseAnd);
    let b = segment(&depth, near, far, SegmentationPolicy::RangeTest);

    for v in 0..=255u32 {
        let (x, y) = (v % 16, v / 16);
        if v == near as u32 {
            assert!(a.is_on(x, y));
            assert!(!b.is_on(x, y));
        } else {
            assert_eq!(a.is_on(x, y), b.is_on(x, y), "value {v}");
        }
    }
}

#[test]
fn test_range_test_empty_when_far_not_below_near() {
    let depth = all_values();
    for (near, far) in [(100u8, 100u8), (50, 120), (0, 255)] {
        let mask = segment(&depth, near, far, SegmentationPolicy::RangeTest);
        assert_eq!(mask.count_on(), 0, "near {near} far {far}");
    }
}

#[test]
fn test_bitwise_band_size() {
    let mask = segment(&all_values(), 230, 70, SegmentationPolicy::BitwiseAnd);
    assert_eq!(mask.count_on(), 160);
}

#[test]
fn test_blobs_respect_area_window() {
    let depth = DepthRaster::from_rows(&[
        [200u8, 0, 0, 0, 0],
        [0, 0, 0, 200, 200],
        [0, 0, 0, 200, 200],
    ])
    .unwrap();
    let mask = segment(&depth, 230, 70, SegmentationPolicy::BitwiseAnd);

    assert_eq!(find_blobs(&mask, 1, 16, false).len(), 2);
    let large = find_blobs(&mask, 2, 16, false);
    assert_eq!(large.len(), 1);
    assert_eq!(large[0].area, 4);
    assert!(find_blobs(&mask, 5, 16, false).is_empty());
}
