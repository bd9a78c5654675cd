// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the per-tick pipeline

use depth_relay::backends::DepthSource;
use depth_relay::backends::stream::MemorySink;
use depth_relay::backends::synthetic::SyntheticSource;
use depth_relay::errors::PipelineError;
use depth_relay::pipeline::{
    BlobFilter, DepthRaster, InputEvent, Pipeline, PipelineConfig, build_cloud, max_points,
};

fn filled(width: u32, height: u32, value: u8) -> DepthRaster {
    DepthRaster::from_raw(width, height, vec![value; (width * height) as usize]).unwrap()
}

#[test]
fn test_zero_step_rejected() {
    let result = Pipeline::new(8, 8, BlobFilter::default(), 0);
    assert!(matches!(result, Err(PipelineError::InvalidStep(0))));

    let source = SyntheticSource::from_raster(filled(4, 4, 128));
    assert!(build_cloud(&source, 0).is_err());
}

#[test]
fn test_cloud_size_for_fully_valid_raster() {
    for (w, h, step) in [(7u32, 5u32, 2u32), (8, 8, 3), (5, 3, 1), (10, 4, 4)] {
        let mut source = SyntheticSource::from_raster(filled(w, h, 128));
        source.update();
        let cloud = build_cloud(&source, step).unwrap();
        let expected = (w.div_ceil(step) * h.div_ceil(step)) as usize;
        assert_eq!(cloud.len(), expected, "{w}x{h} step {step}");
        assert_eq!(max_points(w, h, step), expected);
    }
}

#[test]
fn test_no_return_pixels_skipped_in_cloud() {
    let raster = DepthRaster::from_rows(&[[0u8, 128], [128, 0]]).unwrap();
    let source = SyntheticSource::from_raster(raster);
    let cloud = build_cloud(&source, 1).unwrap();
    assert_eq!(cloud.len(), 2);
}

#[test]
fn test_stale_ticks_reuse_results_and_keep_sending() {
    let raster = DepthRaster::from_rows(&[
        [0u8, 0, 0, 0],
        [0, 200, 200, 0],
        [0, 200, 200, 0],
        [0, 0, 0, 0],
    ])
    .unwrap();
    let mut source = SyntheticSource::from_raster(raster);
    let mut sink = MemorySink::default();
    let filter = BlobFilter {
        min_area: 1,
        max_area: 16,
        ..BlobFilter::default()
    };
    let mut pipeline = Pipeline::new(4, 4, filter, 1).unwrap();
    let config = PipelineConfig::default();

    let first = pipeline.tick(&mut source, &mut sink, &config).unwrap();
    assert!(first.frame_new);
    assert_eq!(first.blob_count, 1);

    for _ in 0..3 {
        let report = pipeline.tick(&mut source, &mut sink, &config).unwrap();
        assert!(!report.frame_new);
        assert_eq!(report.blob_count, 1);
    }

    let stats = pipeline.stats();
    assert_eq!(stats.ticks, 4);
    assert_eq!(stats.fresh_frames, 1);
    assert_eq!(stats.frames_sent, 4);
    assert_eq!(stats.stale_ticks, 3);
    assert_eq!(sink.received(), 4);
    assert_eq!(sink.last(), Some(pipeline.outbound()));
}

#[test]
fn test_threshold_change_applies_on_next_fresh_frame() {
    let raster = filled(4, 4, 200);
    let mut source = SyntheticSource::from_raster(raster.clone());
    let mut sink = MemorySink::default();
    let filter = BlobFilter {
        min_area: 1,
        max_area: 16,
        ..BlobFilter::default()
    };
    let mut pipeline = Pipeline::new(4, 4, filter, 1).unwrap();

    let config = PipelineConfig::default();
    pipeline.tick(&mut source, &mut sink, &config).unwrap();
    assert_eq!(pipeline.blobs().len(), 1);

    let narrowed = PipelineConfig::with_thresholds(150, 100);
    pipeline.tick(&mut source, &mut sink, &narrowed).unwrap();
    assert_eq!(pipeline.blobs().len(), 1, "stale tick keeps old result");

    source.push_raster(raster);
    pipeline.tick(&mut source, &mut sink, &narrowed).unwrap();
    assert!(pipeline.blobs().is_empty());
}

#[test]
fn test_cloud_built_once_per_fresh_frame() {
    let mut source = SyntheticSource::from_raster(filled(6, 4, 128));
    let mut sink = MemorySink::default();
    let mut pipeline = Pipeline::new(4, 4, BlobFilter::default(), 2).unwrap();
    let config = PipelineConfig::default().apply_input(InputEvent::TogglePointCloud);

    let first = pipeline.tick(&mut source, &mut sink, &config).unwrap();
    assert_eq!(first.cloud_points, Some(6));

    let second = pipeline.tick(&mut source, &mut sink, &config).unwrap();
    assert_eq!(second.cloud_points, None);
    assert_eq!(pipeline.cloud().len(), 6);
}
