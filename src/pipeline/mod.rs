// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame depth processing
//!
//! Stages, each usable on its own:
//!
//! - [`segment`]: dual-threshold gating of the depth raster into a mask
//! - [`find_blobs`]: contour extraction with area filtering
//! - [`build_cloud`]: colored point cloud from depth + color lookups
//! - [`compose`]: depth visualization for the outbound stream
//!
//! [`Pipeline`] strings them together once per tick and keeps the derived
//! state of the last fresh frame.

mod blobs;
mod compose;
mod input;
mod point_cloud;
mod segment;
mod types;

pub use blobs::{Blob, BlobFilter, BoundingBox, find_blobs, find_blobs_filtered};
pub use compose::{compose, compose_raster, depth_to_rgba};
pub use input::{InputEvent, PipelineConfig, ViewMode};
pub use point_cloud::{build_cloud, max_points, view_position};
pub use segment::{SegmentationPolicy, segment};
pub use types::{
    BinaryMask, CloudPoint, DepthRaster, MASK_OFF, MASK_ON, OutboundFrame, PointCloud, Rgb,
};

use crate::backends::{DepthSource, FrameSink};
use crate::constants::STALE_TICK_WARNING;
use crate::errors::PipelineError;
use tracing::{debug, info, warn};

/// Counters kept across ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub fresh_frames: u64,
    pub frames_sent: u64,
    /// Ticks since the last fresh frame
    pub stale_ticks: u64,
}

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub frame_new: bool,
    pub blob_count: usize,
    /// Set when the point cloud was rebuilt this tick
    pub cloud_points: Option<usize>,
    /// False while the source has never delivered a frame
    pub composed: bool,
}

/// Orchestrates the stages and owns their last output
pub struct Pipeline {
    blob_filter: BlobFilter,
    cloud_step: u32,
    mask: Option<BinaryMask>,
    blobs: Vec<Blob>,
    cloud: PointCloud,
    cloud_outdated: bool,
    outbound: OutboundFrame,
    stats: PipelineStats,
}

impl Pipeline {
    /// Create a pipeline sending `out_width` x `out_height` frames
    pub fn new(
        out_width: u32,
        out_height: u32,
        blob_filter: BlobFilter,
        cloud_step: u32,
    ) -> Result<Self, PipelineError> {
        if cloud_step == 0 {
            return Err(PipelineError::InvalidStep(cloud_step));
        }

        info!(
            out_width,
            out_height,
            cloud_step,
            min_area = blob_filter.min_area,
            max_area = blob_filter.max_area,
            max_blobs = blob_filter.max_blobs,
            "Pipeline created"
        );

        Ok(Self {
            blob_filter,
            cloud_step,
            mask: None,
            blobs: Vec::new(),
            cloud: PointCloud::default(),
            cloud_outdated: true,
            outbound: OutboundFrame::new(out_width, out_height),
            stats: PipelineStats::default(),
        })
    }

    /// Run one tick
    ///
    /// Pulls the source; on a fresh frame recomputes the mask and blobs, and
    /// the point cloud when that view is active. The outbound frame is always
    /// composed and handed to `sink`, so a stalled source keeps streaming its
    /// last image.
    pub fn tick<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        config: &PipelineConfig,
    ) -> Result<TickReport, PipelineError>
    where
        S: DepthSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        source.update();
        self.stats.ticks += 1;

        let frame_new = source.is_frame_new();
        if frame_new {
            self.on_fresh_frame(source, config);
        } else {
            self.on_stale_tick();
        }

        let mut cloud_points = None;
        if config.view_mode == ViewMode::PointCloud && self.cloud_outdated {
            self.cloud = build_cloud(source, self.cloud_step)?;
            self.cloud_outdated = false;
            cloud_points = Some(self.cloud.len());
        }

        let composed = compose(source, &mut self.outbound);
        sink.send_frame(&self.outbound);
        self.stats.frames_sent += 1;

        Ok(TickReport {
            frame_new,
            blob_count: self.blobs.len(),
            cloud_points,
            composed,
        })
    }

    fn on_fresh_frame<S: DepthSource + ?Sized>(&mut self, source: &S, config: &PipelineConfig) {
        if self.stats.stale_ticks >= STALE_TICK_WARNING {
            info!(stale_ticks = self.stats.stale_ticks, "Depth stream recovered");
        }
        self.stats.stale_ticks = 0;
        self.stats.fresh_frames += 1;
        self.cloud_outdated = true;

        let Some(depth) = source.depth_raster() else {
            debug!("Source reported a new frame without a depth raster");
            return;
        };

        let mask = segment(
            depth,
            config.near_threshold,
            config.far_threshold,
            config.policy,
        );
        self.blobs = find_blobs_filtered(&mask, &self.blob_filter);
        self.mask = Some(mask);
    }

    fn on_stale_tick(&mut self) {
        self.stats.stale_ticks += 1;
        if self.stats.stale_ticks == STALE_TICK_WARNING {
            warn!(
                stale_ticks = self.stats.stale_ticks,
                connected_frames = self.stats.fresh_frames,
                "No new depth frame, reusing last result"
            );
        }
    }

    /// Mask of the last fresh frame
    pub fn mask(&self) -> Option<&BinaryMask> {
        self.mask.as_ref()
    }

    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    /// Last built point cloud, possibly from an earlier frame
    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    pub fn outbound(&self) -> &OutboundFrame {
        &self.outbound
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stream::MemorySink;
    use crate::backends::synthetic::SyntheticSource;

    fn square_scene() -> DepthRaster {
        DepthRaster::from_rows(&[[0u8, 0, 0, 0], [0, 200, 200, 0], [0, 200, 200, 0], [0, 0, 0, 0]])
            .unwrap()
    }

    fn small_filter() -> BlobFilter {
        BlobFilter {
            min_area: 1,
            max_area: 16,
            ..BlobFilter::default()
        }
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(matches!(
            Pipeline::new(4, 4, BlobFilter::default(), 0),
            Err(PipelineError::InvalidStep(0))
        ));
    }

    #[test]
    fn test_fresh_frame_updates_blobs() {
        let mut source = SyntheticSource::from_raster(square_scene());
        let mut sink = MemorySink::default();
        let mut pipeline = Pipeline::new(4, 4, small_filter(), 1).unwrap();

        let report = pipeline
            .tick(&mut source, &mut sink, &PipelineConfig::default())
            .unwrap();

        assert!(report.frame_new);
        assert!(report.composed);
        assert_eq!(report.blob_count, 1);
        assert_eq!(pipeline.blobs()[0].area, 4);
        assert_eq!(sink.frames().len(), 1);
    }

    #[test]
    fn test_stale_tick_reuses_state_and_still_sends() {
        let mut source = SyntheticSource::from_raster(square_scene());
        let mut sink = MemorySink::default();
        let mut pipeline = Pipeline::new(4, 4, small_filter(), 1).unwrap();
        let config = PipelineConfig::default();

        pipeline.tick(&mut source, &mut sink, &config).unwrap();
        let blobs_before = pipeline.blobs().to_vec();

        // Thresholds that would empty the mask are ignored without a new frame
        let narrowed = PipelineConfig::with_thresholds(10, 5);
        let report = pipeline.tick(&mut source, &mut sink, &narrowed).unwrap();

        assert!(!report.frame_new);
        assert_eq!(pipeline.blobs(), blobs_before.as_slice());
        assert_eq!(pipeline.stats().stale_ticks, 1);
        assert_eq!(sink.frames().len(), 2);
    }

    #[test]
    fn test_cloud_only_built_in_cloud_view() {
        let mut source = SyntheticSource::from_raster(square_scene());
        let mut sink = MemorySink::default();
        let mut pipeline = Pipeline::new(4, 4, small_filter(), 1).unwrap();

        let live = pipeline
            .tick(&mut source, &mut sink, &PipelineConfig::default())
            .unwrap();
        assert_eq!(live.cloud_points, None);

        // Switching view rebuilds from the current frame even without a new one
        let cloud_view = PipelineConfig::default().apply_input(InputEvent::TogglePointCloud);
        let report = pipeline.tick(&mut source, &mut sink, &cloud_view).unwrap();
        assert!(!report.frame_new);
        assert_eq!(report.cloud_points, Some(4));

        let again = pipeline.tick(&mut source, &mut sink, &cloud_view).unwrap();
        assert_eq!(again.cloud_points, None);
        assert_eq!(pipeline.cloud().len(), 4);
    }
}
