// SPDX-License-Identifier: GPL-3.0-only

//! Kinect device discovery
//!
//! The kernel `kinect` driver registers two video nodes per sensor, one with
//! color formats and one with depth formats. Both report the same `bus_info`,
//! which is how they are paired.

use super::controls::{self, V4L2_CID_TILT_ABSOLUTE};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

pub const FOURCC_Y10B: [u8; 4] = *b"Y10B";
pub const FOURCC_Y16: [u8; 4] = *b"Y16 ";
pub const FOURCC_GRBG: [u8; 4] = *b"GRBG";
pub const FOURCC_UYVY: [u8; 4] = *b"UYVY";

const KINECT_DRIVER: &str = "kinect";

/// One physical Kinect: paired color and depth nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinectDevicePair {
    pub color_path: String,
    pub depth_path: String,
    pub bus_info: String,
    pub card_name: String,
}

impl KinectDevicePair {
    /// Node carrying the motor controls, if any
    pub fn tilt_node(&self) -> Option<&str> {
        [self.depth_path.as_str(), self.color_path.as_str()]
            .into_iter()
            .find(|path| controls::has_control(path, V4L2_CID_TILT_ABSOLUTE))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Color,
    Depth,
}

fn classify(path: &Path) -> Option<NodeKind> {
    let dev = Device::with_path(path).ok()?;
    let formats = dev.enum_formats().ok()?;

    let has = |codes: &[[u8; 4]]| {
        formats
            .iter()
            .any(|f| codes.iter().any(|c| f.fourcc == FourCC::new(c)))
    };

    // Both nodes may carry controls, only the formats tell them apart
    if has(&[FOURCC_Y10B, FOURCC_Y16]) {
        Some(NodeKind::Depth)
    } else if has(&[FOURCC_GRBG, FOURCC_UYVY]) {
        Some(NodeKind::Color)
    } else {
        None
    }
}

/// Scan `/dev/video*` for Kinect color/depth pairs, ordered by depth node
pub fn find_kinect_pairs() -> Vec<KinectDevicePair> {
    let mut nodes: Vec<_> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("video"))
        })
        .collect();
    nodes.sort();

    #[derive(Default)]
    struct Partial {
        color: Option<String>,
        depth: Option<String>,
        card: String,
    }

    let mut by_bus: BTreeMap<String, Partial> = BTreeMap::new();
    for path in nodes {
        let path_str = path.to_string_lossy().into_owned();
        let Some(info) = controls::query_device_info(&path_str) else {
            continue;
        };
        if info.driver != KINECT_DRIVER {
            continue;
        }
        let Some(kind) = classify(&path) else {
            debug!(path = %path_str, "Kinect node with no recognized format");
            continue;
        };
        debug!(path = %path_str, ?kind, bus_info = %info.bus_info, "Found Kinect node");

        let entry = by_bus.entry(info.bus_info.clone()).or_default();
        match kind {
            NodeKind::Color => {
                entry.color = Some(path_str);
                entry.card = info.card;
            }
            NodeKind::Depth => entry.depth = Some(path_str),
        }
    }

    let mut pairs: Vec<KinectDevicePair> = by_bus
        .into_iter()
        .filter_map(|(bus_info, partial)| {
            let (color, depth) = (partial.color?, partial.depth?);
            info!(color_path = %color, depth_path = %depth, %bus_info, "Found Kinect device pair");
            Some(KinectDevicePair {
                color_path: color,
                depth_path: depth,
                bus_info,
                card_name: if partial.card.is_empty() {
                    "Kinect".to_string()
                } else {
                    partial.card
                },
            })
        })
        .collect();

    pairs.sort_by(|a, b| a.depth_path.cmp(&b.depth_path));
    pairs
}

/// Pair whose depth node is `depth_path`, or the first pair found
pub fn select_pair(depth_path: Option<&str>) -> Option<KinectDevicePair> {
    let pairs = find_kinect_pairs();
    match depth_path {
        Some(path) => pairs.into_iter().find(|p| p.depth_path == path),
        None => pairs.into_iter().next(),
    }
}
