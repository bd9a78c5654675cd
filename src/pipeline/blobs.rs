// SPDX-License-Identifier: GPL-3.0-only

//! Blob extraction from a binary mask
//!
//! Foreground regions are labelled with 8-connectivity. Holes (background
//! regions enclosed by foreground) use 4-connectivity, the usual dual of
//! 8-connected foreground. Each region is reported with its pixel area,
//! centroid, bounding box and a Moore-neighbour boundary trace.

use super::types::BinaryMask;
use crate::constants::blobs as defaults;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Clockwise neighbour offsets starting east (image y points down)
const DIRS_8: [(i32, i32); 8] = [
    (1, 0),   // E
    (1, 1),   // SE
    (0, 1),   // S
    (-1, 1),  // SW
    (-1, 0),  // W
    (-1, -1), // NW
    (0, -1),  // N
    (1, -1),  // NE
];

const DIRS_4: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Axis-aligned bounding box in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A connected region found in the mask
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Closed boundary, clockwise, starting at the top-left pixel
    pub points: Vec<(u32, u32)>,
    /// Pixel count of the region
    pub area: u32,
    /// Mean pixel position
    pub centroid: (f32, f32),
    pub bounding_box: BoundingBox,
    /// True for an interior contour (enclosed background)
    pub is_hole: bool,
}

/// Area window and limits applied to extracted blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobFilter {
    pub min_area: u32,
    pub max_area: u32,
    /// Keep at most this many blobs, largest first
    pub max_blobs: usize,
    /// Report enclosed background regions as separate blobs
    pub include_holes: bool,
}

impl Default for BlobFilter {
    fn default() -> Self {
        Self {
            min_area: defaults::DEFAULT_MIN_AREA,
            max_area: defaults::DEFAULT_MAX_AREA,
            max_blobs: defaults::DEFAULT_MAX_BLOBS,
            include_holes: false,
        }
    }
}

impl BlobFilter {
    fn accepts(&self, area: u32) -> bool {
        self.min_area <= area && area <= self.max_area
    }
}

/// Find every blob whose area lies in `[min_area, max_area]`
///
/// No count limit is applied. Blobs are ordered by area, largest first; equal
/// areas keep raster discovery order.
pub fn find_blobs(mask: &BinaryMask, min_area: u32, max_area: u32, include_holes: bool) -> Vec<Blob> {
    find_blobs_filtered(
        mask,
        &BlobFilter {
            min_area,
            max_area,
            max_blobs: usize::MAX,
            include_holes,
        },
    )
}

/// Find blobs using a full [`BlobFilter`]
pub fn find_blobs_filtered(mask: &BinaryMask, filter: &BlobFilter) -> Vec<Blob> {
    if filter.min_area > filter.max_area || filter.max_blobs == 0 {
        return Vec::new();
    }

    let w = mask.width() as i32;
    let h = mask.height() as i32;
    let data = mask.as_raw();

    let foreground = label_regions(w, h, |idx| data[idx] > 0, &DIRS_8);
    let mut blobs: Vec<Blob> = foreground
        .regions
        .iter()
        .filter(|r| filter.accepts(r.area))
        .map(|r| r.to_blob(&foreground.labels, w, h, false))
        .collect();

    if filter.include_holes {
        let background = label_regions(w, h, |idx| data[idx] == 0, &DIRS_4);
        blobs.extend(
            background
                .regions
                .iter()
                .filter(|r| !r.touches_border && filter.accepts(r.area))
                .map(|r| r.to_blob(&background.labels, w, h, true)),
        );
    }

    // Stable sort keeps discovery order for equal areas
    blobs.sort_by(|a, b| b.area.cmp(&a.area));
    blobs.truncate(filter.max_blobs);
    blobs
}

struct Region {
    label: u32,
    start: (i32, i32),
    area: u32,
    min: (i32, i32),
    max: (i32, i32),
    sum: (f64, f64),
    touches_border: bool,
}

impl Region {
    fn to_blob(&self, labels: &[u32], w: i32, h: i32, is_hole: bool) -> Blob {
        let points = trace_boundary(labels, self.label, w, h, self.start)
            .into_iter()
            .map(|(x, y)| (x as u32, y as u32))
            .collect();
        Blob {
            points,
            area: self.area,
            centroid: (
                (self.sum.0 / self.area as f64) as f32,
                (self.sum.1 / self.area as f64) as f32,
            ),
            bounding_box: BoundingBox {
                x: self.min.0 as u32,
                y: self.min.1 as u32,
                width: (self.max.0 - self.min.0 + 1) as u32,
                height: (self.max.1 - self.min.1 + 1) as u32,
            },
            is_hole,
        }
    }
}

struct Labelling {
    /// Row-major label map, 0 = not part of any region
    labels: Vec<u32>,
    regions: Vec<Region>,
}

fn label_regions(
    w: i32,
    h: i32,
    member: impl Fn(usize) -> bool,
    neighbours: &[(i32, i32)],
) -> Labelling {
    let mut labels = vec![0u32; (w.max(0) * h.max(0)) as usize];
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if labels[idx] != 0 || !member(idx) {
                continue;
            }

            let label = regions.len() as u32 + 1;
            labels[idx] = label;
            queue.push_back((x, y));

            let mut region = Region {
                label,
                start: (x, y),
                area: 0,
                min: (x, y),
                max: (x, y),
                sum: (0.0, 0.0),
                touches_border: false,
            };

            while let Some((cx, cy)) = queue.pop_front() {
                region.area += 1;
                region.min = (region.min.0.min(cx), region.min.1.min(cy));
                region.max = (region.max.0.max(cx), region.max.1.max(cy));
                region.sum.0 += cx as f64;
                region.sum.1 += cy as f64;
                if cx == 0 || cy == 0 || cx == w - 1 || cy == h - 1 {
                    region.touches_border = true;
                }

                for &(dx, dy) in neighbours {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if !in_bounds(nx, ny, w, h) {
                        continue;
                    }
                    let nidx = (ny * w + nx) as usize;
                    if labels[nidx] == 0 && member(nidx) {
                        labels[nidx] = label;
                        queue.push_back((nx, ny));
                    }
                }
            }

            regions.push(region);
        }
    }

    Labelling { labels, regions }
}

fn in_bounds(x: i32, y: i32, w: i32, h: i32) -> bool {
    x >= 0 && y >= 0 && x < w && y < h
}

fn direction_of(from: (i32, i32), to: (i32, i32)) -> Option<usize> {
    let delta = (to.0 - from.0, to.1 - from.1);
    DIRS_8.iter().position(|&d| d == delta)
}

/// Next boundary pixel clockwise from `current`, with its backtrack cell
fn moore_step(
    inside: impl Fn((i32, i32)) -> bool,
    current: (i32, i32),
    backtrack: (i32, i32),
) -> Option<((i32, i32), (i32, i32))> {
    let from_dir = direction_of(current, backtrack)?;
    (1..=8).find_map(|step| {
        let k = (from_dir + step) % 8;
        let candidate = (current.0 + DIRS_8[k].0, current.1 + DIRS_8[k].1);
        inside(candidate).then(|| {
            let prev = DIRS_8[(from_dir + step - 1) % 8];
            (candidate, (current.0 + prev.0, current.1 + prev.1))
        })
    })
}

/// Moore-neighbour boundary trace
///
/// `start` must be the first region pixel in raster order, so its west
/// neighbour is outside the region. The trace stops when it is about to repeat
/// its first move out of `start`. Pixels on one-pixel-wide parts are visited
/// once per side.
fn trace_boundary(labels: &[u32], label: u32, w: i32, h: i32, start: (i32, i32)) -> Vec<(i32, i32)> {
    let inside =
        |(x, y): (i32, i32)| in_bounds(x, y, w, h) && labels[(y * w + x) as usize] == label;

    // Isolated pixel
    let Some(first_move) = moore_step(inside, start, (start.0 - 1, start.1)) else {
        return vec![start];
    };

    let mut contour = vec![start, first_move.0];
    let (mut current, mut backtrack) = first_move;
    let max_steps = (w.max(1) as usize * h.max(1) as usize).saturating_mul(4);

    for _ in 0..max_steps {
        let Some(next) = moore_step(inside, current, backtrack) else {
            break;
        };
        if current == start && next == first_move {
            break;
        }
        contour.push(next.0);
        (current, backtrack) = next;
    }

    // The closing step lands on `start` again
    if contour.len() > 1 && contour.last() == Some(&start) {
        contour.pop();
    }
    contour
}
