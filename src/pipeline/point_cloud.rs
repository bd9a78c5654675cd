// SPDX-License-Identifier: GPL-3.0-only

//! Point cloud synthesis from a depth source

use super::types::{CloudPoint, PointCloud};
use crate::backends::DepthSource;
use crate::constants::point_cloud::VIEW_OFFSET_MM;
use crate::errors::PipelineError;
use tracing::trace;

/// Sample `source` on a grid with stride `step` and emit one colored point per
/// valid depth sample, in row-major order
///
/// A source without a frame yields an empty cloud. `step == 0` is rejected.
pub fn build_cloud<S: DepthSource + ?Sized>(
    source: &S,
    step: u32,
) -> Result<PointCloud, PipelineError> {
    if step == 0 {
        return Err(PipelineError::InvalidStep(step));
    }

    if source.depth_raster().is_none() {
        return Ok(PointCloud::default());
    }

    let width = source.width();
    let height = source.height();
    let mut cloud = PointCloud::with_capacity(max_points(width, height, step));

    for y in (0..height).step_by(step as usize) {
        for x in (0..width).step_by(step as usize) {
            if source.distance_at(x, y) <= 0.0 {
                continue;
            }
            cloud.push(CloudPoint::new(
                source.world_coordinate_at(x, y),
                source.color_at(x, y),
            ));
        }
    }

    trace!(points = cloud.len(), step, "Point cloud built");
    Ok(cloud)
}

/// Upper bound on the cloud size for a grid walk
pub fn max_points(width: u32, height: u32, step: u32) -> usize {
    if step == 0 {
        return 0;
    }
    (width.div_ceil(step) as usize) * (height.div_ceil(step) as usize)
}

/// Position of a point in viewing space
///
/// Sensor space has y pointing down and z pointing away from the viewer, so
/// the cloud is flipped on y and z and pulled towards the viewer.
pub fn view_position(point: &CloudPoint) -> [f32; 3] {
    let [x, y, z] = point.position;
    [x, -y, VIEW_OFFSET_MM - z]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_points_rounds_up() {
        assert_eq!(max_points(640, 480, 2), 320 * 240);
        assert_eq!(max_points(5, 5, 2), 9);
        assert_eq!(max_points(5, 5, 0), 0);
    }

    #[test]
    fn test_view_position_flips_axes() {
        let point = CloudPoint::new([10.0, 20.0, 1500.0], Default::default());
        assert_eq!(view_position(&point), [10.0, -20.0, -500.0]);
    }
}
