// SPDX-License-Identifier: GPL-3.0-only

//! Millimetre depth to 8-bit raster mapping, pinhole unprojection and
//! depth-to-color registration
//!
//! Shared by every depth source so the raster, distance and world-coordinate
//! lookups agree with each other.

use tracing::debug;

/// Kinect v1 depth camera geometry at 640x480
pub mod kinect {
    pub const FX: f32 = 594.21;
    pub const FY: f32 = 591.04;
    pub const CX: f32 = 339.5;
    pub const CY: f32 = 242.7;

    /// depth_m = 1 / (raw * DEPTH_COEFF_A + DEPTH_COEFF_B)
    pub const DEPTH_COEFF_A: f32 = -0.0030711;
    pub const DEPTH_COEFF_B: f32 = 3.3309495;

    pub const BASE_WIDTH: f32 = 640.0;

    /// Distance between the IR and color cameras
    pub const BASELINE_MM: f32 = 25.0;
}

/// Pinhole intrinsics in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    pub const KINECT_V1: Intrinsics = Intrinsics {
        fx: kinect::FX,
        fy: kinect::FY,
        cx: kinect::CX,
        cy: kinect::CY,
    };

    /// Scale to a raster of `width` pixels (same aspect ratio)
    pub fn scaled_to(&self, width: u32) -> Self {
        let s = width as f32 / kinect::BASE_WIDTH;
        Self {
            fx: self.fx * s,
            fy: self.fy * s,
            cx: self.cx * s,
            cy: self.cy * s,
        }
    }

    /// Unproject pixel (x, y) at `depth_mm` into sensor space (mm)
    ///
    /// Zero depth maps to the origin.
    pub fn unproject(&self, x: u32, y: u32, depth_mm: f32) -> [f32; 3] {
        if depth_mm <= 0.0 {
            return [0.0; 3];
        }
        [
            (x as f32 - self.cx) * depth_mm / self.fx,
            (y as f32 - self.cy) * depth_mm / self.fy,
            depth_mm,
        ]
    }
}

/// Convert a raw 10-bit Kinect disparity sample to millimetres
///
/// Returns 0 for the invalid marker and for samples outside the usable curve.
pub fn disparity_to_mm(raw: u16) -> u16 {
    if raw >= 1023 {
        return 0;
    }
    let denom = raw as f32 * kinect::DEPTH_COEFF_A + kinect::DEPTH_COEFF_B;
    if denom <= 0.01 {
        return 0;
    }
    let mm = 1000.0 / denom;
    if mm >= u16::MAX as f32 { 0 } else { mm as u16 }
}

/// Maps millimetre depth onto the 8-bit raster through a lookup table
///
/// Depth inside `[near_mm, far_mm]` is spread linearly over 255..0 (near
/// white) or 0..255; depth outside the range clamps, and 0 stays 0.
#[derive(Debug, Clone)]
pub struct DepthMapping {
    near_mm: u16,
    far_mm: u16,
    near_white: bool,
    lut: Vec<u8>,
}

/// Largest depth covered by the lookup table
const LUT_MAX_MM: usize = 10_000;

impl DepthMapping {
    pub fn new(near_mm: u16, far_mm: u16, near_white: bool) -> Self {
        let mut mapping = Self {
            near_mm,
            far_mm,
            near_white,
            lut: Vec::new(),
        };
        mapping.rebuild();
        mapping
    }

    fn rebuild(&mut self) {
        let near = self.near_mm as f32;
        let far = self.far_mm as f32;
        let span = (far - near).max(1.0);
        let near_white = self.near_white;

        self.lut = (0..=LUT_MAX_MM)
            .map(|mm| {
                if mm == 0 {
                    return 0;
                }
                let t = ((mm as f32 - near) / span).clamp(0.0, 1.0);
                let v = if near_white { 1.0 - t } else { t };
                (v * 255.0).round() as u8
            })
            .collect();
    }

    pub fn near_white(&self) -> bool {
        self.near_white
    }

    pub fn set_near_white(&mut self, enabled: bool) {
        if self.near_white != enabled {
            self.near_white = enabled;
            self.rebuild();
        }
    }

    /// Raster value for a depth sample
    pub fn to_gray(&self, mm: u16) -> u8 {
        let idx = (mm as usize).min(LUT_MAX_MM);
        self.lut[idx]
    }

    /// Approximate depth for a raster value, 0 for 0
    pub fn to_mm(&self, gray: u8) -> f32 {
        if gray == 0 {
            return 0.0;
        }
        let t = gray as f32 / 255.0;
        let t = if self.near_white { 1.0 - t } else { t };
        self.near_mm as f32 + t * (self.far_mm as f32 - self.near_mm as f32)
    }
}

/// Fixed-point scale of the registration shift table
pub const REG_X_VAL_SCALE: i32 = 256;

/// Maps depth pixels onto the color image
///
/// The color camera sits beside the IR camera, so the color of a depth pixel
/// lies `baseline * fx / depth` pixels further along x. Shifts are tabulated
/// per millimetre in fixed point.
#[derive(Debug, Clone)]
pub struct Registration {
    depth_to_rgb_shift: Vec<i32>,
}

impl Registration {
    pub fn new(intrinsics: &Intrinsics, baseline_mm: f32) -> Self {
        let mut depth_to_rgb_shift = vec![0i32; LUT_MAX_MM + 1];
        for (depth_mm, shift) in depth_to_rgb_shift.iter_mut().enumerate().skip(1) {
            let pixels = baseline_mm * intrinsics.fx / depth_mm as f32;
            *shift = (pixels * REG_X_VAL_SCALE as f32) as i32;
        }
        debug!(
            baseline_mm,
            fx = intrinsics.fx,
            shift_1000mm = depth_to_rgb_shift[1000],
            "Built depth-to-color shift table"
        );
        Self { depth_to_rgb_shift }
    }

    /// Registration for the Kinect v1 at 640x480
    pub fn kinect() -> Self {
        Self::new(&Intrinsics::KINECT_V1, kinect::BASELINE_MM)
    }

    /// Horizontal offset in depth pixels, 0 for no return
    pub fn shift_px(&self, depth_mm: u16) -> f32 {
        let idx = (depth_mm as usize).min(LUT_MAX_MM);
        self.depth_to_rgb_shift[idx] as f32 / REG_X_VAL_SCALE as f32
    }

    /// Color pixel for depth pixel `(x, y)`, `None` outside the color image
    pub fn rgb_coords(
        &self,
        x: u32,
        y: u32,
        depth_mm: u16,
        depth_size: (u32, u32),
        rgb_size: (u32, u32),
    ) -> Option<(u32, u32)> {
        let (depth_w, depth_h) = depth_size;
        let (rgb_w, rgb_h) = rgb_size;
        if x >= depth_w || y >= depth_h || depth_w == 0 || depth_h == 0 {
            return None;
        }

        let idx = (depth_mm as usize).min(LUT_MAX_MM);
        let x_scaled = x as i64 * REG_X_VAL_SCALE as i64 + self.depth_to_rgb_shift[idx] as i64;
        let x_base = x_scaled / REG_X_VAL_SCALE as i64;

        let rgb_x = x_base * rgb_w as i64 / depth_w as i64;
        let rgb_y = y as i64 * rgb_h as i64 / depth_h as i64;
        if rgb_x < 0 || rgb_x >= rgb_w as i64 || rgb_y >= rgb_h as i64 {
            return None;
        }
        Some((rgb_x as u32, rgb_y as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_white_lut() {
        let mapping = DepthMapping::new(500, 4000, true);
        assert_eq!(mapping.to_gray(0), 0);
        assert_eq!(mapping.to_gray(500), 255);
        assert_eq!(mapping.to_gray(300), 255);
        assert_eq!(mapping.to_gray(4000), 0);
        assert_eq!(mapping.to_gray(9000), 0);
        assert!(mapping.to_gray(1000) > mapping.to_gray(2000));
    }

    #[test]
    fn test_toggle_inverts() {
        let mut mapping = DepthMapping::new(500, 4000, true);
        mapping.set_near_white(false);
        assert_eq!(mapping.to_gray(500), 0);
        assert_eq!(mapping.to_gray(4000), 255);
        assert_eq!(mapping.to_gray(0), 0);
    }

    #[test]
    fn test_to_mm_inverts_to_gray() {
        let mapping = DepthMapping::new(500, 4000, true);
        let mm = mapping.to_mm(mapping.to_gray(1500));
        assert!((mm - 1500.0).abs() < 15.0);
        assert_eq!(mapping.to_mm(0), 0.0);
    }

    #[test]
    fn test_disparity_curve() {
        assert_eq!(disparity_to_mm(1023), 0);
        let near = disparity_to_mm(400);
        let far = disparity_to_mm(900);
        assert!(near > 0 && far > near);
    }

    #[test]
    fn test_unproject_principal_point() {
        let intrinsics = Intrinsics::KINECT_V1;
        let p = intrinsics.unproject(0, 0, 1000.0);
        assert!(p[0] < 0.0 && p[1] < 0.0);
        assert_eq!(p[2], 1000.0);
        assert_eq!(intrinsics.unproject(10, 10, 0.0), [0.0; 3]);
    }

    #[test]
    fn test_registration_shift_follows_baseline() {
        let registration = Registration::kinect();
        assert_eq!(registration.shift_px(0), 0.0);
        // 25 mm * 594.21 / 1000 mm
        assert!((registration.shift_px(1000) - 14.855).abs() < 0.01);
        assert!(registration.shift_px(500) > registration.shift_px(2000));
        assert_eq!(registration.shift_px(60000), registration.shift_px(10000));
    }

    #[test]
    fn test_registered_color_coordinates() {
        let registration = Registration::kinect();
        let size = (640, 480);
        assert_eq!(registration.rgb_coords(100, 50, 1000, size, size), Some((114, 50)));
        assert_eq!(registration.rgb_coords(100, 50, 0, size, size), Some((100, 50)));
        assert_eq!(registration.rgb_coords(635, 50, 1000, size, size), None);
        assert_eq!(registration.rgb_coords(700, 50, 1000, size, size), None);
        assert_eq!(
            registration.rgb_coords(100, 50, 1000, size, (1280, 1024)),
            Some((228, 106))
        );
    }
}
