// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 ioctl helpers for device identification and controls
//!
//! The Kinect kernel driver exposes the tilt motor as camera-class pan/tilt
//! controls on its video nodes.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a_0000;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

/// Button control, write 1 to re-center the motor
pub const V4L2_CID_TILT_RESET: u32 = V4L2_CID_CAMERA_CLASS_BASE + 7;
/// Absolute tilt in degrees
pub const V4L2_CID_TILT_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 9;

/// Mechanical range of the Kinect motor
pub const MOTOR_MIN_DEGREES: i8 = -27;
pub const MOTOR_MAX_DEGREES: i8 = 27;

// (dir << 30) | (size << 16) | ('V' << 8) | nr
const VIDIOC_QUERYCAP: libc::c_ulong = 0x8068_5600;
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008_561C;
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC044_5624;

const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;

#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// Identification strings from QUERYCAP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
}

fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

pub fn query_device_info(device_path: &str) -> Option<DeviceInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut caps = V4l2Capability {
        driver: [0; 16],
        card: [0; 32],
        bus_info: [0; 32],
        version: 0,
        capabilities: 0,
        device_caps: 0,
        reserved: [0; 3],
    };

    // SAFETY: fd is open for the lifetime of `file`; caps matches struct v4l2_capability
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP, &mut caps as *mut V4l2Capability) };
    if result < 0 {
        return None;
    }

    Some(DeviceInfo {
        driver: c_string(&caps.driver),
        card: c_string(&caps.card),
        bus_info: c_string(&caps.bus_info),
    })
}

/// True if the node exposes `control_id` and it is not disabled
pub fn has_control(device_path: &str, control_id: u32) -> bool {
    let Ok(file) = File::open(device_path) else {
        return false;
    };
    let fd = file.as_raw_fd();

    let mut query = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    // SAFETY: fd is open; query matches struct v4l2_queryctrl
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL, &mut query as *mut V4l2Queryctrl) };
    if result < 0 {
        return false;
    }
    debug!(
        device_path,
        control = %c_string(&query.name),
        min = query.minimum,
        max = query.maximum,
        "Found V4L2 control"
    );
    query.flags & V4L2_CTRL_FLAG_DISABLED == 0
}

pub fn set_control(device_path: &str, control_id: u32, value: i32) -> std::io::Result<()> {
    let file = File::open(device_path)?;
    let fd = file.as_raw_fd();
    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    // SAFETY: fd is open; ctrl matches struct v4l2_control
    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(device_path, control_id, value, %errno, "Failed to set V4L2 control");
        return Err(errno);
    }

    if ctrl.value != value {
        debug!(
            device_path,
            control_id,
            requested = value,
            applied = ctrl.value,
            "Driver adjusted control value"
        );
    }
    Ok(())
}

/// Set the motor angle, clamped to the mechanical range
pub fn set_tilt(device_path: &str, degrees: i8) -> std::io::Result<()> {
    let degrees = degrees.clamp(MOTOR_MIN_DEGREES, MOTOR_MAX_DEGREES);
    debug!(device_path, degrees, "Setting tilt via V4L2");
    set_control(device_path, V4L2_CID_TILT_ABSOLUTE, degrees as i32)
}

pub fn reset_tilt(device_path: &str) -> std::io::Result<()> {
    debug!(device_path, "Resetting tilt via V4L2");
    set_control(device_path, V4L2_CID_TILT_RESET, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_ids() {
        assert_eq!(V4L2_CID_TILT_ABSOLUTE, 0x009a_0909);
        assert_eq!(V4L2_CID_TILT_RESET, 0x009a_0907);
    }

    #[test]
    fn test_c_string_stops_at_nul() {
        let mut raw = [0u8; 16];
        raw[..6].copy_from_slice(b"kinect");
        assert_eq!(c_string(&raw), "kinect");
        assert_eq!(c_string(b"full"), "full");
    }

    #[test]
    fn test_missing_device() {
        assert!(query_device_info("/nonexistent/video99").is_none());
        assert!(!has_control("/nonexistent/video99", V4L2_CID_TILT_ABSOLUTE));
    }
}
