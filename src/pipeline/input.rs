// SPDX-License-Identifier: GPL-3.0-only

//! Per-session pipeline configuration and the input events that change it
//!
//! [`PipelineConfig`] is a plain value. It is replaced between ticks by
//! [`PipelineConfig::apply_input`] and read-only while a tick runs.

use super::segment::SegmentationPolicy;
use crate::backends::LedMode;
use crate::constants::{thresholds, tilt};

/// What the local view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Depth, color and mask panels
    #[default]
    Live,
    /// Rotating point cloud
    PointCloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub near_threshold: u8,
    pub far_threshold: u8,
    pub policy: SegmentationPolicy,
    pub view_mode: ViewMode,
    /// Requested motor angle, kept while the sensor is closed
    pub tilt_degrees: i8,
    pub led_mode: LedMode,
    pub near_value_white: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            near_threshold: thresholds::DEFAULT_NEAR,
            far_threshold: thresholds::DEFAULT_FAR,
            policy: SegmentationPolicy::BitwiseAnd,
            view_mode: ViewMode::Live,
            tilt_degrees: 0,
            led_mode: LedMode::default(),
            near_value_white: true,
        }
    }
}

/// Discrete user actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    TogglePolicy,
    TogglePointCloud,
    NearIncrement,
    NearDecrement,
    FarIncrement,
    FarDecrement,
    TiltUp,
    TiltDown,
    OpenSensor,
    CloseSensor,
    SetLed(LedMode),
    ToggleNearWhite,
}

impl InputEvent {
    /// Map a typed character to an event
    pub fn from_char(c: char) -> Option<Self> {
        let event = match c {
            ' ' => InputEvent::TogglePolicy,
            'p' => InputEvent::TogglePointCloud,
            '>' | '.' => InputEvent::FarIncrement,
            '<' | ',' => InputEvent::FarDecrement,
            '+' | '=' => InputEvent::NearIncrement,
            '-' => InputEvent::NearDecrement,
            'w' => InputEvent::ToggleNearWhite,
            'o' => InputEvent::OpenSensor,
            'c' => InputEvent::CloseSensor,
            '1' => InputEvent::SetLed(LedMode::Green),
            '2' => InputEvent::SetLed(LedMode::Yellow),
            '3' => InputEvent::SetLed(LedMode::Red),
            '4' => InputEvent::SetLed(LedMode::BlinkGreen),
            '5' => InputEvent::SetLed(LedMode::BlinkRedYellow),
            '0' => InputEvent::SetLed(LedMode::Off),
            _ => return None,
        };
        Some(event)
    }
}

impl PipelineConfig {
    /// Config with explicit starting thresholds
    pub fn with_thresholds(near: u8, far: u8) -> Self {
        Self {
            near_threshold: near,
            far_threshold: far,
            ..Self::default()
        }
    }

    /// Return the configuration after `event`
    ///
    /// Values are clamped here; nothing downstream validates them again.
    /// Open/close only produce sensor side effects and leave the config as is.
    pub fn apply_input(&self, event: InputEvent) -> PipelineConfig {
        let mut next = *self;
        match event {
            InputEvent::TogglePolicy => next.policy = self.policy.toggled(),
            InputEvent::TogglePointCloud => {
                next.view_mode = match self.view_mode {
                    ViewMode::Live => ViewMode::PointCloud,
                    ViewMode::PointCloud => ViewMode::Live,
                }
            }
            InputEvent::NearIncrement => next.near_threshold = self.near_threshold.saturating_add(1),
            InputEvent::NearDecrement => next.near_threshold = self.near_threshold.saturating_sub(1),
            InputEvent::FarIncrement => next.far_threshold = self.far_threshold.saturating_add(1),
            InputEvent::FarDecrement => next.far_threshold = self.far_threshold.saturating_sub(1),
            InputEvent::TiltUp => {
                next.tilt_degrees = (self.tilt_degrees + 1).min(tilt::MAX_DEGREES)
            }
            InputEvent::TiltDown => {
                next.tilt_degrees = (self.tilt_degrees - 1).max(tilt::MIN_DEGREES)
            }
            InputEvent::SetLed(mode) => next.led_mode = mode,
            InputEvent::ToggleNearWhite => next.near_value_white = !self.near_value_white,
            InputEvent::OpenSensor | InputEvent::CloseSensor => {}
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_threshold_saturates_at_255() {
        let mut config = PipelineConfig::default();
        for _ in 0..100 {
            config = config.apply_input(InputEvent::NearIncrement);
        }
        assert_eq!(config.near_threshold, 255);
    }

    #[test]
    fn test_far_threshold_saturates_at_zero() {
        let mut config = PipelineConfig::with_thresholds(230, 2);
        for _ in 0..5 {
            config = config.apply_input(InputEvent::FarDecrement);
        }
        assert_eq!(config.far_threshold, 0);
    }

    #[test]
    fn test_tilt_clamping() {
        let mut config = PipelineConfig::default();
        for _ in 0..40 {
            config = config.apply_input(InputEvent::TiltUp);
        }
        assert_eq!(config.tilt_degrees, 30);
        for _ in 0..80 {
            config = config.apply_input(InputEvent::TiltDown);
        }
        assert_eq!(config.tilt_degrees, -30);
    }

    #[test]
    fn test_toggles() {
        let config = PipelineConfig::default();
        let toggled = config
            .apply_input(InputEvent::TogglePolicy)
            .apply_input(InputEvent::TogglePointCloud)
            .apply_input(InputEvent::ToggleNearWhite);
        assert_eq!(toggled.policy, SegmentationPolicy::RangeTest);
        assert_eq!(toggled.view_mode, ViewMode::PointCloud);
        assert!(!toggled.near_value_white);
        // The source value is untouched
        assert_eq!(config.policy, SegmentationPolicy::BitwiseAnd);
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(InputEvent::from_char('='), Some(InputEvent::NearIncrement));
        assert_eq!(InputEvent::from_char(','), Some(InputEvent::FarDecrement));
        assert_eq!(
            InputEvent::from_char('0'),
            Some(InputEvent::SetLed(LedMode::Off))
        );
        assert_eq!(InputEvent::from_char('z'), None);
    }

    #[test]
    fn test_open_close_leave_config() {
        let config = PipelineConfig::default().apply_input(InputEvent::TiltUp);
        assert_eq!(config.apply_input(InputEvent::CloseSensor), config);
        assert_eq!(config.apply_input(InputEvent::OpenSensor), config);
    }
}
