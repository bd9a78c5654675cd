// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for input handling on the pipeline config

use depth_relay::backends::LedMode;
use depth_relay::pipeline::{InputEvent, PipelineConfig, SegmentationPolicy, ViewMode};

#[test]
fn test_thresholds_saturate() {
    let mut config = PipelineConfig::with_thresholds(254, 1);
    for _ in 0..5 {
        config = config
            .apply_input(InputEvent::NearIncrement)
            .apply_input(InputEvent::FarDecrement);
    }
    assert_eq!(config.near_threshold, 255);
    assert_eq!(config.far_threshold, 0);

    let config = PipelineConfig::with_thresholds(0, 255)
        .apply_input(InputEvent::NearDecrement)
        .apply_input(InputEvent::FarIncrement);
    assert_eq!(config.near_threshold, 0);
    assert_eq!(config.far_threshold, 255);
}

#[test]
fn test_tilt_clamped() {
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
fn test_apply_input_returns_new_value() {
    let config = PipelineConfig::default();
    let toggled = config.apply_input(InputEvent::TogglePolicy);
    assert_eq!(config.policy, SegmentationPolicy::BitwiseAnd);
    assert_eq!(toggled.policy, SegmentationPolicy::RangeTest);
    assert_eq!(
        toggled.apply_input(InputEvent::TogglePolicy).policy,
        SegmentationPolicy::BitwiseAnd
    );
}

#[test]
fn test_keyboard_mapping() {
    let config = ['p', '+', '+', '<', '3', 'w']
        .into_iter()
        .filter_map(InputEvent::from_char)
        .fold(PipelineConfig::default(), |c, e| c.apply_input(e));

    assert_eq!(config.view_mode, ViewMode::PointCloud);
    assert_eq!(config.near_threshold, 232);
    assert_eq!(config.far_threshold, 69);
    assert_eq!(config.led_mode, LedMode::Red);
    assert!(!config.near_value_white);
    assert_eq!(InputEvent::from_char('x'), None);
}

#[test]
fn test_sensor_open_close_leave_config_alone() {
    let config = PipelineConfig::default().apply_input(InputEvent::TiltUp);
    assert_eq!(config.apply_input(InputEvent::CloseSensor), config);
    assert_eq!(config.apply_input(InputEvent::OpenSensor), config);
}
