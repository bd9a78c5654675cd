// SPDX-License-Identifier: GPL-3.0-only

//! Session orchestration
//!
//! [`App`] owns the sensor, the outbound sink, the live [`PipelineConfig`] and
//! the [`Pipeline`]. Input events go through [`App::handle_input`], which
//! swaps in the new config and drives the sensor side effects; [`App::tick`]
//! runs one processing step.

use crate::backends::{FrameSink, Sensor};
use crate::config::Settings;
use crate::constants::tick_interval;
use crate::errors::AppResult;
use crate::pipeline::{InputEvent, Pipeline, PipelineConfig, TickReport, ViewMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Ticks per second over a sliding one-second window
#[derive(Debug)]
pub struct FpsCounter {
    window_start: Instant,
    ticks_in_window: u32,
    fps: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self {
            window_start: Instant::now(),
            ticks_in_window: 0,
            fps: 0.0,
        }
    }
}

impl FpsCounter {
    pub fn tick(&mut self) {
        self.ticks_in_window += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.ticks_in_window as f32 / elapsed.as_secs_f32();
            self.ticks_in_window = 0;
            self.window_start = Instant::now();
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

pub struct App<S: Sensor, K: FrameSink> {
    source: S,
    sink: K,
    config: PipelineConfig,
    settings: Settings,
    pipeline: Pipeline,
    last_report: Option<TickReport>,
    last_message: Option<String>,
    fps: FpsCounter,
    shut_down: bool,
}

impl<S: Sensor, K: FrameSink> App<S, K> {
    pub fn new(source: S, sink: K, settings: Settings) -> AppResult<Self> {
        let pipeline = Pipeline::new(
            settings.sender.width,
            settings.sender.height,
            settings.blobs,
            settings.point_cloud_step,
        )?;
        Ok(Self {
            source,
            sink,
            config: settings.initial_config(),
            settings,
            pipeline,
            last_report: None,
            last_message: None,
            fps: FpsCounter::default(),
            shut_down: false,
        })
    }

    /// Open the sensor and apply the initial config to it
    pub fn start(&mut self) -> AppResult<()> {
        self.source.open()?;
        self.source.set_near_value_white(self.config.near_value_white);
        if self.source.has_tilt_control()
            && let Err(e) = self.source.set_tilt(self.config.tilt_degrees)
        {
            warn!(error = %e, "Failed to set initial tilt");
        }
        info!(
            near = self.config.near_threshold,
            far = self.config.far_threshold,
            policy = self.config.policy.display_name(),
            "Session started"
        );
        Ok(())
    }

    /// Apply a user action between ticks
    pub fn handle_input(&mut self, event: InputEvent) {
        let previous = self.config;
        self.config = previous.apply_input(event);
        let config = self.config;

        let result = match event {
            InputEvent::TiltUp | InputEvent::TiltDown => {
                if config.tilt_degrees == previous.tilt_degrees {
                    Ok(())
                } else {
                    self.source.set_tilt(config.tilt_degrees)
                }
            }
            InputEvent::OpenSensor => self.source.open().and_then(|()| {
                if self.source.has_tilt_control() {
                    self.source.set_tilt(config.tilt_degrees)
                } else {
                    Ok(())
                }
            }),
            InputEvent::CloseSensor => {
                let reset = if self.source.has_tilt_control() {
                    self.source.set_tilt(0)
                } else {
                    Ok(())
                };
                self.source.close();
                reset
            }
            InputEvent::SetLed(mode) => self.source.set_led(mode),
            InputEvent::ToggleNearWhite => {
                self.source.set_near_value_white(config.near_value_white);
                Ok(())
            }
            InputEvent::TogglePolicy
            | InputEvent::TogglePointCloud
            | InputEvent::NearIncrement
            | InputEvent::NearDecrement
            | InputEvent::FarIncrement
            | InputEvent::FarDecrement => Ok(()),
        };

        match result {
            Ok(()) => {
                debug!(?event, ?config, "Input applied");
                self.last_message = None;
            }
            Err(e) => {
                warn!(?event, error = %e, "Sensor rejected input");
                self.last_message = Some(e.to_string());
            }
        }
    }

    /// Run one processing step
    pub fn tick(&mut self) -> AppResult<TickReport> {
        let report = self
            .pipeline
            .tick(&mut self.source, &mut self.sink, &self.config)?;
        self.fps.tick();
        self.last_report = Some(report);
        Ok(report)
    }

    /// Tick at the configured rate until `stop` is set or `duration` elapses
    pub fn run_headless(&mut self, duration: Option<Duration>, stop: &AtomicBool) -> AppResult<()> {
        let interval = tick_interval(self.settings.frame_rate);
        let started = Instant::now();
        let mut last_log = Instant::now();
        info!(?interval, ?duration, "Running headless");

        while !stop.load(Ordering::SeqCst) {
            if duration.is_some_and(|d| started.elapsed() >= d) {
                break;
            }
            let tick_start = Instant::now();
            let report = self.tick()?;

            if last_log.elapsed() >= Duration::from_secs(5) {
                let stats = self.pipeline.stats();
                info!(
                    fps = self.fps.fps(),
                    blobs = report.blob_count,
                    fresh_frames = stats.fresh_frames,
                    frames_sent = stats.frames_sent,
                    connected = self.source.is_connected(),
                    "Headless status"
                );
                last_log = Instant::now();
            }

            if let Some(remaining) = interval.checked_sub(tick_start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Reset the tilt and close the sensor; safe to call more than once
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if self.source.has_tilt_control()
            && let Err(e) = self.source.set_tilt(0)
        {
            warn!(error = %e, "Failed to reset tilt on exit");
        }
        self.source.close();
        info!(ticks = self.pipeline.stats().ticks, "Session ended");
    }

    /// Human-readable status, one line per control group
    pub fn status_lines(&self) -> Vec<String> {
        let config = &self.config;
        let blobs = self.last_report.map_or(0, |r| r.blob_count);
        let accel = match self.source.accelerometer() {
            Some([x, y, z]) => format!("accel is: {:.2} / {:.2} / {:.2}", x, y, z),
            None => "accelerometer not supported by this device".to_string(),
        };
        let mut lines = vec![
            accel,
            format!(
                "segmentation: {} (press space)",
                config.policy.display_name()
            ),
            format!("near threshold {} (press: + -)", config.near_threshold),
            format!(
                "far threshold {} (press: < >)  blobs found {}, fps: {:.1}",
                config.far_threshold,
                blobs,
                self.fps.fps()
            ),
            format!(
                "press c to close the connection and o to open it again, connection is: {}",
                self.source.is_connected()
            ),
        ];
        if self.source.has_tilt_control() {
            lines.push(format!(
                "press UP and DOWN to change the tilt angle: {} degrees",
                config.tilt_degrees
            ));
        }
        lines.push(format!(
            "press 1-5 & 0 to change the led mode ({}), w for near white ({})",
            config.led_mode, config.near_value_white
        ));
        if config.view_mode == ViewMode::PointCloud {
            lines.push(format!(
                "point cloud: {} points (press p)",
                self.pipeline.cloud().len()
            ));
        } else {
            lines.push("press p to switch to the point cloud".to_string());
        }
        if let Some(message) = &self.last_message {
            lines.push(message.clone());
        }
        lines
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn last_report(&self) -> Option<TickReport> {
        self.last_report
    }

    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }

    /// Error from the last rejected input, cleared by the next success
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }
}

impl<S: Sensor, K: FrameSink> Drop for App<S, K> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{DepthSource, LedMode};
    use crate::backends::stream::MemorySink;
    use crate::backends::synthetic::SyntheticSource;
    use crate::pipeline::DepthRaster;

    fn app() -> App<SyntheticSource, MemorySink> {
        let raster = DepthRaster::from_rows(&[[0u8, 100], [200, 0]]).unwrap();
        app_with(SyntheticSource::from_raster(raster))
    }

    fn app_with(source: SyntheticSource) -> App<SyntheticSource, MemorySink> {
        let settings = Settings {
            sender: crate::config::SenderSettings {
                width: 4,
                height: 4,
                ..Default::default()
            },
            ..Settings::default()
        };
        App::new(source, MemorySink::default(), settings).unwrap()
    }

    #[test]
    fn test_tilt_reaches_sensor() {
        let mut app = app();
        app.handle_input(InputEvent::TiltUp);
        app.handle_input(InputEvent::TiltUp);
        assert_eq!(app.config().tilt_degrees, 2);
        assert_eq!(app.source().tilt_degrees(), 2);
    }

    #[test]
    fn test_close_resets_sensor_tilt_and_open_restores_it() {
        let mut app = app();
        app.handle_input(InputEvent::TiltDown);
        app.handle_input(InputEvent::CloseSensor);
        assert_eq!(app.source().tilt_degrees(), 0);
        assert!(!app.source().is_connected());
        assert_eq!(app.config().tilt_degrees, -1);

        app.handle_input(InputEvent::OpenSensor);
        assert!(app.source().is_connected());
        assert_eq!(app.source().tilt_degrees(), -1);
    }

    #[test]
    fn test_led_and_near_white_forwarded() {
        let mut app = app();
        app.handle_input(InputEvent::SetLed(LedMode::Red));
        app.handle_input(InputEvent::ToggleNearWhite);
        assert_eq!(app.source().led(), LedMode::Red);
        assert!(!app.source().near_value_white());
    }

    #[test]
    fn test_tick_sends_frame_of_sender_size() {
        let mut app = app();
        app.tick().unwrap();
        let frame = app.sink().last().unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 4));
    }

    #[test]
    fn test_headless_stops_on_flag() {
        let mut app = app();
        let stop = AtomicBool::new(true);
        app.run_headless(None, &stop).unwrap();
        assert!(!app.source().is_connected());
        assert_eq!(app.pipeline().stats().ticks, 0);
    }

    #[test]
    fn test_open_close_without_motor_is_clean() {
        let raster = DepthRaster::from_rows(&[[0u8, 100], [200, 0]]).unwrap();
        let mut app = app_with(SyntheticSource::from_raster(raster).without_motor());

        app.handle_input(InputEvent::CloseSensor);
        assert!(!app.source().is_connected());
        assert_eq!(app.last_message(), None);

        app.handle_input(InputEvent::OpenSensor);
        assert!(app.source().is_connected());
        assert_eq!(app.last_message(), None);

        let lines = app.status_lines();
        assert!(lines.iter().any(|l| l.contains("accelerometer not supported")));
        assert!(!lines.iter().any(|l| l.contains("tilt angle")));
    }

    #[test]
    fn test_rejected_tilt_reported() {
        let raster = DepthRaster::from_rows(&[[0u8, 100], [200, 0]]).unwrap();
        let mut app = app_with(SyntheticSource::from_raster(raster).without_motor());
        app.handle_input(InputEvent::TiltUp);
        assert!(app.last_message().is_some_and(|m| m.contains("tilt")));
    }

    #[test]
    fn test_status_reports_accelerometer() {
        let lines = app().status_lines();
        assert_eq!(lines[0], "accel is: 0.00 / 9.81 / 0.00");
    }

    #[test]
    fn test_status_mentions_thresholds() {
        let app = app();
        let lines = app.status_lines();
        assert!(lines.iter().any(|l| l.contains("near threshold 230")));
        assert!(lines.iter().any(|l| l.contains("far threshold 70")));
    }
}
