// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing Kinect devices
//! - Printing and saving settings
//! - Building the sensor and sink for a session

use depth_relay::backends::depth_map::DepthMapping;
use depth_relay::backends::kinect::{KinectSource, find_kinect_pairs};
use depth_relay::backends::stream::{NullSink, StreamSink};
use depth_relay::backends::synthetic::SyntheticSource;
use depth_relay::backends::{FrameSink, Sensor};
use depth_relay::config::Settings;
use depth_relay::constants::{SENSOR_HEIGHT, SENSOR_WIDTH};
use depth_relay::App;
use std::path::PathBuf;
use tracing::{info, warn};

/// Overrides from the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub synthetic: bool,
    pub device: Option<String>,
    pub sink: Option<String>,
    pub no_stream: bool,
    pub save_config: bool,
}

pub type SessionApp = App<Box<dyn Sensor>, Box<dyn FrameSink>>;

/// Load settings, apply overrides and optionally write them back
pub fn load_settings(overrides: &Overrides) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "Failed to load settings, using defaults");
            Settings::default()
        }
    };

    if let Some(device) = &overrides.device {
        settings.device = Some(device.clone());
    }
    if let Some(sink) = &overrides.sink {
        settings.sender.sink = Some(sink.clone());
    }

    if overrides.save_config {
        let path = settings.save()?;
        println!("Settings saved to {}", path.display());
    }

    Ok(settings)
}

/// List Kinect device pairs found through the kernel driver
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let pairs = find_kinect_pairs();

    if pairs.is_empty() {
        println!("No Kinect devices found.");
        println!("The gspca_kinect kernel module must be loaded.");
        return Ok(());
    }

    println!("Kinect devices:");
    println!();
    for (index, pair) in pairs.iter().enumerate() {
        println!("  [{}] {} ({})", index, pair.card_name, pair.bus_info);
        println!("      Depth: {}", pair.depth_path);
        println!("      Color: {}", pair.color_path);
        let tilt = pair.tilt_node().unwrap_or("not available");
        println!("      Tilt:  {}", tilt);
        println!();
    }

    Ok(())
}

/// Print the effective settings as JSON
pub fn print_config(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    match Settings::path() {
        Ok(path) => println!("# {}", path.display()),
        Err(e) => println!("# {}", e),
    }
    println!("{}", settings.to_json()?);
    Ok(())
}

/// Open the session's sensor and sink
pub fn build_app(
    settings: Settings,
    overrides: &Overrides,
) -> Result<SessionApp, Box<dyn std::error::Error>> {
    let mapping = DepthMapping::new(
        settings.depth_clip.near_mm,
        settings.depth_clip.far_mm,
        true,
    );

    let source: Box<dyn Sensor> = if overrides.synthetic {
        info!("Using synthetic depth source");
        Box::new(SyntheticSource::orbit(SENSOR_WIDTH, SENSOR_HEIGHT, mapping))
    } else {
        Box::new(KinectSource::discover(settings.device.as_deref(), mapping)?)
    };

    let sink: Box<dyn FrameSink> = if overrides.no_stream {
        info!("Streaming disabled");
        Box::new(NullSink)
    } else {
        let sink = StreamSink::new(&settings.sender)?;
        sink.start()?;
        Box::new(sink)
    };

    let mut app = App::new(source, sink, settings)?;
    app.start()?;
    Ok(app)
}

/// Directory for the terminal viewer's log file
pub fn log_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("depth-relay")
}
