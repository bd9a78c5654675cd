// SPDX-License-Identifier: GPL-3.0-only

//! Persisted user settings
//!
//! Stored as JSON at `<config dir>/depth-relay/config.json`. A missing file
//! yields the defaults; missing fields fall back to their defaults too.

use crate::constants::{self, depth_clip, point_cloud, sender, thresholds};
use crate::errors::ConfigError;
use crate::pipeline::{BlobFilter, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "depth-relay";
const CONFIG_FILE: &str = "config.json";

/// Outbound stream settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderSettings {
    /// Stream name, used as the PipeWire node name
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Frame rate advertised in the stream caps
    pub frame_rate: u32,
    /// GStreamer bin description replacing the default PipeWire sink,
    /// e.g. `"videoconvert ! autovideosink"`
    pub sink: Option<String>,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            name: sender::DEFAULT_NAME.to_string(),
            width: sender::DEFAULT_WIDTH,
            height: sender::DEFAULT_HEIGHT,
            frame_rate: constants::DEFAULT_FRAME_RATE,
            sink: None,
        }
    }
}

/// Depth range mapped onto the 8-bit raster, in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthClip {
    pub near_mm: u16,
    pub far_mm: u16,
}

impl Default for DepthClip {
    fn default() -> Self {
        Self {
            near_mm: depth_clip::DEFAULT_NEAR_MM,
            far_mm: depth_clip::DEFAULT_FAR_MM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sender: SenderSettings,
    pub blobs: BlobFilter,
    pub point_cloud_step: u32,
    pub initial_near_threshold: u8,
    pub initial_far_threshold: u8,
    pub depth_clip: DepthClip,
    /// Depth video node (e.g. `/dev/video1`); first Kinect found if unset
    pub device: Option<String>,
    /// Processing ticks per second
    pub frame_rate: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sender: SenderSettings::default(),
            blobs: BlobFilter::default(),
            point_cloud_step: point_cloud::DEFAULT_STEP,
            initial_near_threshold: thresholds::DEFAULT_NEAR,
            initial_far_threshold: thresholds::DEFAULT_FAR,
            depth_clip: DepthClip::default(),
            device: None,
            frame_rate: constants::DEFAULT_FRAME_RATE,
        }
    }
}

impl Settings {
    /// Default location of the settings file
    pub fn path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, returning defaults if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&contents)?;
        debug!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Starting pipeline configuration for a session
    pub fn initial_config(&self) -> PipelineConfig {
        PipelineConfig::with_thresholds(self.initial_near_threshold, self.initial_far_threshold)
    }
}
