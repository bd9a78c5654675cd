// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for sensor and transport backends

use serde::{Deserialize, Serialize};

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Sensor device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

/// Front LED indicator mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LedMode {
    Off,
    #[default]
    Green,
    Red,
    Yellow,
    BlinkGreen,
    BlinkRedYellow,
}

impl LedMode {
    /// Value understood by the Kinect LED control
    pub fn control_value(&self) -> i32 {
        match self {
            LedMode::Off => 0,
            LedMode::Green => 1,
            LedMode::Red => 2,
            LedMode::Yellow => 3,
            LedMode::BlinkGreen => 4,
            LedMode::BlinkRedYellow => 6,
        }
    }
}

impl std::fmt::Display for LedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LedMode::Off => "off",
            LedMode::Green => "green",
            LedMode::Red => "red",
            LedMode::Yellow => "yellow",
            LedMode::BlinkGreen => "blinking green",
            LedMode::BlinkRedYellow => "blinking red/yellow",
        };
        write!(f, "{}", name)
    }
}
