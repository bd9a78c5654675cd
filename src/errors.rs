// SPDX-License-Identifier: GPL-3.0-only

//! Error types for depth-relay
//!
//! Core pipeline operations never fail on frame content: an empty or missing
//! frame produces an empty result. The only pipeline error is a bad
//! configuration value handed to the point cloud builder. Device and
//! transport failures are reported through [`BackendError`].

use crate::backends::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Per-frame processing errors
    Pipeline(PipelineError),
    /// Sensor or transport errors
    Backend(BackendError),
    /// Settings load/save errors
    Config(ConfigError),
    /// Generic error with message
    Other(String),
}

/// Errors raised by the processing pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Point cloud sampling stride must be at least 1
    InvalidStep(u32),
}

/// Settings file errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// No config directory could be determined for this user
    NoConfigDir,
    /// Reading or writing the settings file failed
    Io(String),
    /// The settings file is not valid JSON for [`crate::config::Settings`]
    Parse(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            AppError::Backend(e) => write!(f, "Backend error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidStep(step) => {
                write!(f, "Invalid point cloud step {} (must be >= 1)", step)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "No configuration directory available"),
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Invalid settings file: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for PipelineError {}
impl std::error::Error for ConfigError {}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_step_message() {
        let err = AppError::from(PipelineError::InvalidStep(0));
        assert_eq!(
            err.to_string(),
            "Pipeline error: Invalid point cloud step 0 (must be >= 1)"
        );
    }

    #[test]
    fn test_parse_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
