//! Configuration management for the IVR call agent
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (IVR_AGENT__ prefix)

pub mod call;
pub mod reasoning;
pub mod settings;

pub use call::{HumanFlowConfig, PlaybackConfig, TimingConfig, VoicemailConfig};
pub use reasoning::ReasoningConfig;
pub use settings::{load_settings, ObservabilityConfig, SessionLimits, Settings};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
