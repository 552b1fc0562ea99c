//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, HumanFlowConfig, PlaybackConfig, ReasoningConfig, TimingConfig, VoicemailConfig,
};

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Call timings
    #[serde(default)]
    pub timing: TimingConfig,

    /// Reasoning service
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Speech playback
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Scripted human conversation
    #[serde(default)]
    pub human_flow: HumanFlowConfig,

    /// Voicemail handling
    #[serde(default)]
    pub voicemail: VoicemailConfig,

    /// Concurrency limits
    #[serde(default)]
    pub sessions: SessionLimits,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timing = &self.timing;

        if timing.decision_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timing.decision_timeout_ms".to_string(),
                message: "Decision timeout must be greater than zero".to_string(),
            });
        }

        if timing.menu_wait_timeout_ms <= timing.press_settle_ms {
            return Err(ConfigError::InvalidValue {
                field: "timing.menu_wait_timeout_ms".to_string(),
                message: "Menu wait timeout must exceed the press settle delay".to_string(),
            });
        }

        if timing.max_wait_timeouts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timing.max_wait_timeouts".to_string(),
                message: "At least one wait timeout must be allowed".to_string(),
            });
        }

        if self.sessions.max_concurrent_calls == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sessions.max_concurrent_calls".to_string(),
                message: "At least one concurrent call must be allowed".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.reasoning.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "reasoning.temperature".to_string(),
                message: "Temperature must be between 0.0 and 2.0".to_string(),
            });
        }

        if self.reasoning.enabled && !self.reasoning.is_usable() {
            tracing::warn!("Reasoning service enabled but no API key configured; heuristic decisions only");
        }

        Ok(())
    }
}

/// Concurrency limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Maximum simultaneous calls
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

fn default_max_concurrent_calls() -> usize {
    100
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (IVR_AGENT__ prefix, `__` separator)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(
            File::with_name(&format!("config/{}", env_name)).required(false),
        );
    }

    builder = builder.add_source(
        Environment::with_prefix("IVR_AGENT")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
