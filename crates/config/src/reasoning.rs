//! Reasoning service configuration

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible reasoning endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Use the reasoning service at all (heuristic only when false)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL, e.g. `https://api.openai.com/v1`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key (set via IVR_AGENT__REASONING__API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP-level timeout; decisions are additionally bounded by the timing config
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Request a natural-language summary when a call ends
    #[serde(default)]
    pub summaries_enabled: bool,
}

fn default_true() -> bool {
    true
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    300
}
fn default_request_timeout_ms() -> u64 {
    10000
}

impl ReasoningConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Enabled and usable
    pub fn is_usable(&self) -> bool {
        self.enabled
            && !self.base_url.trim().is_empty()
            && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_ms: default_request_timeout_ms(),
            summaries_enabled: false,
        }
    }
}
