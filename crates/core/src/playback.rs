//! Playback request types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Playback priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    /// Jumps to the front of the line's queue
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// A request to speak text on a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackRequest {
    pub call_id: String,
    pub text: String,
    pub priority: Priority,
    /// Requested voice, if any
    pub voice: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PlaybackRequest {
    pub fn new(call_id: impl Into<String>, text: impl Into<String>, priority: Priority) -> Self {
        Self {
            call_id: call_id.into(),
            text: text.into(),
            priority,
            voice: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the voice
    pub fn with_voice(mut self, voice: Option<String>) -> Self {
        self.voice = voice;
        self
    }
}
