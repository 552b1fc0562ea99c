//! Menu types produced by the menu detector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One selectable item parsed from a spoken IVR menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuOption {
    /// Key to press (digit, `#` or `*`)
    pub key: String,
    /// Normalized lowercase description
    pub description: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

impl MenuOption {
    pub fn new(key: impl Into<String>, description: impl Into<String>, confidence: f32) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Numeric value of the key, if it is made of digits only
    pub fn numeric_key(&self) -> Option<u32> {
        if self.key.is_empty() || !self.key.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        self.key.parse().ok()
    }
}

/// A menu detected in one final transcript
///
/// Ephemeral: consumed by a single decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedMenu {
    /// Call identifier
    pub call_id: String,
    /// Options, unique by key and sorted
    pub options: Vec<MenuOption>,
    /// Full source transcript
    pub full_text: String,
    /// Menu-level confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Transcript timestamp
    pub timestamp: DateTime<Utc>,
}

impl DetectedMenu {
    /// Find an option by key
    pub fn option(&self, key: &str) -> Option<&MenuOption> {
        self.options.iter().find(|o| o.key == key)
    }

    /// Check whether a key is offered by this menu
    pub fn has_key(&self, key: &str) -> bool {
        self.option(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// One line per option, used in prompts and logs
    pub fn describe_options(&self) -> String {
        self.options
            .iter()
            .map(|o| format!("Press {}: {} (confidence {:.2})", o.key, o.description, o.confidence))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Classification of one final transcript
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    /// An answering machine or voicemail greeting
    Voicemail,
    /// An automated menu with at least one option
    Menu(DetectedMenu),
    /// Nothing actionable
    NoSignal,
}

impl DetectionResult {
    pub fn is_voicemail(&self) -> bool {
        matches!(self, DetectionResult::Voicemail)
    }

    pub fn menu(&self) -> Option<&DetectedMenu> {
        match self {
            DetectionResult::Menu(menu) => Some(menu),
            _ => None,
        }
    }

    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            DetectionResult::Voicemail => "voicemail",
            DetectionResult::Menu(_) => "menu",
            DetectionResult::NoSignal => "no_signal",
        }
    }
}
