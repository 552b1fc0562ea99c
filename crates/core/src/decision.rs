//! Navigation decisions and the context they are made from

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::menu::{DetectedMenu, MenuOption};

/// Next action requested by a decision
///
/// Unrecognized action names are preserved so the executor can log them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NextAction {
    PressKey,
    Speak,
    Wait,
    Hangup,
    Unknown(String),
}

impl NextAction {
    pub fn as_str(&self) -> &str {
        match self {
            NextAction::PressKey => "press_key",
            NextAction::Speak => "speak",
            NextAction::Wait => "wait",
            NextAction::Hangup => "hangup",
            NextAction::Unknown(name) => name,
        }
    }
}

impl From<String> for NextAction {
    fn from(value: String) -> Self {
        NextAction::from(value.as_str())
    }
}

impl From<&str> for NextAction {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "press_key" | "presskey" | "press" => NextAction::PressKey,
            "speak" | "say" => NextAction::Speak,
            "wait" => NextAction::Wait,
            "hangup" | "hang_up" | "end_call" => NextAction::Hangup,
            _ => NextAction::Unknown(value.trim().to_string()),
        }
    }
}

impl From<NextAction> for String {
    fn from(action: NextAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the decision engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Selected menu key (empty when no key is pressed)
    pub selected_option: String,
    /// Why this decision was made
    pub reasoning: String,
    /// Text to speak (may be empty)
    pub response: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// Action for the executor
    pub next_action: NextAction,
}

impl Decision {
    /// Silent key press
    pub fn press(key: impl Into<String>, reasoning: impl Into<String>, confidence: f32) -> Self {
        Self {
            selected_option: key.into(),
            reasoning: reasoning.into(),
            response: String::new(),
            confidence: confidence.clamp(0.0, 1.0),
            next_action: NextAction::PressKey,
        }
    }

    /// Hang up, optionally speaking `response` first
    pub fn hangup(response: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            selected_option: String::new(),
            reasoning: reasoning.into(),
            response: response.into(),
            confidence: 1.0,
            next_action: NextAction::Hangup,
        }
    }

    /// Human-readable line for the session's action history
    pub fn history_entry(&self) -> String {
        match &self.next_action {
            NextAction::PressKey => format!("Pressed {} ({})", self.selected_option, self.reasoning),
            NextAction::Speak => format!("Said \"{}\"", self.response),
            NextAction::Wait => format!("Waited ({})", self.reasoning),
            NextAction::Hangup => format!("Hung up ({})", self.reasoning),
            NextAction::Unknown(name) => format!("Unknown action '{}' ({})", name, self.reasoning),
        }
    }
}

/// Where a decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// External reasoning service
    Reasoning,
    /// Deterministic keyword scorer
    Heuristic,
}

/// Everything the reasoning service needs to pick a menu option
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContext {
    pub call_id: String,
    pub goal: String,
    pub org_name: Option<String>,
    pub target_person: Option<String>,
    pub action_history: Vec<String>,
    pub options: Vec<MenuOption>,
    pub menu_text: String,
}

impl DecisionContext {
    pub fn from_menu(
        menu: &DetectedMenu,
        goal: &str,
        org_name: Option<&str>,
        target_person: Option<&str>,
        action_history: &[String],
    ) -> Self {
        Self {
            call_id: menu.call_id.clone(),
            goal: goal.to_string(),
            org_name: org_name.map(str::to_string),
            target_person: target_person.map(str::to_string),
            action_history: action_history.to_vec(),
            options: menu.options.clone(),
            menu_text: menu.full_text.clone(),
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.options.iter().any(|o| o.key == key)
    }
}

/// Input for the end-of-call summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSummaryContext {
    pub call_id: String,
    pub goal: String,
    pub org_name: Option<String>,
    pub duration_secs: u64,
    pub action_history: Vec<String>,
}
