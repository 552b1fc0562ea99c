//! Parsing of model output into a navigation decision

use serde::Deserialize;
use serde_json::Value;

use ivr_agent_core::{Decision, DecisionContext, NextAction};

use crate::LlmError;

#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default, alias = "selected_option", alias = "option", alias = "key")]
    #[serde(rename = "selectedOption")]
    selected_option: Option<Value>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(rename = "nextAction", alias = "next_action", alias = "action")]
    next_action: String,
}

/// Extract the JSON object from a completion, tolerating code fences and prose
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn option_to_string(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Parse a completion into a decision validated against the menu
pub fn parse_decision(raw: &str, context: &DecisionContext) -> Result<Decision, LlmError> {
    let json = extract_json(raw)
        .ok_or_else(|| LlmError::Malformed("no JSON object in response".to_string()))?;

    let parsed: RawDecision =
        serde_json::from_str(json).map_err(|e| LlmError::Malformed(e.to_string()))?;

    let decision = Decision {
        selected_option: option_to_string(parsed.selected_option),
        reasoning: parsed.reasoning.unwrap_or_default().trim().to_string(),
        response: parsed.response.unwrap_or_default().trim().to_string(),
        confidence: parsed.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        next_action: NextAction::from(parsed.next_action.as_str()),
    };

    if decision.next_action == NextAction::PressKey && !context.has_key(&decision.selected_option) {
        return Err(LlmError::Malformed(format!(
            "selected option '{}' is not in the menu",
            decision.selected_option
        )));
    }

    Ok(decision)
}
