//! Prompt Building
//!
//! Constructs prompts for IVR navigation decisions and call summaries.

use std::fmt;
use serde::{Deserialize, Serialize};

use ivr_agent_core::{CallSummaryContext, DecisionContext};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

const NAVIGATOR_SYSTEM_PROMPT: &str = r#"You are navigating an automated phone menu (IVR) on behalf of a caller.

## Your Role
- Pick the single menu option most likely to reach the person or department in the goal
- Prefer options leading to staff, administration, an operator or a directory over automated self-service
- Avoid patient, billing, emergency and prescription lines unless the goal asks for them
- Stay silent when pressing keys; automated systems re-prompt on unexpected speech

## Actions
- press_key: press `selectedOption` (must be one of the listed keys)
- speak: say `response` (only when the system asks for a spoken answer)
- wait: the menu is still being read; wait for more options
- hangup: the goal cannot be reached through this menu

## Response Format
Reply with a single JSON object and nothing else:
{"selectedOption": "<key or empty>", "reasoning": "<one sentence>", "response": "<text to speak or empty>", "confidence": <0.0-1.0>, "nextAction": "press_key|speak|wait|hangup"}"#;

/// Prompt builder for navigation decisions
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Add the navigator system prompt
    pub fn navigator_system_prompt(mut self) -> Self {
        self.messages.push(Message::system(NAVIGATOR_SYSTEM_PROMPT));
        self
    }

    /// Add the call goal and who we are calling
    pub fn with_goal(mut self, goal: &str, org_name: Option<&str>, target_person: Option<&str>) -> Self {
        let mut parts = vec![format!("Goal: {}", goal)];

        if let Some(org) = org_name.filter(|o| !o.trim().is_empty()) {
            parts.push(format!("Organization: {}", org));
        }
        if let Some(target) = target_person.filter(|t| !t.trim().is_empty()) {
            parts.push(format!("Trying to reach: {}", target));
        }

        self.messages.push(Message::system(parts.join("\n")));
        self
    }

    /// Add previous navigation steps
    pub fn with_history(mut self, history: &[String]) -> Self {
        if !history.is_empty() {
            let steps = history
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {}", i + 1, step))
                .collect::<Vec<_>>()
                .join("\n");
            self.messages.push(Message::system(format!("## Actions So Far\n{}", steps)));
        }
        self
    }

    /// Add the menu as heard
    pub fn with_menu(mut self, context: &DecisionContext) -> Self {
        let options = context
            .options
            .iter()
            .map(|o| format!("- Press {}: {}", o.key, o.description))
            .collect::<Vec<_>>()
            .join("\n");

        self.messages.push(Message::user(format!(
            "The phone system said:\n\"{}\"\n\nDetected options:\n{}\n\nWhich action should I take?",
            context.menu_text, options
        )));
        self
    }

    /// Full decision prompt for a context
    pub fn decision(context: &DecisionContext) -> Vec<Message> {
        Self::new()
            .navigator_system_prompt()
            .with_goal(
                &context.goal,
                context.org_name.as_deref(),
                context.target_person.as_deref(),
            )
            .with_history(&context.action_history)
            .with_menu(context)
            .build()
    }

    /// Summary prompt for a finished call
    pub fn summary(context: &CallSummaryContext) -> Vec<Message> {
        let org = context.org_name.as_deref().unwrap_or("the organization");
        Self::new()
            .push(Message::system(
                "Summarize this phone navigation attempt in two sentences for an operator. \
                 State whether the goal was likely reached.",
            ))
            .with_goal(&context.goal, Some(org), None)
            .with_history(&context.action_history)
            .push(Message::user(format!(
                "The call lasted {} seconds. Write the summary.",
                context.duration_secs
            )))
            .build()
    }

    fn push(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Build the message list
    pub fn build(self) -> Vec<Message> {
        self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
