//! Reasoning service for IVR navigation
//!
//! Features:
//! - Prompt construction from the decision context
//! - Pluggable chat backends (OpenAI-compatible HTTP by default)
//! - Tolerant parsing of the model's JSON decision
//! - Best-effort call summaries

pub mod backend;
pub mod parse;
pub mod prompt;
pub mod reasoner;

pub use backend::{LlmBackend, OpenAiCompatibleBackend};
pub use parse::parse_decision;
pub use prompt::{Message, PromptBuilder, Role};
pub use reasoner::{DisabledReasoner, LlmReasoner, ReasoningService};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Reasoning service unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Timeout")]
    Timeout,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Http(err.to_string())
        }
    }
}

impl From<LlmError> for ivr_agent_core::Error {
    fn from(err: LlmError) -> Self {
        ivr_agent_core::Error::Reasoning(err.to_string())
    }
}
