//! Live call orchestration
//!
//! Features:
//! - Menu and voicemail detection on final transcripts
//! - Navigation decisions with a deterministic heuristic fallback
//! - Action execution with timers owned by the call session
//! - Scripted human conversation (one question, one answer)
//! - `CallAgent` facade tying the pieces together per call

pub mod agent;
pub mod detector;
pub mod engine;
pub mod executor;
pub mod heuristic;
pub mod human_flow;
pub mod keywords;
pub mod script;
pub mod session;

pub use agent::CallAgent;
pub use detector::MenuDetector;
pub use engine::DecisionEngine;
pub use executor::ActionExecutor;
pub use heuristic::{HeuristicScorer, MatchTier};
pub use human_flow::{CapturedAnswer, HumanFlow, HumanFlowSession, HumanFlowState};
pub use session::{CallPhase, CallSession, CallSessionHandle, CallSessions, CallTimers, TimerKind};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Unknown call: {0}")]
    UnknownCall(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl From<ivr_agent_pipeline::PipelineError> for AgentError {
    fn from(err: ivr_agent_pipeline::PipelineError) -> Self {
        AgentError::Pipeline(err.to_string())
    }
}

impl From<ivr_agent_llm::LlmError> for AgentError {
    fn from(err: ivr_agent_llm::LlmError) -> Self {
        AgentError::Llm(err.to_string())
    }
}

impl From<ivr_agent_core::Error> for AgentError {
    fn from(err: ivr_agent_core::Error) -> Self {
        match err {
            ivr_agent_core::Error::SessionNotFound(id) => AgentError::UnknownCall(id),
            ivr_agent_core::Error::ChannelClosed => AgentError::Command("command channel closed".to_string()),
            ivr_agent_core::Error::Command(msg) => AgentError::Command(msg),
            other => AgentError::Session(other.to_string()),
        }
    }
}

impl From<AgentError> for ivr_agent_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::UnknownCall(id) => ivr_agent_core::Error::SessionNotFound(id),
            AgentError::Command(msg) => ivr_agent_core::Error::Command(msg),
            AgentError::Llm(msg) => ivr_agent_core::Error::Reasoning(msg),
            other => ivr_agent_core::Error::Other(other.to_string()),
        }
    }
}
