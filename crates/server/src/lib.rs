//! IVR Agent Server
//!
//! Runs the call agent behind a per-call dispatcher. Inbound events and
//! outbound commands travel as newline-delimited JSON.

pub mod bridge;
pub mod dispatcher;
pub mod telemetry;

pub use bridge::{pump_events, write_commands};
pub use dispatcher::CallDispatcher;
pub use telemetry::{init_tracing, log_events};

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Call error: {0}")]
    Call(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ivr_agent_agent::AgentError> for ServerError {
    fn from(err: ivr_agent_agent::AgentError) -> Self {
        ServerError::Call(err.to_string())
    }
}

impl From<ivr_agent_config::ConfigError> for ServerError {
    fn from(err: ivr_agent_config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::InvalidEvent(err.to_string())
    }
}

impl From<ServerError> for ivr_agent_core::Error {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Config(msg) => ivr_agent_core::Error::Config(msg),
            other => ivr_agent_core::Error::Other(other.to_string()),
        }
    }
}
