//! Speech output pipeline
//!
//! Provides the per-call playback queue:
//! - One utterance in flight per line
//! - High priority requests jump the queue
//! - Interrupt and discard on call end

pub mod playback;

pub use playback::{PlaybackQueue, PlaybackSnapshot};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("No playback line for call: {0}")]
    LineNotFound(String),

    #[error("Playback line already open: {0}")]
    LineExists(String),
}

impl From<PipelineError> for ivr_agent_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::LineNotFound(id) => ivr_agent_core::Error::SessionNotFound(id),
            PipelineError::LineExists(id) => ivr_agent_core::Error::SessionExists(id),
        }
    }
}
