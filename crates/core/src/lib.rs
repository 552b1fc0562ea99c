//! Core traits and types for the IVR call agent
//!
//! This crate provides foundational types used across all other crates:
//! - Menu detection results
//! - Navigation decisions and the reasoning context
//! - Playback requests
//! - Inbound events, outbound commands and agent notifications
//! - Session registry abstraction
//! - Error types

pub mod command;
pub mod decision;
pub mod error;
pub mod events;
pub mod menu;
pub mod playback;
pub mod registry;
pub mod transcript;

pub use command::{ChannelCommandSink, CommandSink};
pub use decision::{CallSummaryContext, Decision, DecisionContext, DecisionSource, NextAction};
pub use error::{Error, Result};
pub use events::{AgentEvent, CallSignal, InboundEvent, OutboundCommand};
pub use menu::{DetectedMenu, DetectionResult, MenuOption};
pub use playback::{PlaybackRequest, Priority};
pub use registry::{SessionRegistry, SessionStore};
pub use transcript::TranscriptEvent;
