//! Typed messages exchanged with the collaborators around the core
//!
//! Inbound events drive the per-call state machines. Outbound commands are
//! the only externally visible side effects. Agent events are notifications
//! for observability and never feed back into decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::{DecisionSource, NextAction};
use crate::playback::Priority;
use crate::transcript::TranscriptEvent;

/// Events consumed by the core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    /// `call.started`
    #[serde(rename = "call.started")]
    CallStarted {
        call_id: String,
        phone_number: String,
        goal: String,
        #[serde(default)]
        org_name: Option<String>,
        #[serde(default)]
        target_person: Option<String>,
    },
    /// `transcript.final`
    #[serde(rename = "transcript.final")]
    TranscriptFinal {
        call_id: String,
        text: String,
        confidence: f32,
        timestamp: DateTime<Utc>,
    },
    /// `transcript.interim`, advisory only
    #[serde(rename = "transcript.interim")]
    TranscriptInterim {
        call_id: String,
        text: String,
        confidence: f32,
    },
    /// `call.ended`
    #[serde(rename = "call.ended")]
    CallEnded { call_id: String },
}

impl InboundEvent {
    pub fn call_id(&self) -> &str {
        match self {
            InboundEvent::CallStarted { call_id, .. }
            | InboundEvent::TranscriptFinal { call_id, .. }
            | InboundEvent::TranscriptInterim { call_id, .. }
            | InboundEvent::CallEnded { call_id } => call_id,
        }
    }

    /// Build a `transcript.final` event from a transcript
    pub fn from_transcript(transcript: TranscriptEvent) -> Self {
        if transcript.is_final {
            InboundEvent::TranscriptFinal {
                call_id: transcript.call_id,
                text: transcript.text,
                confidence: transcript.confidence,
                timestamp: transcript.timestamp,
            }
        } else {
            InboundEvent::TranscriptInterim {
                call_id: transcript.call_id,
                text: transcript.text,
                confidence: transcript.confidence,
            }
        }
    }
}

/// Commands produced by the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundCommand {
    #[serde(rename = "telephony.send_tone")]
    SendTone {
        call_id: String,
        digits: String,
        reasoning: String,
    },
    #[serde(rename = "telephony.terminate")]
    Terminate { call_id: String, reason: String },
    #[serde(rename = "speech.synthesize_and_play")]
    SynthesizeAndPlay {
        call_id: String,
        text: String,
        voice: Option<String>,
        priority: Priority,
    },
    /// Fire-and-forget; failures are logged by the collaborator
    #[serde(rename = "storage.save_human_answer")]
    SaveHumanAnswer {
        call_id: String,
        question: String,
        answer: String,
        goal: String,
        target_person: String,
    },
}

impl OutboundCommand {
    pub fn call_id(&self) -> &str {
        match self {
            OutboundCommand::SendTone { call_id, .. }
            | OutboundCommand::Terminate { call_id, .. }
            | OutboundCommand::SynthesizeAndPlay { call_id, .. }
            | OutboundCommand::SaveHumanAnswer { call_id, .. } => call_id,
        }
    }

    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundCommand::SendTone { .. } => "send_tone",
            OutboundCommand::Terminate { .. } => "terminate",
            OutboundCommand::SynthesizeAndPlay { .. } => "synthesize_and_play",
            OutboundCommand::SaveHumanAnswer { .. } => "save_human_answer",
        }
    }
}

/// Internal signals raised by timers, routed back through the call's worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSignal {
    /// The menu-wait timer expired without a new transcript
    WaitTimedOut { call_id: String, generation: u64 },
}

impl CallSignal {
    pub fn call_id(&self) -> &str {
        match self {
            CallSignal::WaitTimedOut { call_id, .. } => call_id,
        }
    }
}

/// Agent notifications
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Call session created
    SessionStarted { call_id: String, goal: String },
    /// A decision was resolved
    DecisionMade {
        call_id: String,
        next_action: NextAction,
        selected_option: String,
        source: DecisionSource,
    },
    /// The executor finished processing a decision
    NavigationCompleted {
        call_id: String,
        action: NextAction,
        selected_option: String,
    },
    /// The menu-wait timer expired
    WaitTimedOut { call_id: String, attempts: u32 },
    /// A voicemail greeting was heard
    VoicemailDetected { call_id: String },
    /// A live human answered
    HumanDetected { call_id: String },
    /// The scripted question was queued
    QuestionAsked { call_id: String, question: String },
    /// The human's answer was captured
    AnswerCaptured { call_id: String, answer: String },
    /// Best-effort end-of-call summary
    CallSummary {
        call_id: String,
        duration_secs: u64,
        summary: String,
    },
    /// Call session torn down
    SessionEnded { call_id: String, duration_secs: u64 },
}
