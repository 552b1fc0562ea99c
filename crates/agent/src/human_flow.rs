//! Human Conversation Flow
//!
//! Once a live person greets us: wait a moment, ask one scripted question,
//! capture the next thing they say as the answer, then hand the call back for
//! a polite hangup.
//!
//! `awaiting_human -> question_asked -> completed`

use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

use ivr_agent_config::{HumanFlowConfig, Settings};
use ivr_agent_core::{
    AgentEvent, CommandSink, OutboundCommand, PlaybackRequest, Priority, SessionRegistry, SessionStore,
};
use ivr_agent_pipeline::PlaybackQueue;

use crate::script;
use crate::AgentError;

static GREETING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?:hello|hi|hey)\b",
        r"\bgood (?:morning|afternoon|evening)\b",
        r"\bthank you for calling\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Phrases a recording rarely says
static LIVE_PERSON_CUES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bhow (?:can|may) (?:i|we) help\b",
        r"\bthis is [a-z]+(?: [a-z]+)? speaking\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Progress of the scripted conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumanFlowState {
    AwaitingHuman,
    QuestionAsked,
    Completed,
}

/// Conversation state with the person on the line
#[derive(Debug, Clone)]
pub struct HumanFlowSession {
    pub call_id: String,
    pub goal: String,
    /// Who we are asking about
    pub target_person: String,
    pub org_name: Option<String>,
    pub state: HumanFlowState,
    pub has_reached_human: bool,
    pub has_asked_question: bool,
    pub question_asked: Option<String>,
    pub human_response: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// The answer captured from a person
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAnswer {
    pub call_id: String,
    pub question: String,
    pub answer: String,
}

struct FlowHandle {
    session: Mutex<HumanFlowSession>,
    greeting_timer: Mutex<Option<AbortHandle>>,
}

/// Human conversation flows for all live calls
pub struct HumanFlow {
    flows: SessionRegistry<FlowHandle>,
    playback: Arc<PlaybackQueue>,
    commands: Arc<dyn CommandSink>,
    config: HumanFlowConfig,
    greeting_delay: Duration,
    voice: Option<String>,
    event_tx: broadcast::Sender<AgentEvent>,
}

impl HumanFlow {
    pub fn new(
        playback: Arc<PlaybackQueue>,
        commands: Arc<dyn CommandSink>,
        settings: &Settings,
        event_tx: broadcast::Sender<AgentEvent>,
    ) -> Self {
        Self {
            flows: SessionRegistry::new(),
            playback,
            commands,
            config: settings.human_flow.clone(),
            greeting_delay: settings.timing.greeting_delay(),
            voice: settings.playback.voice.clone(),
            event_tx,
        }
    }

    /// Does this transcript sound like a person answering?
    pub fn is_greeting(text: &str) -> bool {
        let lowered = text.to_lowercase();
        GREETING_PATTERNS.iter().any(|p| p.is_match(&lowered)) || Self::match_live_cue(&lowered)
    }

    /// Does this transcript carry a cue only a live person gives?
    pub fn has_live_person_cue(text: &str) -> bool {
        Self::match_live_cue(&text.to_lowercase())
    }

    fn match_live_cue(lowered: &str) -> bool {
        LIVE_PERSON_CUES.iter().any(|p| p.is_match(lowered))
    }

    /// Prepare a flow for a call, awaiting a human
    pub fn start(
        &self,
        call_id: &str,
        goal: &str,
        org_name: Option<String>,
        target_person: Option<String>,
    ) -> Result<(), AgentError> {
        let target_person = target_person
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.config.default_target.clone());

        let session = HumanFlowSession {
            call_id: call_id.to_string(),
            goal: goal.to_string(),
            target_person,
            org_name,
            state: HumanFlowState::AwaitingHuman,
            has_reached_human: false,
            has_asked_question: false,
            question_asked: None,
            human_response: None,
            started_at: Utc::now(),
        };

        self.flows
            .put(
                call_id,
                Arc::new(FlowHandle {
                    session: Mutex::new(session),
                    greeting_timer: Mutex::new(None),
                }),
            )
            .map_err(|e| AgentError::Session(e.to_string()))
    }

    /// Has a person been reached on this call?
    pub fn is_engaged(&self, call_id: &str) -> bool {
        self.flows
            .get(call_id)
            .map(|flow| flow.session.lock().has_reached_human)
            .unwrap_or(false)
    }

    /// A greeting was heard; ask the question after the greeting delay
    ///
    /// Returns false if the call has no flow or already reached a person.
    pub fn on_greeting(self: &Arc<Self>, call_id: &str) -> bool {
        let Some(flow) = self.flows.get(call_id) else {
            return false;
        };

        {
            let mut session = flow.session.lock();
            if session.has_reached_human {
                return false;
            }
            session.has_reached_human = true;
        }

        tracing::info!(call_id = %call_id, "Live person reached");
        let _ = self.event_tx.send(AgentEvent::HumanDetected {
            call_id: call_id.to_string(),
        });

        let this = Arc::clone(self);
        let call_id_owned = call_id.to_string();
        let delay = self.greeting_delay;
        let task_flow = Arc::clone(&flow);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.ask_question(&call_id_owned, &task_flow);
        });

        let mut timer = flow.greeting_timer.lock();
        if let Some(previous) = timer.replace(task.abort_handle()) {
            previous.abort();
        }
        true
    }

    fn ask_question(&self, call_id: &str, flow: &Arc<FlowHandle>) {
        let still_current = self
            .flows
            .get(call_id)
            .map(|registered| Arc::ptr_eq(&registered, flow))
            .unwrap_or(false);
        if !still_current {
            return;
        }

        let question = {
            let mut session = flow.session.lock();
            if session.has_asked_question || !session.has_reached_human {
                return;
            }
            let question = script::render(
                &self.config.question_template,
                &session.goal,
                session.org_name.as_deref(),
                Some(session.target_person.as_str()),
                &self.config.default_target,
            );
            session.has_asked_question = true;
            session.question_asked = Some(question.clone());
            session.state = HumanFlowState::QuestionAsked;
            question
        };

        tracing::info!(call_id = %call_id, "Asking: {}", question);
        let request = PlaybackRequest::new(call_id, question.clone(), Priority::High).with_voice(self.voice.clone());
        self.playback.enqueue(request);

        let _ = self.event_tx.send(AgentEvent::QuestionAsked {
            call_id: call_id.to_string(),
            question,
        });
    }

    /// Offer a final transcript to the flow
    ///
    /// The first non-empty transcript after the question is the answer: it is
    /// persisted in the background and the flow is torn down.
    pub fn on_transcript(&self, call_id: &str, text: &str) -> Option<CapturedAnswer> {
        let flow = self.flows.get(call_id)?;
        let answer = text.trim();

        let (captured, goal, target_person) = {
            let mut session = flow.session.lock();
            if session.state != HumanFlowState::QuestionAsked || answer.is_empty() {
                tracing::debug!(call_id = %call_id, "Transcript before the question; not an answer");
                return None;
            }
            session.human_response = Some(answer.to_string());
            session.state = HumanFlowState::Completed;

            let captured = CapturedAnswer {
                call_id: call_id.to_string(),
                question: session.question_asked.clone().unwrap_or_default(),
                answer: answer.to_string(),
            };
            (captured, session.goal.clone(), session.target_person.clone())
        };

        self.flows.remove(call_id);

        let save = OutboundCommand::SaveHumanAnswer {
            call_id: call_id.to_string(),
            question: captured.question.clone(),
            answer: captured.answer.clone(),
            goal,
            target_person,
        };
        let commands = Arc::clone(&self.commands);
        tokio::spawn(async move {
            let call_id = save.call_id().to_string();
            if let Err(e) = commands.send(save).await {
                tracing::warn!(call_id = %call_id, "Failed to save answer: {}", e);
            }
        });

        tracing::info!(call_id = %call_id, "Captured answer: {}", captured.answer);
        let _ = self.event_tx.send(AgentEvent::AnswerCaptured {
            call_id: call_id.to_string(),
            answer: captured.answer.clone(),
        });

        Some(captured)
    }

    /// Take back a greeting before the question was asked
    ///
    /// The call turned out to be automated after all: the pending question is
    /// cancelled and the flow waits for a person again. Returns false once the
    /// question is out.
    pub fn withdraw(&self, call_id: &str) -> bool {
        let Some(flow) = self.flows.get(call_id) else {
            return false;
        };

        {
            let mut session = flow.session.lock();
            if !session.has_reached_human || session.has_asked_question {
                return false;
            }
            session.has_reached_human = false;
        }

        if let Some(timer) = flow.greeting_timer.lock().take() {
            timer.abort();
        }
        tracing::info!(call_id = %call_id, "Greeting withdrawn; automated system still on the line");
        true
    }

    /// Drop the flow without persisting anything
    pub fn discard(&self, call_id: &str) {
        if let Some(flow) = self.flows.remove(call_id) {
            if let Some(timer) = flow.greeting_timer.lock().take() {
                timer.abort();
            }
            tracing::debug!(call_id = %call_id, "Human flow discarded");
        }
    }

    pub fn snapshot(&self, call_id: &str) -> Option<HumanFlowSession> {
        self.flows.get(call_id).map(|flow| flow.session.lock().clone())
    }

    pub fn closing_message(&self) -> &str {
        &self.config.closing_message
    }

    pub fn hangs_up_after_answer(&self) -> bool {
        self.config.hang_up_after_answer
    }
}
