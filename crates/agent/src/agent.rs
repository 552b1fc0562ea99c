//! Call agent
//!
//! Wires detection, decisions, actions, the human flow and playback together
//! and routes each final transcript to the right one.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use ivr_agent_config::Settings;
use ivr_agent_core::{
    AgentEvent, CallSignal, CommandSink, DetectionResult, Priority, SessionStore, TranscriptEvent,
};
use ivr_agent_llm::ReasoningService;
use ivr_agent_pipeline::PlaybackQueue;

use crate::detector::MenuDetector;
use crate::engine::DecisionEngine;
use crate::executor::ActionExecutor;
use crate::human_flow::HumanFlow;
use crate::session::{CallPhase, CallSessions};
use crate::AgentError;

/// Orchestrates every live call
pub struct CallAgent {
    detector: MenuDetector,
    engine: DecisionEngine,
    executor: Arc<ActionExecutor>,
    human_flow: Arc<HumanFlow>,
    playback: Arc<PlaybackQueue>,
    sessions: Arc<CallSessions>,
    hangup_delay: Duration,
    event_tx: broadcast::Sender<AgentEvent>,
}

impl CallAgent {
    /// Build the agent
    ///
    /// Timer signals come back on the returned receiver and must be fed to
    /// `handle_signal` in order with the call's transcripts.
    pub fn new(
        settings: &Settings,
        reasoner: Arc<dyn ReasoningService>,
        commands: Arc<dyn CommandSink>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<CallSignal>) {
        let (event_tx, _) = broadcast::channel(256);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let sessions = Arc::new(CallSessions::with_capacity_limit(
            settings.sessions.max_concurrent_calls,
        ));
        let playback = Arc::new(PlaybackQueue::new(Arc::clone(&commands)));

        let executor = Arc::new(ActionExecutor::new(
            Arc::clone(&sessions),
            Arc::clone(&playback),
            Arc::clone(&commands),
            signal_tx,
            event_tx.clone(),
            settings.timing.clone(),
            settings.playback.voice.clone(),
        ));

        let engine = DecisionEngine::new(
            Arc::clone(&sessions),
            reasoner,
            Arc::clone(&executor),
            settings,
            event_tx.clone(),
        );

        let human_flow = Arc::new(HumanFlow::new(
            Arc::clone(&playback),
            commands,
            settings,
            event_tx.clone(),
        ));

        let agent = Arc::new(Self {
            detector: MenuDetector::new(),
            engine,
            executor,
            human_flow,
            playback,
            sessions,
            hangup_delay: settings.timing.hangup_delay(),
            event_tx,
        });

        (agent, signal_rx)
    }

    /// Subscribe to agent notifications
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_tx.subscribe()
    }

    /// Set up everything a new call needs
    pub fn start_call(
        &self,
        call_id: &str,
        phone_number: &str,
        goal: &str,
        org_name: Option<String>,
        target_person: Option<String>,
    ) -> Result<(), AgentError> {
        self.engine
            .start_session(call_id, phone_number, goal, org_name.clone(), target_person.clone())?;

        let rest = self
            .human_flow
            .start(call_id, goal, org_name, target_person)
            .and_then(|_| self.playback.open(call_id).map_err(AgentError::from));

        if let Err(e) = rest {
            self.end_call(call_id);
            return Err(e);
        }
        Ok(())
    }

    /// Route one transcript for its call
    pub async fn handle_transcript(&self, transcript: &TranscriptEvent) -> Result<(), AgentError> {
        let call_id = transcript.call_id.as_str();

        if !transcript.is_final {
            tracing::trace!(call_id = %call_id, "Ignoring interim transcript");
            return Ok(());
        }
        if transcript.is_empty() {
            return Ok(());
        }

        let Some(phase) = self.engine.phase(call_id) else {
            tracing::debug!(call_id = %call_id, "Transcript for unknown call");
            return Ok(());
        };

        self.engine.note_activity(call_id);

        if phase == CallPhase::Closed {
            tracing::debug!(call_id = %call_id, "Call is ending; transcript ignored");
            return Ok(());
        }

        let detection = self.detector.detect(
            call_id,
            &transcript.text,
            transcript.confidence,
            transcript.timestamp,
        );
        tracing::debug!(call_id = %call_id, result = detection.label(), "Transcript classified");

        if phase == CallPhase::HumanFlow || self.human_flow.is_engaged(call_id) {
            // a menu or voicemail before the question means no person answered
            let automated = !matches!(detection, DetectionResult::NoSignal);
            if automated && self.human_flow.withdraw(call_id) {
                self.engine.leave_human_flow(call_id);
            } else {
                return self.continue_conversation(call_id, &transcript.text).await;
            }
        }

        match detection {
            DetectionResult::Voicemail => self.engine.on_voicemail_detected(call_id).await,
            DetectionResult::Menu(menu) => self.engine.on_menu_detected(call_id, menu).await,
            DetectionResult::NoSignal => {
                if self.sounds_like_person(&transcript.text) && self.engine.enter_human_flow(call_id) {
                    self.human_flow.on_greeting(call_id);
                }
                Ok(())
            }
        }
    }

    /// A greeting with no automated-system vocabulary
    ///
    /// Framing phrases alone mark an IVR opener unless a live-person cue
    /// comes with them.
    fn sounds_like_person(&self, text: &str) -> bool {
        if !HumanFlow::is_greeting(text) || self.detector.is_menu_like(text) {
            return false;
        }
        HumanFlow::has_live_person_cue(text) || !self.detector.is_framed(text)
    }

    async fn continue_conversation(&self, call_id: &str, text: &str) -> Result<(), AgentError> {
        if self.human_flow.on_transcript(call_id, text).is_none() {
            return Ok(());
        }

        let closing = self.human_flow.closing_message().to_string();
        if self.human_flow.hangs_up_after_answer() {
            self.executor
                .hang_up_after(call_id, &closing, self.hangup_delay, "human answer captured")
                .await
        } else {
            self.executor.say(call_id, &closing, Priority::High);
            Ok(())
        }
    }

    /// Handle a timer signal raised for a call
    pub async fn handle_signal(&self, signal: CallSignal) -> Result<(), AgentError> {
        match signal {
            CallSignal::WaitTimedOut { call_id, generation } => {
                self.engine.on_wait_timeout(&call_id, generation).await
            }
        }
    }

    /// Tear down everything held for a call
    ///
    /// Synchronous: once this returns no timer, decision or playback for the
    /// call will act again.
    pub fn end_call(&self, call_id: &str) -> Option<Duration> {
        let duration = self.engine.handle_call_completed(call_id);
        self.human_flow.discard(call_id);
        self.playback.discard(call_id);
        duration
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn human_flow(&self) -> &Arc<HumanFlow> {
        &self.human_flow
    }

    pub fn playback(&self) -> &Arc<PlaybackQueue> {
        &self.playback
    }

    pub fn executor(&self) -> &Arc<ActionExecutor> {
        &self.executor
    }

    /// Number of live calls
    pub fn active_calls(&self) -> usize {
        self.sessions.count()
    }
}
