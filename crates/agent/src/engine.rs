//! Decision Engine
//!
//! Owns the call sessions and serializes navigation decisions per call. The
//! reasoning service is asked first, bounded by a timeout; anything other than
//! a usable answer falls back to the keyword heuristic so a call never stalls.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use ivr_agent_config::{Settings, TimingConfig, VoicemailConfig};
use ivr_agent_core::{
    AgentEvent, CallSummaryContext, Decision, DecisionContext, DecisionSource, DetectedMenu,
    NextAction, SessionStore,
};
use ivr_agent_llm::ReasoningService;

use crate::executor::ActionExecutor;
use crate::heuristic::HeuristicScorer;
use crate::script;
use crate::session::{is_current, CallPhase, CallSession, CallSessionHandle, CallSessions, TimerKind};
use crate::AgentError;

/// Decision engine for all live calls
pub struct DecisionEngine {
    sessions: Arc<CallSessions>,
    reasoner: Arc<dyn ReasoningService>,
    executor: Arc<ActionExecutor>,
    timing: TimingConfig,
    voicemail: VoicemailConfig,
    default_target: String,
    summaries_enabled: bool,
    event_tx: broadcast::Sender<AgentEvent>,
}

impl DecisionEngine {
    pub fn new(
        sessions: Arc<CallSessions>,
        reasoner: Arc<dyn ReasoningService>,
        executor: Arc<ActionExecutor>,
        settings: &Settings,
        event_tx: broadcast::Sender<AgentEvent>,
    ) -> Self {
        Self {
            sessions,
            reasoner,
            executor,
            timing: settings.timing.clone(),
            voicemail: settings.voicemail.clone(),
            default_target: settings.human_flow.default_target.clone(),
            summaries_enabled: settings.reasoning.summaries_enabled,
            event_tx,
        }
    }

    /// Register a new call in `listening`
    pub fn start_session(
        &self,
        call_id: &str,
        phone_number: &str,
        goal: &str,
        org_name: Option<String>,
        target_person: Option<String>,
    ) -> Result<Arc<CallSessionHandle>, AgentError> {
        let session = CallSession::new(call_id, phone_number, goal, org_name, target_person);
        let handle = Arc::new(CallSessionHandle::new(session));

        self.sessions
            .put(call_id, Arc::clone(&handle))
            .map_err(|e| AgentError::Session(e.to_string()))?;

        tracing::info!(call_id = %call_id, goal = %goal, "Call session started");
        let _ = self.event_tx.send(AgentEvent::SessionStarted {
            call_id: call_id.to_string(),
            goal: goal.to_string(),
        });

        Ok(handle)
    }

    /// Decide and act on a detected menu
    ///
    /// A menu that arrives while another decision is in flight for the same
    /// call is queued and handled once that decision has been carried out.
    pub async fn on_menu_detected(&self, call_id: &str, menu: DetectedMenu) -> Result<(), AgentError> {
        let Some(handle) = self.sessions.get(call_id) else {
            tracing::warn!(call_id = %call_id, "Menu detected for unknown call");
            return Ok(());
        };

        let mut context = {
            let mut state = handle.lock();
            if !state.phase.accepts_menus() {
                tracing::debug!(call_id = %call_id, phase = state.phase.as_str(), "Ignoring menu");
                return Ok(());
            }
            if matches!(state.phase, CallPhase::Deciding | CallPhase::Acting) {
                state.pending_menus.push_back(menu);
                tracing::debug!(call_id = %call_id, queued = state.pending_menus.len(), "Menu queued behind decision");
                return Ok(());
            }
            state.phase = CallPhase::Deciding;
            state.wait_timeouts = 0;
            state.disarm_wait();
            Self::context_for(&state, &menu)
        };
        handle.timers().cancel(TimerKind::MenuWait);

        loop {
            let (decision, source) = self.decide(&context).await;

            if !is_current(&self.sessions, call_id, &handle) {
                tracing::debug!(call_id = %call_id, "Call ended while deciding");
                return Ok(());
            }

            {
                let mut state = handle.lock();
                if state.phase != CallPhase::Deciding {
                    tracing::debug!(call_id = %call_id, phase = state.phase.as_str(), "Dropping decision");
                    return Ok(());
                }
                state.record(decision.history_entry());
                state.phase = CallPhase::Acting;
            }

            tracing::info!(
                call_id = %call_id,
                action = %decision.next_action,
                option = %decision.selected_option,
                confidence = decision.confidence,
                source = ?source,
                "Decision made: {}",
                decision.reasoning
            );
            let _ = self.event_tx.send(AgentEvent::DecisionMade {
                call_id: call_id.to_string(),
                next_action: decision.next_action.clone(),
                selected_option: decision.selected_option.clone(),
                source,
            });

            if let Err(e) = self.executor.execute(call_id, &decision).await {
                tracing::warn!(call_id = %call_id, "Failed to carry out decision: {}", e);
                let reason = format!("navigation failed: {}", e);
                if let Err(e) = self.executor.hang_up_after(call_id, "", Duration::ZERO, &reason).await {
                    tracing::error!(call_id = %call_id, "Failed to end call: {}", e);
                }
                return Ok(());
            }

            let next = {
                let mut state = handle.lock();
                let phase = state.phase;
                match phase {
                    CallPhase::Listening => state.pending_menus.pop_front().map(|menu| {
                        // a wait armed by the previous decision is superseded
                        state.disarm_wait();
                        state.phase = CallPhase::Deciding;
                        Self::context_for(&state, &menu)
                    }),
                    CallPhase::Closed | CallPhase::HumanFlow => {
                        state.pending_menus.clear();
                        None
                    }
                    _ => None,
                }
            };

            match next {
                Some(next) => {
                    handle.timers().cancel(TimerKind::MenuWait);
                    context = next;
                }
                None => return Ok(()),
            }
        }
    }

    /// Ask the reasoning service, falling back to the heuristic
    pub async fn decide(&self, context: &DecisionContext) -> (Decision, DecisionSource) {
        let started = Instant::now();
        let request = self.reasoner.request_decision(context);

        match tokio::time::timeout(self.timing.decision_timeout(), request).await {
            Ok(Ok(mut decision)) if Self::is_usable(&decision, context) => {
                decision.confidence = decision.confidence.clamp(0.0, 1.0);
                tracing::debug!(
                    call_id = %context.call_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Reasoning decision received"
                );
                return (decision, DecisionSource::Reasoning);
            }
            Ok(Ok(decision)) => {
                tracing::warn!(
                    call_id = %context.call_id,
                    option = %decision.selected_option,
                    "Reasoning chose an option that is not on the menu"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(call_id = %context.call_id, "Reasoning failed: {}", e);
            }
            Err(_) => {
                tracing::warn!(
                    call_id = %context.call_id,
                    timeout_ms = self.timing.decision_timeout_ms,
                    "Reasoning timed out"
                );
            }
        }

        (Self::heuristic(context), DecisionSource::Heuristic)
    }

    fn heuristic(context: &DecisionContext) -> Decision {
        HeuristicScorer::decide(context).unwrap_or_else(|| Decision {
            selected_option: String::new(),
            reasoning: "No options to choose from".to_string(),
            response: String::new(),
            confidence: 0.0,
            next_action: NextAction::Wait,
        })
    }

    fn is_usable(decision: &Decision, context: &DecisionContext) -> bool {
        match decision.next_action {
            NextAction::PressKey => context.has_key(decision.selected_option.trim()),
            _ => true,
        }
    }

    fn context_for(state: &CallSession, menu: &DetectedMenu) -> DecisionContext {
        DecisionContext::from_menu(
            menu,
            &state.goal,
            state.org_name.as_deref(),
            state.target_person.as_deref(),
            &state.action_history,
        )
    }

    /// Handle an expired menu-wait timer
    ///
    /// Stale generations and calls that are no longer listening are ignored.
    /// Below `max_wait_timeouts` the call keeps listening with a fresh wait; at
    /// the limit it is abandoned.
    pub async fn on_wait_timeout(&self, call_id: &str, generation: u64) -> Result<(), AgentError> {
        let Some(handle) = self.sessions.get(call_id) else {
            tracing::debug!(call_id = %call_id, "Wait timeout for ended call");
            return Ok(());
        };

        let (attempts, abandon) = {
            let mut state = handle.lock();
            if state.armed_wait != Some(generation) {
                tracing::debug!(call_id = %call_id, generation, "Ignoring stale wait timeout");
                return Ok(());
            }
            state.armed_wait = None;
            if state.phase != CallPhase::Listening {
                tracing::debug!(call_id = %call_id, phase = state.phase.as_str(), "Wait timeout outside listening");
                return Ok(());
            }

            state.wait_timeouts += 1;
            let attempts = state.wait_timeouts;
            let abandon = attempts >= self.timing.max_wait_timeouts;
            if abandon {
                state.record(format!("Gave up after {} silent waits", attempts));
            } else {
                state.record("Wait timed out");
            }
            (attempts, abandon)
        };

        tracing::info!(call_id = %call_id, attempts, "Menu wait timed out");
        let _ = self.event_tx.send(AgentEvent::WaitTimedOut {
            call_id: call_id.to_string(),
            attempts,
        });

        if abandon {
            self.executor
                .hang_up_after(call_id, "", Duration::ZERO, "no menu after repeated waits")
                .await?;
        } else {
            // keep listening; silence keeps counting toward abandonment
            self.executor.arm_wait(&handle);
        }

        Ok(())
    }

    /// Leave a message (when enabled) and hang up; first detection only
    pub async fn on_voicemail_detected(&self, call_id: &str) -> Result<(), AgentError> {
        let Some(handle) = self.sessions.get(call_id) else {
            tracing::warn!(call_id = %call_id, "Voicemail detected for unknown call");
            return Ok(());
        };

        let session = {
            let mut state = handle.lock();
            if state.voicemail_handled || matches!(state.phase, CallPhase::Closed | CallPhase::HumanFlow) {
                return Ok(());
            }
            state.voicemail_handled = true;
            state.phase = CallPhase::Acting;
            state.armed_wait = None;
            state.pending_menus.clear();
            state.record("Reached voicemail");
            state.clone()
        };
        handle.timers().cancel(TimerKind::MenuWait);

        tracing::info!(call_id = %call_id, "Voicemail reached");
        let _ = self.event_tx.send(AgentEvent::VoicemailDetected {
            call_id: call_id.to_string(),
        });

        if self.voicemail.leave_message {
            let message = script::render(
                &self.voicemail.message_template,
                &session.goal,
                session.org_name.as_deref(),
                session.target_person.as_deref(),
                &self.default_target,
            );
            handle.lock().record("Left voicemail message");
            self.executor
                .hang_up_after(call_id, &message, self.voicemail.delivery_delay(), "voicemail message left")
                .await
        } else {
            self.executor
                .hang_up_after(call_id, "", Duration::ZERO, "voicemail reached")
                .await
        }
    }

    /// Stop menu navigation for a call that reached a live person
    pub fn enter_human_flow(&self, call_id: &str) -> bool {
        let Some(handle) = self.sessions.get(call_id) else {
            return false;
        };

        {
            let mut state = handle.lock();
            match state.phase {
                CallPhase::Closed => return false,
                CallPhase::HumanFlow => return true,
                _ => {}
            }
            state.phase = CallPhase::HumanFlow;
            state.armed_wait = None;
            state.pending_menus.clear();
            state.record("Reached a live person");
        }
        handle.timers().cancel(TimerKind::MenuWait);

        tracing::info!(call_id = %call_id, "Switching to human conversation");
        true
    }

    /// Resume menu navigation after a greeting turned out to be automated
    pub fn leave_human_flow(&self, call_id: &str) -> bool {
        let Some(handle) = self.sessions.get(call_id) else {
            return false;
        };

        let mut state = handle.lock();
        if state.phase != CallPhase::HumanFlow {
            return false;
        }
        state.phase = CallPhase::Listening;
        state.record("Automated system still on the line");
        tracing::info!(call_id = %call_id, "Back to menu navigation");
        true
    }

    /// Cancel the pending menu wait after fresh speech on the line
    pub fn note_activity(&self, call_id: &str) {
        if self.executor.cancel_wait(call_id) {
            tracing::debug!(call_id = %call_id, "Menu wait cancelled by new speech");
        }
    }

    /// Tear the call down and request a best-effort summary
    ///
    /// Teardown is synchronous; the summary runs in the background and never
    /// touches the removed session.
    pub fn handle_call_completed(&self, call_id: &str) -> Option<Duration> {
        let Some(handle) = self.sessions.remove(call_id) else {
            tracing::debug!(call_id = %call_id, "Call already torn down");
            return None;
        };

        handle.close();
        let duration = handle.elapsed();
        let session = handle.snapshot();

        tracing::info!(
            call_id = %call_id,
            duration_secs = duration.as_secs(),
            actions = session.action_history.len(),
            "Call session ended"
        );
        let _ = self.event_tx.send(AgentEvent::SessionEnded {
            call_id: call_id.to_string(),
            duration_secs: duration.as_secs(),
        });

        if self.summaries_enabled {
            self.spawn_summary(CallSummaryContext {
                call_id: session.call_id,
                goal: session.goal,
                org_name: session.org_name,
                duration_secs: duration.as_secs(),
                action_history: session.action_history,
            });
        }

        Some(duration)
    }

    fn spawn_summary(&self, context: CallSummaryContext) {
        let reasoner = Arc::clone(&self.reasoner);
        let event_tx = self.event_tx.clone();
        let timeout = self.timing.summary_timeout();

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, reasoner.summarize_call(&context)).await {
                Ok(Ok(summary)) => {
                    tracing::info!(call_id = %context.call_id, "Call summary: {}", summary);
                    let _ = event_tx.send(AgentEvent::CallSummary {
                        call_id: context.call_id,
                        duration_secs: context.duration_secs,
                        summary,
                    });
                }
                Ok(Err(e)) => {
                    tracing::debug!(call_id = %context.call_id, "Call summary unavailable: {}", e);
                }
                Err(_) => {
                    tracing::debug!(call_id = %context.call_id, "Call summary timed out");
                }
            }
        });
    }

    /// Copy of a call's session state
    pub fn session(&self, call_id: &str) -> Option<CallSession> {
        self.sessions.get(call_id).map(|handle| handle.snapshot())
    }

    pub fn phase(&self, call_id: &str) -> Option<CallPhase> {
        self.sessions.get(call_id).map(|handle| handle.phase())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.count()
    }
}
