//! Action Executor
//!
//! Turns a navigation decision into the minimal sequence of outbound
//! commands for its call. An announced key press holds the call in `acting`
//! until its tone is out, so a later decision can never overtake it. The
//! closing remark before termination and the menu wait run on timers owned by
//! the call session.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use ivr_agent_config::TimingConfig;
use ivr_agent_core::{
    AgentEvent, CallSignal, CommandSink, Decision, NextAction, OutboundCommand, PlaybackRequest,
    Priority, SessionStore,
};
use ivr_agent_pipeline::PlaybackQueue;

use crate::session::{is_current, CallPhase, CallSessionHandle, CallSessions, TimerKind};
use crate::AgentError;

/// Executes decisions for every live call
pub struct ActionExecutor {
    sessions: Arc<CallSessions>,
    playback: Arc<PlaybackQueue>,
    commands: Arc<dyn CommandSink>,
    signals: mpsc::UnboundedSender<CallSignal>,
    event_tx: broadcast::Sender<AgentEvent>,
    timing: TimingConfig,
    voice: Option<String>,
}

impl ActionExecutor {
    pub fn new(
        sessions: Arc<CallSessions>,
        playback: Arc<PlaybackQueue>,
        commands: Arc<dyn CommandSink>,
        signals: mpsc::UnboundedSender<CallSignal>,
        event_tx: broadcast::Sender<AgentEvent>,
        timing: TimingConfig,
        voice: Option<String>,
    ) -> Self {
        Self {
            sessions,
            playback,
            commands,
            signals,
            event_tx,
            timing,
            voice,
        }
    }

    /// Carry out `decision` on `call_id`
    pub async fn execute(&self, call_id: &str, decision: &Decision) -> Result<(), AgentError> {
        let handle = self
            .sessions
            .get(call_id)
            .ok_or_else(|| AgentError::UnknownCall(call_id.to_string()))?;

        match &decision.next_action {
            NextAction::PressKey => {
                if !self.press_key(&handle, decision).await? {
                    return Ok(());
                }
            }
            NextAction::Speak => self.speak(&handle, decision),
            NextAction::Wait => self.wait(&handle, decision),
            NextAction::Hangup => {
                self.hang_up_after(
                    call_id,
                    &decision.response,
                    self.timing.hangup_delay(),
                    &decision.reasoning,
                )
                .await?
            }
            NextAction::Unknown(name) => {
                tracing::warn!(call_id = %call_id, action = %name, "Ignoring unknown action");
                resume_listening(&handle);
                return Ok(());
            }
        }

        let _ = self.event_tx.send(AgentEvent::NavigationCompleted {
            call_id: call_id.to_string(),
            action: decision.next_action.clone(),
            selected_option: decision.selected_option.clone(),
        });

        Ok(())
    }

    /// Returns false when the call moved on before the tone went out
    async fn press_key(&self, handle: &Arc<CallSessionHandle>, decision: &Decision) -> Result<bool, AgentError> {
        let call_id = handle.call_id();
        let key = decision.selected_option.trim();
        if key.is_empty() {
            return Err(AgentError::Command("press_key decision without a key".to_string()));
        }

        let tone = OutboundCommand::SendTone {
            call_id: call_id.to_string(),
            digits: key.to_string(),
            reasoning: decision.reasoning.clone(),
        };

        if decision.response.trim().is_empty() {
            tracing::info!(call_id = %call_id, key = %key, "Pressing key");
            self.commands.send(tone).await?;
        } else {
            tracing::info!(call_id = %call_id, key = %key, "Announcing, then pressing key");
            self.say(call_id, &decision.response, Priority::High);

            // the settle delay is only cut short by teardown
            tokio::time::sleep(self.timing.press_settle()).await;

            let still_acting = is_current(&self.sessions, call_id, handle) && handle.phase() == CallPhase::Acting;
            if !still_acting {
                tracing::debug!(call_id = %call_id, key = %key, "Call moved on before the tone; not sent");
                return Ok(false);
            }
            self.commands.send(tone).await?;
        }

        resume_listening(handle);
        Ok(true)
    }

    fn speak(&self, handle: &Arc<CallSessionHandle>, decision: &Decision) {
        if decision.response.trim().is_empty() {
            tracing::debug!(call_id = %handle.call_id(), "Speak decision with nothing to say");
        } else {
            self.say(handle.call_id(), &decision.response, Priority::Medium);
        }
        resume_listening(handle);
    }

    fn wait(&self, handle: &Arc<CallSessionHandle>, decision: &Decision) {
        if !decision.response.trim().is_empty() {
            self.say(handle.call_id(), &decision.response, Priority::Medium);
        }
        resume_listening(handle);
        self.arm_wait(handle);
    }

    /// Listen for the menu to continue, raising a wait-timeout signal if it
    /// stays silent; replaces any wait already armed
    ///
    /// Only a listening call can wait.
    pub fn arm_wait(&self, handle: &Arc<CallSessionHandle>) {
        let call_id = handle.call_id().to_string();

        let generation = {
            let mut state = handle.lock();
            if state.phase != CallPhase::Listening {
                return;
            }
            state.arm_wait()
        };

        tracing::debug!(call_id = %call_id, generation, "Waiting for the menu to continue");

        let signals = self.signals.clone();
        handle.spawn_timer(&self.sessions, TimerKind::MenuWait, self.timing.menu_wait_timeout(), async move {
            let _ = signals.send(CallSignal::WaitTimedOut { call_id, generation });
        });
    }

    /// End the call, speaking `response` first when it is not empty
    ///
    /// With a response the call is terminated `delay` later; without one it
    /// is terminated at once.
    pub async fn hang_up_after(
        &self,
        call_id: &str,
        response: &str,
        delay: Duration,
        reason: &str,
    ) -> Result<(), AgentError> {
        let handle = self
            .sessions
            .get(call_id)
            .ok_or_else(|| AgentError::UnknownCall(call_id.to_string()))?;

        {
            let mut state = handle.lock();
            state.phase = CallPhase::Closed;
            state.armed_wait = None;
            state.pending_menus.clear();
        }
        handle.timers().cancel(TimerKind::MenuWait);

        let terminate = OutboundCommand::Terminate {
            call_id: call_id.to_string(),
            reason: reason.to_string(),
        };

        if response.trim().is_empty() {
            tracing::info!(call_id = %call_id, reason = %reason, "Terminating call");
            self.commands.send(terminate).await?;
        } else {
            tracing::info!(call_id = %call_id, reason = %reason, "Closing remark, then terminating call");
            self.say(call_id, response, Priority::High);

            let commands = Arc::clone(&self.commands);
            handle.spawn_timer(&self.sessions, TimerKind::Hangup, delay, async move {
                let call_id = terminate.call_id().to_string();
                if let Err(e) = commands.send(terminate).await {
                    tracing::warn!(call_id = %call_id, "Failed to terminate call: {}", e);
                }
            });
        }

        Ok(())
    }

    /// Cancel the armed menu-wait timer, if any
    pub fn cancel_wait(&self, call_id: &str) -> bool {
        match self.sessions.get(call_id) {
            Some(handle) => {
                let was_armed = handle.lock().disarm_wait();
                handle.timers().cancel(TimerKind::MenuWait);
                was_armed
            }
            None => false,
        }
    }

    /// Queue speech on the call's playback line
    pub fn say(&self, call_id: &str, text: &str, priority: Priority) -> bool {
        let request = PlaybackRequest::new(call_id, text, priority).with_voice(self.voice.clone());
        self.playback.enqueue(request)
    }
}

/// Back to listening unless the call moved on in the meantime
fn resume_listening(handle: &CallSessionHandle) {
    let mut state = handle.lock();
    if matches!(state.phase, CallPhase::Deciding | CallPhase::Acting) {
        state.phase = CallPhase::Listening;
    }
}
