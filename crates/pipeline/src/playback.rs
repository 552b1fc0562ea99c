//! Playback Queue
//!
//! Ensures only one utterance plays on a call at a time. Requests are
//! consumed FIFO except that `High` priority requests are inserted at the
//! front. A line is opened when the call starts and discarded when it ends;
//! requests for unknown lines are dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use parking_lot::Mutex;

use ivr_agent_core::{
    CommandSink, OutboundCommand, PlaybackRequest, Priority, SessionRegistry, SessionStore,
};

use crate::PipelineError;

/// Queue state for one call
#[derive(Debug, Default)]
struct LineState {
    pending: VecDeque<PlaybackRequest>,
    current: Option<PlaybackRequest>,
    in_flight: bool,
    closed: bool,
}

impl LineState {
    fn push(&mut self, request: PlaybackRequest) {
        if request.priority == Priority::High {
            self.pending.push_front(request);
        } else {
            self.pending.push_back(request);
        }
    }
}

/// Playback line for one call
#[derive(Debug, Default)]
pub struct Line {
    state: Mutex<LineState>,
}

/// Point-in-time view of a line
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub playing: Option<PlaybackRequest>,
    pub pending: Vec<PlaybackRequest>,
}

/// Per-call playback queues
pub struct PlaybackQueue {
    lines: SessionRegistry<Line>,
    commands: Arc<dyn CommandSink>,
}

impl PlaybackQueue {
    pub fn new(commands: Arc<dyn CommandSink>) -> Self {
        Self {
            lines: SessionRegistry::new(),
            commands,
        }
    }

    /// Open the line for a call
    pub fn open(&self, call_id: &str) -> Result<(), PipelineError> {
        self.lines
            .put(call_id, Arc::new(Line::default()))
            .map_err(|_| PipelineError::LineExists(call_id.to_string()))
    }

    /// Queue a request; starts draining if the line is idle
    ///
    /// Returns false when the call has no open line.
    pub fn enqueue(self: &Arc<Self>, request: PlaybackRequest) -> bool {
        let call_id = request.call_id.clone();
        let Some(line) = self.lines.get(&call_id) else {
            tracing::debug!(call_id = %call_id, "Dropping playback for closed line");
            return false;
        };

        let start_drain = {
            let mut state = line.state.lock();
            if state.closed {
                return false;
            }
            tracing::debug!(
                call_id = %call_id,
                priority = request.priority.as_str(),
                queued = state.pending.len(),
                "Queued playback"
            );
            state.push(request);
            if state.in_flight {
                false
            } else {
                state.in_flight = true;
                true
            }
        };

        if start_drain {
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                queue.drain(&call_id, line).await;
            });
        }

        true
    }

    /// Play queued requests one at a time until the line is empty or closed
    async fn drain(&self, call_id: &str, line: Arc<Line>) {
        loop {
            let next = {
                let mut state = line.state.lock();
                state.current = None;
                if state.closed {
                    state.in_flight = false;
                    return;
                }
                match state.pending.pop_front() {
                    Some(request) => {
                        state.current = Some(request.clone());
                        request
                    }
                    None => {
                        state.in_flight = false;
                        return;
                    }
                }
            };

            let command = OutboundCommand::SynthesizeAndPlay {
                call_id: next.call_id.clone(),
                text: next.text.clone(),
                voice: next.voice.clone(),
                priority: next.priority,
            };

            if let Err(e) = self.commands.send(command).await {
                tracing::warn!(call_id = %call_id, "Playback failed: {}", e);
            }
        }
    }

    /// Clear pending requests without touching the one in flight
    pub fn interrupt(&self, call_id: &str) -> usize {
        match self.lines.get(call_id) {
            Some(line) => {
                let mut state = line.state.lock();
                let cleared = state.pending.len();
                state.pending.clear();
                if cleared > 0 {
                    tracing::debug!(call_id = %call_id, cleared, "Playback interrupted");
                }
                cleared
            }
            None => 0,
        }
    }

    /// Drop the line and everything queued on it
    pub fn discard(&self, call_id: &str) {
        if let Some(line) = self.lines.remove(call_id) {
            let mut state = line.state.lock();
            state.closed = true;
            state.pending.clear();
            state.current = None;
            tracing::debug!(call_id = %call_id, "Playback line discarded");
        }
    }

    pub fn is_open(&self, call_id: &str) -> bool {
        self.lines.contains(call_id)
    }

    /// Is something playing on this call?
    pub fn is_playing(&self, call_id: &str) -> bool {
        self.lines
            .get(call_id)
            .map(|line| line.state.lock().in_flight)
            .unwrap_or(false)
    }

    pub fn snapshot(&self, call_id: &str) -> Option<PlaybackSnapshot> {
        self.lines.get(call_id).map(|line| {
            let state = line.state.lock();
            PlaybackSnapshot {
                playing: state.current.clone(),
                pending: state.pending.iter().cloned().collect(),
            }
        })
    }

    /// Number of open lines
    pub fn line_count(&self) -> usize {
        self.lines.count()
    }
}
