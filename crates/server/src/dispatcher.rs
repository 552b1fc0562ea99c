//! Per-call dispatcher
//!
//! Each call gets a worker task fed by its own channel, so events for one
//! call are handled strictly in arrival order while calls run independently.
//! `call.ended` bypasses the queue: the worker is aborted and everything held
//! for the call is torn down before `dispatch` returns.

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use ivr_agent_agent::CallAgent;
use ivr_agent_core::{CallSignal, InboundEvent, TranscriptEvent};

use crate::ServerError;

/// Work items for a call's worker
#[derive(Debug)]
enum CallWork {
    Transcript(TranscriptEvent),
    Signal(CallSignal),
}

struct Worker {
    tx: mpsc::UnboundedSender<CallWork>,
    task: AbortHandle,
}

/// Routes inbound events to per-call workers
pub struct CallDispatcher {
    agent: Arc<CallAgent>,
    workers: RwLock<HashMap<String, Worker>>,
}

impl CallDispatcher {
    /// Create the dispatcher and start routing timer signals
    pub fn start(agent: Arc<CallAgent>, mut signals: mpsc::UnboundedReceiver<CallSignal>) -> Arc<Self> {
        let dispatcher = Arc::new(Self {
            agent,
            workers: RwLock::new(HashMap::new()),
        });

        let weak = Arc::downgrade(&dispatcher);
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let Some(dispatcher) = weak.upgrade() else {
                    break;
                };
                let call_id = signal.call_id().to_string();
                dispatcher.route(&call_id, CallWork::Signal(signal));
            }
            tracing::debug!("Signal routing stopped");
        });

        dispatcher
    }

    /// Handle one inbound event
    pub fn dispatch(&self, event: InboundEvent) -> Result<(), ServerError> {
        match event {
            InboundEvent::CallStarted {
                call_id,
                phone_number,
                goal,
                org_name,
                target_person,
            } => {
                self.agent
                    .start_call(&call_id, &phone_number, &goal, org_name, target_person)?;
                self.spawn_worker(call_id);
                Ok(())
            }
            InboundEvent::TranscriptFinal {
                call_id,
                text,
                confidence,
                timestamp,
            } => {
                let transcript = TranscriptEvent::final_result(call_id.clone(), text, confidence).at(timestamp);
                self.route(&call_id, CallWork::Transcript(transcript));
                Ok(())
            }
            InboundEvent::TranscriptInterim { call_id, .. } => {
                tracing::trace!(call_id = %call_id, "Interim transcript ignored");
                Ok(())
            }
            InboundEvent::CallEnded { call_id } => {
                self.end_call(&call_id);
                Ok(())
            }
        }
    }

    /// Dispatch events until the channel closes
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<InboundEvent>) {
        while let Some(event) = inbound.recv().await {
            let call_id = event.call_id().to_string();
            if let Err(e) = self.dispatch(event) {
                tracing::warn!(call_id = %call_id, "Failed to dispatch event: {}", e);
            }
        }
        tracing::info!("Inbound event stream closed");
    }

    fn spawn_worker(&self, call_id: String) {
        let (tx, mut rx) = mpsc::unbounded_channel::<CallWork>();
        let agent = Arc::clone(&self.agent);
        let worker_call_id = call_id.clone();

        let task = tokio::spawn(async move {
            while let Some(work) = rx.recv().await {
                let result = match work {
                    CallWork::Transcript(transcript) => agent.handle_transcript(&transcript).await,
                    CallWork::Signal(signal) => agent.handle_signal(signal).await,
                };
                if let Err(e) = result {
                    tracing::warn!(call_id = %worker_call_id, "Call event failed: {}", e);
                }
            }
            tracing::debug!(call_id = %worker_call_id, "Call worker stopped");
        });

        let previous = self.workers.write().insert(
            call_id,
            Worker {
                tx,
                task: task.abort_handle(),
            },
        );
        if let Some(previous) = previous {
            previous.task.abort();
        }
    }

    fn route(&self, call_id: &str, work: CallWork) {
        let workers = self.workers.read();
        match workers.get(call_id) {
            Some(worker) => {
                if worker.tx.send(work).is_err() {
                    tracing::debug!(call_id = %call_id, "Call worker already stopped");
                }
            }
            None => tracing::debug!(call_id = %call_id, "Event for unknown call dropped"),
        }
    }

    fn end_call(&self, call_id: &str) {
        if let Some(worker) = self.workers.write().remove(call_id) {
            worker.task.abort();
        }

        match self.agent.end_call(call_id) {
            Some(duration) => {
                tracing::info!(call_id = %call_id, duration_secs = duration.as_secs(), "Call ended")
            }
            None => tracing::debug!(call_id = %call_id, "End of unknown call"),
        }
    }

    /// End every live call
    pub fn shutdown(&self) {
        let call_ids: Vec<String> = self.workers.read().keys().cloned().collect();
        for call_id in call_ids {
            self.end_call(&call_id);
        }
    }

    /// Number of calls with a running worker
    pub fn active_calls(&self) -> usize {
        self.workers.read().len()
    }

    pub fn agent(&self) -> &Arc<CallAgent> {
        &self.agent
    }
}
