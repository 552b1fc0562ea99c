//! Call sessions and the timers they own
//!
//! A `CallSessionHandle` is the unit of isolation for one call: its state sits
//! behind a short-lived lock and every timer spawned for the call is tracked
//! here, so tearing the call down aborts them all.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use tokio::task::AbortHandle;

use ivr_agent_core::{DetectedMenu, SessionRegistry, SessionStore};

/// Registry of live call sessions
pub type CallSessions = SessionRegistry<CallSessionHandle>;

/// Where a call is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallPhase {
    /// Waiting for the next transcript
    Listening,
    /// A navigation decision is in flight
    Deciding,
    /// A decision is being carried out
    Acting,
    /// A live human answered; menus are no longer classified
    HumanFlow,
    /// The call is being ended
    Closed,
}

impl CallPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallPhase::Listening => "listening",
            CallPhase::Deciding => "deciding",
            CallPhase::Acting => "acting",
            CallPhase::HumanFlow => "human_flow",
            CallPhase::Closed => "closed",
        }
    }

    /// Can a detected menu still be acted upon?
    pub fn accepts_menus(&self) -> bool {
        matches!(self, CallPhase::Listening | CallPhase::Deciding | CallPhase::Acting)
    }
}

/// Conversation state for one call
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: String,
    pub phone_number: String,
    /// Navigation goal, e.g. "reach the HR department"
    pub goal: String,
    pub org_name: Option<String>,
    pub target_person: Option<String>,
    pub phase: CallPhase,
    /// Actions taken so far, oldest first
    pub action_history: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Menus heard while a decision was in flight
    pub pending_menus: VecDeque<DetectedMenu>,
    /// Last wait-timer generation handed out
    pub wait_generation: u64,
    /// Generation of the currently armed wait timer
    pub armed_wait: Option<u64>,
    /// Consecutive wait timeouts
    pub wait_timeouts: u32,
    pub voicemail_handled: bool,
}

impl CallSession {
    pub fn new(
        call_id: impl Into<String>,
        phone_number: impl Into<String>,
        goal: impl Into<String>,
        org_name: Option<String>,
        target_person: Option<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            phone_number: phone_number.into(),
            goal: goal.into(),
            org_name,
            target_person,
            phase: CallPhase::Listening,
            action_history: Vec::new(),
            created_at: Utc::now(),
            pending_menus: VecDeque::new(),
            wait_generation: 0,
            armed_wait: None,
            wait_timeouts: 0,
            voicemail_handled: false,
        }
    }

    pub fn record(&mut self, entry: impl Into<String>) {
        self.action_history.push(entry.into());
    }

    /// Hand out a fresh wait generation and mark it armed
    pub fn arm_wait(&mut self) -> u64 {
        self.wait_generation += 1;
        self.armed_wait = Some(self.wait_generation);
        self.wait_generation
    }

    /// Forget the armed wait; returns true if one was armed
    pub fn disarm_wait(&mut self) -> bool {
        self.armed_wait.take().is_some()
    }
}

/// What a timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// `wait` decision expiring; at most one per call
    MenuWait,
    /// Closing remark playing before termination
    Hangup,
}

#[derive(Default)]
struct TimerSet {
    handles: Vec<(TimerKind, AbortHandle)>,
    closed: bool,
}

/// Timers spawned on behalf of one call
#[derive(Default)]
pub struct CallTimers {
    inner: Mutex<TimerSet>,
}

impl CallTimers {
    /// Track a spawned timer; aborted at once if the call is already closed
    pub fn track(&self, kind: TimerKind, handle: AbortHandle) {
        let mut set = self.inner.lock();
        if set.closed {
            handle.abort();
            return;
        }
        if kind == TimerKind::MenuWait {
            set.handles.retain(|(k, h)| {
                if *k == TimerKind::MenuWait {
                    h.abort();
                    false
                } else {
                    true
                }
            });
        }
        set.handles.push((kind, handle));
    }

    /// Abort every timer of `kind`
    pub fn cancel(&self, kind: TimerKind) -> usize {
        let mut set = self.inner.lock();
        let before = set.handles.len();
        set.handles.retain(|(k, h)| {
            if *k == kind {
                h.abort();
                false
            } else {
                true
            }
        });
        before - set.handles.len()
    }

    /// Abort everything and refuse new timers
    pub fn cancel_all(&self) -> usize {
        let mut set = self.inner.lock();
        set.closed = true;
        let count = set.handles.len();
        for (_, handle) in set.handles.drain(..) {
            handle.abort();
        }
        count
    }

    /// Number of tracked timers of `kind`
    pub fn tracked(&self, kind: TimerKind) -> usize {
        self.inner.lock().handles.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

/// Shared handle to one call session
pub struct CallSessionHandle {
    call_id: String,
    state: Mutex<CallSession>,
    timers: CallTimers,
    started: Instant,
}

impl CallSessionHandle {
    pub fn new(session: CallSession) -> Self {
        Self {
            call_id: session.call_id.clone(),
            state: Mutex::new(session),
            timers: CallTimers::default(),
            started: Instant::now(),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Lock the session state; never hold the guard across an await
    pub fn lock(&self) -> MutexGuard<'_, CallSession> {
        self.state.lock()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> CallSession {
        self.state.lock().clone()
    }

    pub fn phase(&self) -> CallPhase {
        self.state.lock().phase
    }

    pub fn set_phase(&self, phase: CallPhase) {
        self.state.lock().phase = phase;
    }

    pub fn timers(&self) -> &CallTimers {
        &self.timers
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Abort all timers and mark the call closed
    pub fn close(&self) {
        let aborted = self.timers.cancel_all();
        let mut state = self.state.lock();
        state.phase = CallPhase::Closed;
        state.armed_wait = None;
        state.pending_menus.clear();
        tracing::debug!(call_id = %self.call_id, aborted, "Call session closed");
    }

    /// Run `task` after `delay` if this session is still registered then
    ///
    /// The task is tracked under `kind` and aborted when the session closes.
    pub fn spawn_timer<F>(
        self: &Arc<Self>,
        sessions: &Arc<CallSessions>,
        kind: TimerKind,
        delay: Duration,
        task: F,
    ) where
        F: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        let sessions = Arc::clone(sessions);
        let call_id = self.call_id.clone();

        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let current = weak
                .upgrade()
                .map(|handle| is_current(&sessions, &call_id, &handle))
                .unwrap_or(false);
            if !current {
                tracing::debug!(call_id = %call_id, ?kind, "Ignoring timer for ended call");
                return;
            }

            task.await;
        });

        self.timers.track(kind, join.abort_handle());
    }
}

/// Is `handle` still the registered session for `call_id`?
pub fn is_current(sessions: &CallSessions, call_id: &str, handle: &Arc<CallSessionHandle>) -> bool {
    sessions
        .get(call_id)
        .map(|registered| Arc::ptr_eq(&registered, handle))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registered(call_id: &str) -> (Arc<CallSessions>, Arc<CallSessionHandle>) {
        let sessions = Arc::new(CallSessions::new());
        let handle = Arc::new(CallSessionHandle::new(CallSession::new(
            call_id,
            "+15550100",
            "reach HR",
            None,
            None,
        )));
        sessions.put(call_id, Arc::clone(&handle)).unwrap();
        (sessions, handle)
    }

    #[test]
    fn test_wait_generations() {
        let mut session = CallSession::new("c1", "+1", "goal", None, None);
        assert_eq!(session.arm_wait(), 1);
        assert_eq!(session.arm_wait(), 2);
        assert_eq!(session.armed_wait, Some(2));
        assert!(session.disarm_wait());
        assert!(!session.disarm_wait());
    }

    #[tokio::test]
    async fn test_timer_fires_for_current_session() {
        let (sessions, handle) = registered("c1");
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle.spawn_timer(&sessions, TimerKind::Hangup, Duration::from_millis(10), async move {
            let _ = tx.send("fired");
        });

        let fired = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert_eq!(fired.unwrap(), Some("fired"));
    }

    #[tokio::test]
    async fn test_close_aborts_timers() {
        let (sessions, handle) = registered("c1");
        let (tx, mut rx) = mpsc::unbounded_channel::<&str>();

        let tx2 = tx.clone();
        handle.spawn_timer(&sessions, TimerKind::Hangup, Duration::from_millis(20), async move {
            let _ = tx2.send("hangup");
        });
        handle.spawn_timer(&sessions, TimerKind::MenuWait, Duration::from_millis(20), async move {
            let _ = tx.send("wait");
        });

        sessions.remove("c1");
        handle.close();
        assert!(handle.timers().is_closed());
        assert_eq!(handle.phase(), CallPhase::Closed);

        // all senders are dropped with the aborted tasks
        let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replaced_session_ignores_old_timer() {
        let (sessions, old) = registered("c1");
        let (tx, mut rx) = mpsc::unbounded_channel::<&str>();

        old.spawn_timer(&sessions, TimerKind::Hangup, Duration::from_millis(20), async move {
            let _ = tx.send("stale");
        });

        // Same call id, new session, old one never closed
        sessions.remove("c1");
        let fresh = Arc::new(CallSessionHandle::new(CallSession::new("c1", "+1", "goal", None, None)));
        sessions.put("c1", fresh).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn test_single_menu_wait_timer() {
        let (sessions, handle) = registered("c1");

        for _ in 0..3 {
            handle.spawn_timer(&sessions, TimerKind::MenuWait, Duration::from_secs(60), async {});
        }
        handle.spawn_timer(&sessions, TimerKind::Hangup, Duration::from_secs(60), async {});

        assert_eq!(handle.timers().tracked(TimerKind::MenuWait), 1);
        assert_eq!(handle.timers().cancel(TimerKind::MenuWait), 1);
        assert_eq!(handle.timers().tracked(TimerKind::Hangup), 1);
        handle.close();
    }
}
