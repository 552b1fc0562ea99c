//! Decision engine behavior driven through the call agent

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use ivr_agent_agent::{CallAgent, CallPhase};
use ivr_agent_config::Settings;
use ivr_agent_core::{
    AgentEvent, CallSignal, CallSummaryContext, ChannelCommandSink, Decision, DecisionContext,
    DecisionSource, NextAction, OutboundCommand, Priority, TranscriptEvent,
};
use ivr_agent_llm::{DisabledReasoner, LlmError, ReasoningService};

const MENU: &str = "For sales, press 1. For support, press 2. For billing, press 3.";

/// Answers every request with the same decision after an optional delay
struct ScriptedReasoner {
    decision: Decision,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedReasoner {
    fn new(decision: Decision) -> Self {
        Self {
            decision,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn request_decision(&self, _context: &DecisionContext) -> Result<Decision, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.decision.clone())
    }

    async fn summarize_call(&self, context: &CallSummaryContext) -> Result<String, LlmError> {
        Ok(format!("{} actions toward '{}'", context.action_history.len(), context.goal))
    }
}

struct Harness {
    agent: Arc<CallAgent>,
    commands: mpsc::UnboundedReceiver<OutboundCommand>,
    signals: mpsc::UnboundedReceiver<CallSignal>,
    events: broadcast::Receiver<AgentEvent>,
}

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.timing.decision_timeout_ms = 100;
    settings.timing.press_settle_ms = 20;
    settings.timing.hangup_delay_ms = 20;
    settings.timing.menu_wait_timeout_ms = 40;
    settings.timing.greeting_delay_ms = 20;
    settings.timing.summary_timeout_ms = 200;
    settings.timing.max_wait_timeouts = 2;
    settings.voicemail.delivery_delay_ms = 30;
    settings
}

fn harness(settings: Settings, reasoner: Arc<dyn ReasoningService>) -> Harness {
    let (sink, commands) = ChannelCommandSink::channel();
    let (agent, signals) = CallAgent::new(&settings, reasoner, Arc::new(sink));
    let events = agent.subscribe();
    Harness {
        agent,
        commands,
        signals,
        events,
    }
}

fn final_transcript(call_id: &str, text: &str) -> TranscriptEvent {
    TranscriptEvent::final_result(call_id, text, 0.95)
}

async fn next_command(h: &mut Harness) -> OutboundCommand {
    tokio::time::timeout(Duration::from_secs(2), h.commands.recv())
        .await
        .expect("command expected")
        .expect("command channel open")
}

async fn next_event<F>(h: &mut Harness, mut pred: F) -> AgentEvent
where
    F: FnMut(&AgentEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = h.events.recv().await.expect("event channel open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event expected")
}

#[tokio::test]
async fn heuristic_picks_support_when_reasoning_is_unavailable() {
    let mut h = harness(fast_settings(), Arc::new(DisabledReasoner::new("offline")));
    h.agent
        .start_call("c1", "+15550100", "technical support", None, None)
        .unwrap();

    h.agent.handle_transcript(&final_transcript("c1", MENU)).await.unwrap();

    match next_command(&mut h).await {
        OutboundCommand::SendTone { digits, .. } => assert_eq!(digits, "2"),
        other => panic!("unexpected command: {:?}", other),
    }

    let made = next_event(&mut h, |e| matches!(e, AgentEvent::DecisionMade { .. })).await;
    match made {
        AgentEvent::DecisionMade { source, selected_option, .. } => {
            assert_eq!(source, DecisionSource::Heuristic);
            assert_eq!(selected_option, "2");
        }
        _ => unreachable!(),
    }

    let session = h.agent.engine().session("c1").unwrap();
    assert_eq!(session.phase, CallPhase::Listening);
    assert_eq!(session.action_history.len(), 1);
    assert!(session.action_history[0].starts_with("Pressed 2"));
}

#[tokio::test]
async fn reasoning_decision_is_used_when_valid() {
    let reasoner = Arc::new(ScriptedReasoner::new(Decision::press("3", "billing handles invoices", 0.9)));
    let mut h = harness(fast_settings(), reasoner);
    h.agent.start_call("c1", "+1", "dispute an invoice", None, None).unwrap();

    h.agent.handle_transcript(&final_transcript("c1", MENU)).await.unwrap();

    match next_command(&mut h).await {
        OutboundCommand::SendTone { digits, reasoning, .. } => {
            assert_eq!(digits, "3");
            assert_eq!(reasoning, "billing handles invoices");
        }
        other => panic!("unexpected command: {:?}", other),
    }
    let made = next_event(&mut h, |e| matches!(e, AgentEvent::DecisionMade { .. })).await;
    assert!(matches!(made, AgentEvent::DecisionMade { source: DecisionSource::Reasoning, .. }));
}

#[tokio::test]
async fn off_menu_key_falls_back_to_heuristic() {
    let reasoner = Arc::new(ScriptedReasoner::new(Decision::press("9", "made up", 0.9)));
    let mut h = harness(fast_settings(), reasoner);
    h.agent.start_call("c1", "+1", "technical support", None, None).unwrap();

    h.agent.handle_transcript(&final_transcript("c1", MENU)).await.unwrap();

    match next_command(&mut h).await {
        OutboundCommand::SendTone { digits, .. } => assert_eq!(digits, "2"),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[tokio::test]
async fn slow_reasoning_times_out_to_heuristic() {
    let reasoner = Arc::new(
        ScriptedReasoner::new(Decision::press("1", "sales", 0.9)).with_delay(Duration::from_secs(5)),
    );
    let mut h = harness(fast_settings(), reasoner);
    h.agent.start_call("c1", "+1", "technical support", None, None).unwrap();

    let started = std::time::Instant::now();
    h.agent.handle_transcript(&final_transcript("c1", MENU)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    match next_command(&mut h).await {
        OutboundCommand::SendTone { digits, .. } => assert_eq!(digits, "2"),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[tokio::test]
async fn concurrent_menus_are_decided_one_at_a_time() {
    let reasoner = Arc::new(
        ScriptedReasoner::new(Decision::press("2", "support", 0.8)).with_delay(Duration::from_millis(30)),
    );
    let mut h = harness(fast_settings(), Arc::clone(&reasoner) as Arc<dyn ReasoningService>);
    h.agent.start_call("c1", "+1", "technical support", None, None).unwrap();

    let first = final_transcript("c1", MENU);
    let second = final_transcript("c1", "Press 2 for support. Press 3 for billing.");
    let (a, b) = tokio::join!(
        h.agent.handle_transcript(&first),
        h.agent.handle_transcript(&second)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 2);
    assert_eq!(reasoner.max_in_flight.load(Ordering::SeqCst), 1);

    for _ in 0..2 {
        assert!(matches!(next_command(&mut h).await, OutboundCommand::SendTone { .. }));
    }
    assert_eq!(h.agent.engine().session("c1").unwrap().action_history.len(), 2);
}

#[tokio::test]
async fn repeated_wait_timeouts_abandon_the_call() {
    let wait = Decision {
        selected_option: String::new(),
        reasoning: "menu is still playing".to_string(),
        response: String::new(),
        confidence: 0.7,
        next_action: NextAction::Wait,
    };
    let mut h = harness(fast_settings(), Arc::new(ScriptedReasoner::new(wait)));
    h.agent.start_call("c1", "+1", "reach HR", None, None).unwrap();
    h.agent.handle_transcript(&final_transcript("c1", MENU)).await.unwrap();

    for attempt in 1..=2u32 {
        let signal = tokio::time::timeout(Duration::from_secs(2), h.signals.recv())
            .await
            .unwrap()
            .unwrap();
        h.agent.handle_signal(signal).await.unwrap();

        let event = next_event(&mut h, |e| matches!(e, AgentEvent::WaitTimedOut { .. })).await;
        assert!(matches!(event, AgentEvent::WaitTimedOut { attempts, .. } if attempts == attempt));
    }

    match next_command(&mut h).await {
        OutboundCommand::Terminate { reason, .. } => assert!(reason.contains("repeated waits")),
        other => panic!("unexpected command: {:?}", other),
    }
    assert_eq!(h.agent.engine().phase("c1"), Some(CallPhase::Closed));
}

#[tokio::test]
async fn queued_menu_supersedes_an_armed_wait() {
    let wait = Decision {
        selected_option: String::new(),
        reasoning: "menu is still playing".to_string(),
        response: String::new(),
        confidence: 0.7,
        next_action: NextAction::Wait,
    };
    let reasoner = Arc::new(ScriptedReasoner::new(wait).with_delay(Duration::from_millis(60)));
    let mut h = harness(fast_settings(), Arc::clone(&reasoner) as Arc<dyn ReasoningService>);
    h.agent.start_call("c1", "+1", "reach HR", None, None).unwrap();

    let first = final_transcript("c1", MENU);
    let second = final_transcript("c1", "Press 2 for support. Press 3 for billing.");
    let (a, b) = tokio::join!(
        h.agent.handle_transcript(&first),
        h.agent.handle_transcript(&second)
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(reasoner.max_in_flight.load(Ordering::SeqCst), 1);

    // the first wait never fired; only the wait armed after the queued menu did
    let signal = tokio::time::timeout(Duration::from_secs(2), h.signals.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        signal,
        CallSignal::WaitTimedOut {
            call_id: "c1".to_string(),
            generation: 2
        }
    );

    let session = h.agent.engine().session("c1").unwrap();
    assert_eq!(session.phase, CallPhase::Listening);
    assert_eq!(session.wait_timeouts, 0);
}

#[tokio::test]
async fn stale_wait_generation_is_ignored() {
    let h = harness(fast_settings(), Arc::new(DisabledReasoner::new("offline")));
    h.agent.start_call("c1", "+1", "reach HR", None, None).unwrap();

    h.agent.engine().on_wait_timeout("c1", 42).await.unwrap();

    let session = h.agent.engine().session("c1").unwrap();
    assert_eq!(session.wait_timeouts, 0);
    assert!(session.action_history.is_empty());
    assert_eq!(session.phase, CallPhase::Listening);
}

#[tokio::test]
async fn voicemail_leaves_message_then_hangs_up() {
    let mut h = harness(fast_settings(), Arc::new(DisabledReasoner::new("offline")));
    h.agent
        .start_call(
            "c1",
            "+1",
            "reach HR about jobs",
            Some("Acme Clinic".to_string()),
            Some("Dana".to_string()),
        )
        .unwrap();

    h.agent
        .handle_transcript(&final_transcript("c1", "Please leave a message at the tone."))
        .await
        .unwrap();
    // a second greeting on the same call is not acted on again
    h.agent
        .handle_transcript(&final_transcript("c1", "Record your message after the beep."))
        .await
        .unwrap();

    match next_command(&mut h).await {
        OutboundCommand::SynthesizeAndPlay { text, priority, .. } => {
            assert_eq!(priority, Priority::High);
            assert!(text.contains("Dana"));
            assert!(text.contains("Acme Clinic"));
            assert!(text.contains("career opportunities"));
        }
        other => panic!("unexpected command: {:?}", other),
    }
    assert!(matches!(next_command(&mut h).await, OutboundCommand::Terminate { .. }));

    let nothing = tokio::time::timeout(Duration::from_millis(100), h.commands.recv()).await;
    assert!(nothing.is_err());
}

#[tokio::test]
async fn voicemail_without_message_hangs_up_at_once() {
    let mut settings = fast_settings();
    settings.voicemail.leave_message = false;
    let mut h = harness(settings, Arc::new(DisabledReasoner::new("offline")));
    h.agent.start_call("c1", "+1", "reach HR", None, None).unwrap();

    h.agent
        .handle_transcript(&final_transcript("c1", "You have reached the voicemail of Dr. Smith"))
        .await
        .unwrap();

    match next_command(&mut h).await {
        OutboundCommand::Terminate { reason, .. } => assert_eq!(reason, "voicemail reached"),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[tokio::test]
async fn decision_in_flight_is_dropped_when_call_ends() {
    let reasoner = Arc::new(
        ScriptedReasoner::new(Decision::press("1", "sales", 0.9)).with_delay(Duration::from_millis(50)),
    );
    let mut h = harness(fast_settings(), reasoner);
    h.agent.start_call("c1", "+1", "buy a car", None, None).unwrap();

    let agent = Arc::clone(&h.agent);
    let deciding = tokio::spawn(async move {
        agent.handle_transcript(&final_transcript("c1", MENU)).await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.agent.end_call("c1").is_some());
    deciding.await.unwrap().unwrap();

    let nothing = tokio::time::timeout(Duration::from_millis(100), h.commands.recv()).await;
    assert!(nothing.is_err());
    assert_eq!(h.agent.active_calls(), 0);
}

#[tokio::test]
async fn summary_is_published_after_teardown() {
    let mut settings = fast_settings();
    settings.reasoning.summaries_enabled = true;
    let reasoner = Arc::new(ScriptedReasoner::new(Decision::press("2", "support", 0.9)));
    let mut h = harness(settings, reasoner);
    h.agent.start_call("c1", "+1", "technical support", None, None).unwrap();
    h.agent.handle_transcript(&final_transcript("c1", MENU)).await.unwrap();

    h.agent.end_call("c1");
    assert!(h.agent.engine().session("c1").is_none());

    let ended = next_event(&mut h, |e| matches!(e, AgentEvent::SessionEnded { .. })).await;
    assert!(matches!(ended, AgentEvent::SessionEnded { .. }));

    match next_event(&mut h, |e| matches!(e, AgentEvent::CallSummary { .. })).await {
        AgentEvent::CallSummary { summary, .. } => assert_eq!(summary, "1 actions toward 'technical support'"),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn menu_for_unknown_call_is_ignored() {
    let mut h = harness(fast_settings(), Arc::new(DisabledReasoner::new("offline")));
    h.agent.handle_transcript(&final_transcript("ghost", MENU)).await.unwrap();

    let nothing = tokio::time::timeout(Duration::from_millis(50), h.commands.recv()).await;
    assert!(nothing.is_err());
}

#[tokio::test]
async fn duplicate_call_is_rejected() {
    let h = harness(fast_settings(), Arc::new(DisabledReasoner::new("offline")));
    h.agent.start_call("c1", "+1", "goal", None, None).unwrap();
    assert!(h.agent.start_call("c1", "+1", "goal", None, None).is_err());
    assert_eq!(h.agent.active_calls(), 1);
}
