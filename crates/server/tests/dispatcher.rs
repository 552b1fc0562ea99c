//! End-to-end call handling through the dispatcher

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use ivr_agent_agent::CallAgent;
use ivr_agent_config::Settings;
use ivr_agent_core::{
    CallSummaryContext, ChannelCommandSink, Decision, DecisionContext, InboundEvent, NextAction,
    OutboundCommand, Priority,
};
use ivr_agent_llm::{DisabledReasoner, LlmError, ReasoningService};
use ivr_agent_server::{pump_events, CallDispatcher};

const MENU: &str = "For sales, press 1. For support, press 2. For billing, press 3.";

struct FixedReasoner(Decision);

#[async_trait]
impl ReasoningService for FixedReasoner {
    async fn request_decision(&self, _context: &DecisionContext) -> Result<Decision, LlmError> {
        Ok(self.0.clone())
    }

    async fn summarize_call(&self, _context: &CallSummaryContext) -> Result<String, LlmError> {
        Ok(String::new())
    }
}

/// Hands out decisions in order, repeating the last one
struct SequenceReasoner(Mutex<VecDeque<Decision>>);

impl SequenceReasoner {
    fn new(decisions: Vec<Decision>) -> Self {
        Self(Mutex::new(decisions.into()))
    }
}

#[async_trait]
impl ReasoningService for SequenceReasoner {
    async fn request_decision(&self, _context: &DecisionContext) -> Result<Decision, LlmError> {
        let mut queue = self.0.lock();
        let decision = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        decision.ok_or_else(|| LlmError::Unavailable("no decisions left".to_string()))
    }

    async fn summarize_call(&self, _context: &CallSummaryContext) -> Result<String, LlmError> {
        Ok(String::new())
    }
}

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.timing.decision_timeout_ms = 100;
    settings.timing.press_settle_ms = 20;
    settings.timing.hangup_delay_ms = 20;
    settings.timing.menu_wait_timeout_ms = 30;
    settings.timing.greeting_delay_ms = 20;
    settings.timing.summary_timeout_ms = 100;
    settings.timing.max_wait_timeouts = 2;
    settings.voicemail.delivery_delay_ms = 20;
    settings
}

fn setup(
    settings: Settings,
    reasoner: Arc<dyn ReasoningService>,
) -> (Arc<CallDispatcher>, mpsc::UnboundedReceiver<OutboundCommand>) {
    let (sink, commands) = ChannelCommandSink::channel();
    let (agent, signals) = CallAgent::new(&settings, reasoner, Arc::new(sink));
    (CallDispatcher::start(agent, signals), commands)
}

fn offline() -> Arc<dyn ReasoningService> {
    Arc::new(DisabledReasoner::new("offline"))
}

fn started(call_id: &str, goal: &str) -> InboundEvent {
    InboundEvent::CallStarted {
        call_id: call_id.to_string(),
        phone_number: "+15550100".to_string(),
        goal: goal.to_string(),
        org_name: Some("Acme Clinic".to_string()),
        target_person: None,
    }
}

fn said(call_id: &str, text: &str) -> InboundEvent {
    InboundEvent::TranscriptFinal {
        call_id: call_id.to_string(),
        text: text.to_string(),
        confidence: 0.95,
        timestamp: Utc::now(),
    }
}

fn ended(call_id: &str) -> InboundEvent {
    InboundEvent::CallEnded {
        call_id: call_id.to_string(),
    }
}

async fn next_command(commands: &mut mpsc::UnboundedReceiver<OutboundCommand>) -> OutboundCommand {
    tokio::time::timeout(Duration::from_secs(2), commands.recv())
        .await
        .expect("command expected")
        .expect("command channel open")
}

async fn assert_quiet(commands: &mut mpsc::UnboundedReceiver<OutboundCommand>, ms: u64) {
    let result = tokio::time::timeout(Duration::from_millis(ms), commands.recv()).await;
    assert!(result.is_err(), "unexpected command: {:?}", result);
}

#[tokio::test]
async fn menu_is_navigated_with_a_tone() {
    let (dispatcher, mut commands) = setup(fast_settings(), offline());
    dispatcher.dispatch(started("c1", "technical support")).unwrap();
    dispatcher.dispatch(said("c1", MENU)).unwrap();

    match next_command(&mut commands).await {
        OutboundCommand::SendTone { call_id, digits, .. } => {
            assert_eq!(call_id, "c1");
            assert_eq!(digits, "2");
        }
        other => panic!("unexpected command: {:?}", other),
    }
    assert_eq!(dispatcher.active_calls(), 1);
}

#[tokio::test]
async fn ended_call_sends_no_pending_tone() {
    let mut settings = fast_settings();
    settings.timing.press_settle_ms = 200;
    let decision = Decision {
        selected_option: "2".to_string(),
        reasoning: "support".to_string(),
        response: "One moment.".to_string(),
        confidence: 0.9,
        next_action: NextAction::PressKey,
    };
    let (dispatcher, mut commands) = setup(settings, Arc::new(FixedReasoner(decision)));
    dispatcher.dispatch(started("c1", "technical support")).unwrap();
    dispatcher.dispatch(said("c1", MENU)).unwrap();

    match next_command(&mut commands).await {
        OutboundCommand::SynthesizeAndPlay { text, priority, .. } => {
            assert_eq!(text, "One moment.");
            assert_eq!(priority, Priority::High);
        }
        other => panic!("unexpected command: {:?}", other),
    }

    dispatcher.dispatch(ended("c1")).unwrap();
    assert_eq!(dispatcher.active_calls(), 0);
    assert_eq!(dispatcher.agent().active_calls(), 0);

    assert_quiet(&mut commands, 350).await;
}

#[tokio::test]
async fn human_answer_is_saved_and_call_closed() {
    let (dispatcher, mut commands) = setup(fast_settings(), offline());
    dispatcher.dispatch(started("c1", "reach HR about jobs")).unwrap();
    dispatcher.dispatch(said("c1", "Good morning, Acme Clinic, how can I help you?")).unwrap();

    let question = match next_command(&mut commands).await {
        OutboundCommand::SynthesizeAndPlay { text, priority, .. } => {
            assert_eq!(priority, Priority::High);
            assert!(text.contains("Acme Clinic"));
            text
        }
        other => panic!("unexpected command: {:?}", other),
    };

    dispatcher
        .dispatch(said("c1", "Sure, email jobs at acme dot com."))
        .unwrap();

    let mut saved = None;
    let mut closing = None;
    let mut terminated = false;
    for _ in 0..3 {
        match next_command(&mut commands).await {
            OutboundCommand::SaveHumanAnswer {
                question: q, answer, ..
            } => {
                assert_eq!(q, question);
                saved = Some(answer);
            }
            OutboundCommand::SynthesizeAndPlay { text, .. } => closing = Some(text),
            OutboundCommand::Terminate { .. } => terminated = true,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    assert_eq!(saved.as_deref(), Some("Sure, email jobs at acme dot com."));
    assert!(closing.unwrap().contains("Thank you"));
    assert!(terminated);
}

#[tokio::test]
async fn greeting_then_hangup_asks_nothing() {
    let mut settings = fast_settings();
    settings.timing.greeting_delay_ms = 100;
    let (dispatcher, mut commands) = setup(settings, offline());
    dispatcher.dispatch(started("c1", "reach HR")).unwrap();
    dispatcher.dispatch(said("c1", "Hello?")).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    dispatcher.dispatch(ended("c1")).unwrap();

    assert_quiet(&mut commands, 200).await;
}

#[tokio::test]
async fn repeated_wait_timeouts_end_the_call() {
    let wait = Decision {
        selected_option: String::new(),
        reasoning: "menu still playing".to_string(),
        response: String::new(),
        confidence: 0.6,
        next_action: NextAction::Wait,
    };
    let (dispatcher, mut commands) = setup(fast_settings(), Arc::new(FixedReasoner(wait)));
    dispatcher.dispatch(started("c1", "reach HR")).unwrap();
    dispatcher.dispatch(said("c1", MENU)).unwrap();

    match next_command(&mut commands).await {
        OutboundCommand::Terminate { call_id, reason } => {
            assert_eq!(call_id, "c1");
            assert!(reason.contains("repeated waits"));
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[tokio::test]
async fn interim_transcripts_do_not_drive_decisions() {
    let (dispatcher, mut commands) = setup(fast_settings(), offline());
    dispatcher.dispatch(started("c1", "technical support")).unwrap();
    dispatcher
        .dispatch(InboundEvent::TranscriptInterim {
            call_id: "c1".to_string(),
            text: MENU.to_string(),
            confidence: 0.9,
        })
        .unwrap();

    assert_quiet(&mut commands, 100).await;
}

#[tokio::test]
async fn calls_are_handled_independently() {
    let (dispatcher, mut commands) = setup(fast_settings(), offline());
    dispatcher.dispatch(started("a", "technical support")).unwrap();
    dispatcher.dispatch(started("b", "pay my bill")).unwrap();
    dispatcher.dispatch(said("a", MENU)).unwrap();
    dispatcher.dispatch(said("b", MENU)).unwrap();

    let mut tones = Vec::new();
    for _ in 0..2 {
        match next_command(&mut commands).await {
            OutboundCommand::SendTone { call_id, digits, .. } => tones.push((call_id, digits)),
            other => panic!("unexpected command: {:?}", other),
        }
    }
    tones.sort();
    assert_eq!(
        tones,
        vec![
            ("a".to_string(), "2".to_string()),
            ("b".to_string(), "3".to_string())
        ]
    );

    dispatcher.dispatch(ended("a")).unwrap();
    assert_eq!(dispatcher.active_calls(), 1);
}

#[tokio::test]
async fn events_for_unknown_calls_are_dropped() {
    let (dispatcher, mut commands) = setup(fast_settings(), offline());
    dispatcher.dispatch(said("ghost", MENU)).unwrap();
    dispatcher.dispatch(ended("ghost")).unwrap();

    assert_quiet(&mut commands, 50).await;
    assert_eq!(dispatcher.active_calls(), 0);
}

#[tokio::test]
async fn duplicate_call_start_is_an_error() {
    let (dispatcher, _commands) = setup(fast_settings(), offline());
    dispatcher.dispatch(started("c1", "goal")).unwrap();
    assert!(dispatcher.dispatch(started("c1", "goal")).is_err());
    assert_eq!(dispatcher.active_calls(), 1);
}

#[tokio::test]
async fn json_lines_drive_the_dispatcher() {
    let (dispatcher, mut commands) = setup(fast_settings(), offline());
    let input = concat!(
        r#"{"type":"call.started","call_id":"c1","phone_number":"+1","goal":"technical support"}"#,
        "\n",
        "garbage\n",
        "\n",
        r#"{"type":"transcript.final","call_id":"c1","text":"For sales, press 1. For support, press 2.","confidence":0.9,"timestamp":"2026-01-05T10:00:00Z"}"#,
        "\n",
    );

    let dispatched = pump_events(input.as_bytes(), Arc::clone(&dispatcher)).await.unwrap();
    assert_eq!(dispatched, 2);

    match next_command(&mut commands).await {
        OutboundCommand::SendTone { digits, .. } => assert_eq!(digits, "2"),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[tokio::test]
async fn announced_tone_goes_out_before_the_next_decision() {
    let mut settings = fast_settings();
    settings.timing.press_settle_ms = 200;
    let mut announced = Decision::press("2", "support", 0.9);
    announced.response = "Support please".to_string();
    let silent = Decision::press("4", "pharmacy", 0.9);
    let reasoner = Arc::new(SequenceReasoner::new(vec![announced, silent]));

    let (dispatcher, mut commands) = setup(settings, reasoner);
    dispatcher.dispatch(started("c1", "technical support")).unwrap();
    dispatcher.dispatch(said("c1", MENU)).unwrap();

    assert!(matches!(
        next_command(&mut commands).await,
        OutboundCommand::SynthesizeAndPlay { .. }
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    dispatcher
        .dispatch(said("c1", "For pharmacy, press 4. For billing, press 3."))
        .unwrap();

    let mut tones = Vec::new();
    while tones.len() < 2 {
        if let OutboundCommand::SendTone { digits, .. } = next_command(&mut commands).await {
            tones.push(digits);
        }
    }
    assert_eq!(tones, vec!["2".to_string(), "4".to_string()]);
}

#[tokio::test]
async fn ivr_opener_is_not_a_person() {
    let (dispatcher, mut commands) = setup(fast_settings(), offline());
    dispatcher.dispatch(started("c1", "technical support")).unwrap();
    dispatcher
        .dispatch(said(
            "c1",
            "Thank you for calling Acme Clinic. Please listen carefully as our menu options have changed.",
        ))
        .unwrap();
    dispatcher.dispatch(said("c1", MENU)).unwrap();

    match next_command(&mut commands).await {
        OutboundCommand::SendTone { digits, .. } => assert_eq!(digits, "2"),
        other => panic!("unexpected command: {:?}", other),
    }
    assert_quiet(&mut commands, 100).await;
    assert!(!dispatcher.agent().human_flow().is_engaged("c1"));
}

#[tokio::test]
async fn menu_during_greeting_delay_resumes_navigation() {
    let mut settings = fast_settings();
    settings.timing.greeting_delay_ms = 150;
    let (dispatcher, mut commands) = setup(settings, offline());
    dispatcher.dispatch(started("c1", "technical support")).unwrap();
    dispatcher.dispatch(said("c1", "Hello!")).unwrap();
    dispatcher.dispatch(said("c1", MENU)).unwrap();

    match next_command(&mut commands).await {
        OutboundCommand::SendTone { digits, .. } => assert_eq!(digits, "2"),
        other => panic!("unexpected command: {:?}", other),
    }
    // the scripted question never plays
    assert_quiet(&mut commands, 300).await;
}
