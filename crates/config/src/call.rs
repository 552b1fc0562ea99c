//! Per-call behavior: timings, playback, human flow and voicemail

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Timers and timeouts used while a call is live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Upper bound on a reasoning-service decision before the heuristic takes over
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,

    /// Delay between an announcement and the DTMF tone that follows it
    #[serde(default = "default_press_settle_ms")]
    pub press_settle_ms: u64,

    /// Delay between a closing remark and call termination
    #[serde(default = "default_hangup_delay_ms")]
    pub hangup_delay_ms: u64,

    /// How long a `wait` decision waits for the menu to continue
    #[serde(default = "default_menu_wait_timeout_ms")]
    pub menu_wait_timeout_ms: u64,

    /// Delay after a human greeting before asking the question
    #[serde(default = "default_greeting_delay_ms")]
    pub greeting_delay_ms: u64,

    /// Upper bound on the best-effort call summary
    #[serde(default = "default_summary_timeout_ms")]
    pub summary_timeout_ms: u64,

    /// Consecutive wait timeouts before the call is abandoned
    #[serde(default = "default_max_wait_timeouts")]
    pub max_wait_timeouts: u32,
}

fn default_decision_timeout_ms() -> u64 {
    5000
}
fn default_press_settle_ms() -> u64 {
    3000
}
fn default_hangup_delay_ms() -> u64 {
    4000
}
fn default_menu_wait_timeout_ms() -> u64 {
    15000
}
fn default_greeting_delay_ms() -> u64 {
    2000
}
fn default_summary_timeout_ms() -> u64 {
    10000
}
fn default_max_wait_timeouts() -> u32 {
    2
}

impl TimingConfig {
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    pub fn press_settle(&self) -> Duration {
        Duration::from_millis(self.press_settle_ms)
    }

    pub fn hangup_delay(&self) -> Duration {
        Duration::from_millis(self.hangup_delay_ms)
    }

    pub fn menu_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.menu_wait_timeout_ms)
    }

    pub fn greeting_delay(&self) -> Duration {
        Duration::from_millis(self.greeting_delay_ms)
    }

    pub fn summary_timeout(&self) -> Duration {
        Duration::from_millis(self.summary_timeout_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            decision_timeout_ms: default_decision_timeout_ms(),
            press_settle_ms: default_press_settle_ms(),
            hangup_delay_ms: default_hangup_delay_ms(),
            menu_wait_timeout_ms: default_menu_wait_timeout_ms(),
            greeting_delay_ms: default_greeting_delay_ms(),
            summary_timeout_ms: default_summary_timeout_ms(),
            max_wait_timeouts: default_max_wait_timeouts(),
        }
    }
}

/// Speech playback settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Voice requested for every utterance (vendor default when unset)
    #[serde(default)]
    pub voice: Option<String>,
}

/// Scripted human conversation
///
/// Templates accept `{service}`, `{target}` and `{org}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanFlowConfig {
    #[serde(default = "default_question_template")]
    pub question_template: String,

    #[serde(default = "default_closing_message")]
    pub closing_message: String,

    /// Used when the call has no target-person hint
    #[serde(default = "default_target_label")]
    pub default_target: String,

    /// End the call after the closing remark
    #[serde(default = "default_true")]
    pub hang_up_after_answer: bool,
}

fn default_question_template() -> String {
    "Hi, I read about {org} online and saw you provide {service}. \
     Can I get the contact information for {target}?"
        .to_string()
}
fn default_closing_message() -> String {
    "Thank you so much for your help. Have a great day!".to_string()
}
fn default_target_label() -> String {
    "the person in charge".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for HumanFlowConfig {
    fn default() -> Self {
        Self {
            question_template: default_question_template(),
            closing_message: default_closing_message(),
            default_target: default_target_label(),
            hang_up_after_answer: true,
        }
    }
}

/// Voicemail message drop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoicemailConfig {
    /// Leave a message before hanging up
    #[serde(default = "default_true")]
    pub leave_message: bool,

    #[serde(default = "default_voicemail_template")]
    pub message_template: String,

    /// Time allowed for the message to play before terminating
    #[serde(default = "default_voicemail_delay_ms")]
    pub delivery_delay_ms: u64,
}

fn default_voicemail_template() -> String {
    "Hi, this message is for {target} at {org}. I was hoping to reach you about {service}. \
     I will try you again soon. Thank you!"
        .to_string()
}
fn default_voicemail_delay_ms() -> u64 {
    12000
}

impl VoicemailConfig {
    pub fn delivery_delay(&self) -> Duration {
        Duration::from_millis(self.delivery_delay_ms)
    }
}

impl Default for VoicemailConfig {
    fn default() -> Self {
        Self {
            leave_message: true,
            message_template: default_voicemail_template(),
            delivery_delay_ms: default_voicemail_delay_ms(),
        }
    }
}
