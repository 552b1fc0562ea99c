//! Menu Detection
//!
//! Classifies one final transcript as a voicemail greeting, an automated
//! menu, or nothing actionable. Live human speech is recognized later by the
//! human conversation flow.

pub mod normalize;
pub mod patterns;
pub mod voicemail;

use std::cmp::Ordering;
use chrono::{DateTime, Utc};

use ivr_agent_core::{DetectedMenu, DetectionResult, MenuOption};

use crate::keywords::{categories_in, mentions, words, BUSINESS_TERMS, DEPARTMENT_CATEGORIES};
use normalize::{is_numeric_token, normalize_transcript};
use patterns::{extract_options, RawOption};

/// Words that suggest a menu is being read out
const MENU_INDICATORS: &[&str] = &[
    "press",
    "dial",
    "enter",
    "select",
    "for",
    "menu",
    "options",
    "department",
    "representative",
    "operator",
];

/// Phrases that frame an automated menu
const FRAMING_PHRASES: &[&str] = &[
    "thank you for calling",
    "please listen carefully",
    "menu options have changed",
    "main menu",
];

const BASE_OPTION_CONFIDENCE: f32 = 0.5;
const DEPARTMENT_BONUS: f32 = 0.2;
const BUSINESS_TERM_BONUS: f32 = 0.1;
const MAX_COUNT_BONUS: f32 = 0.3;
const FRAMING_BONUS: f32 = 0.2;

/// Menu detector
///
/// Stateless: the same transcript always yields the same result.
#[derive(Debug, Clone, Default)]
pub struct MenuDetector;

impl MenuDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify one final transcript
    pub fn detect(
        &self,
        call_id: &str,
        transcript: &str,
        stt_confidence: f32,
        timestamp: DateTime<Utc>,
    ) -> DetectionResult {
        let lowered = transcript.to_lowercase();

        if voicemail::is_voicemail(&lowered) {
            tracing::debug!(call_id = %call_id, "Voicemail greeting detected");
            return DetectionResult::Voicemail;
        }

        if !Self::looks_like_menu(&lowered) {
            return DetectionResult::NoSignal;
        }

        let normalized = normalize_transcript(transcript);
        let raw = extract_options(&normalized);
        if raw.is_empty() {
            return DetectionResult::NoSignal;
        }

        let stt_confidence = stt_confidence.clamp(0.0, 1.0);
        let options = dedup_and_sort(
            raw.into_iter()
                .map(|option| score_option(option, stt_confidence))
                .collect(),
        );

        let confidence = menu_confidence(&options, &lowered);

        tracing::debug!(
            call_id = %call_id,
            options = options.len(),
            confidence,
            "Menu detected"
        );

        DetectionResult::Menu(DetectedMenu {
            call_id: call_id.to_string(),
            options,
            full_text: transcript.to_string(),
            confidence,
            timestamp,
        })
    }

    /// Does the transcript read like an automated menu, options or not?
    pub fn is_menu_like(&self, transcript: &str) -> bool {
        Self::looks_like_menu(&transcript.to_lowercase())
    }

    /// Does the transcript carry a phrase automated systems open with?
    pub fn is_framed(&self, transcript: &str) -> bool {
        Self::has_framing(&transcript.to_lowercase())
    }

    fn has_framing(lowered: &str) -> bool {
        FRAMING_PHRASES.iter().any(|p| lowered.contains(p))
    }

    /// Two indicator words, or one indicator and a number
    fn looks_like_menu(lowered: &str) -> bool {
        let tokens = words(lowered);
        let indicators = tokens
            .iter()
            .filter(|t| MENU_INDICATORS.contains(&t.as_str()))
            .count();
        let has_number = tokens.iter().any(|t| is_numeric_token(t));

        indicators >= 2 || (indicators >= 1 && has_number)
    }
}

fn score_option(raw: RawOption, stt_confidence: f32) -> MenuOption {
    let mut confidence = BASE_OPTION_CONFIDENCE;

    if !categories_in(&raw.description, DEPARTMENT_CATEGORIES).is_empty() {
        confidence += DEPARTMENT_BONUS;
    }
    confidence += BUSINESS_TERMS
        .iter()
        .filter(|term| mentions(&raw.description, term))
        .count() as f32
        * BUSINESS_TERM_BONUS;

    MenuOption::new(raw.key, raw.description, confidence.min(1.0).min(stt_confidence))
}

/// One option per key, numeric keys first in numeric order
fn dedup_and_sort(options: Vec<MenuOption>) -> Vec<MenuOption> {
    let mut unique: Vec<MenuOption> = Vec::with_capacity(options.len());

    for option in options {
        match unique.iter().position(|o| o.key == option.key) {
            Some(idx) => {
                let existing = &mut unique[idx];
                let longer = option.description.len() > existing.description.len();
                let same_length_more_confident = option.description.len() == existing.description.len()
                    && option.confidence > existing.confidence;
                if longer || same_length_more_confident {
                    *existing = option;
                }
            }
            None => unique.push(option),
        }
    }

    unique.sort_by(|a, b| match (a.numeric_key(), b.numeric_key()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.key.cmp(&b.key),
    });

    unique
}

fn menu_confidence(options: &[MenuOption], lowered: &str) -> f32 {
    if options.is_empty() {
        return 0.0;
    }

    let average = options.iter().map(|o| o.confidence).sum::<f32>() / options.len() as f32;
    let count_bonus = (options.len() as f32 * 0.1).min(MAX_COUNT_BONUS);
    let framing_bonus = if MenuDetector::has_framing(lowered) {
        FRAMING_BONUS
    } else {
        0.0
    };

    (average + count_bonus + framing_bonus).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> DetectionResult {
        MenuDetector::new().detect("call-1", text, 0.95, Utc::now())
    }

    #[test]
    fn test_voicemail_wins_over_menu() {
        assert_eq!(detect("Please leave a message at the tone"), DetectionResult::Voicemail);
        assert_eq!(
            detect("To leave a message press 1. For sales press 2."),
            DetectionResult::Voicemail
        );
    }

    #[test]
    fn test_regular_conversation_is_no_signal() {
        assert_eq!(detect("Hello, this is just a regular conversation"), DetectionResult::NoSignal);
        assert_eq!(detect("Hi, how can I help you today?"), DetectionResult::NoSignal);
    }

    #[test]
    fn test_simple_menu() {
        let result = detect("For sales, press 1. For support, press 2. For billing, press 3.");
        let menu = result.menu().expect("menu detected");

        let keys: Vec<_> = menu.options.iter().map(|o| (o.key.as_str(), o.description.as_str())).collect();
        assert_eq!(keys, vec![("1", "sales"), ("2", "support"), ("3", "billing")]);
        assert!(menu.options.iter().all(|o| o.confidence >= 0.5));
        assert!(menu.confidence >= 0.5);
        assert_eq!(menu.call_id, "call-1");
    }

    #[test]
    fn test_detect_is_idempotent() {
        let text = "Thank you for calling. Press one for sales, press two for customer service.";
        let timestamp = Utc::now();
        let detector = MenuDetector::new();
        let first = detector.detect("c", text, 0.9, timestamp);
        let second = detector.detect("c", text, 0.9, timestamp);
        assert_eq!(first, second);
    }

    #[test]
    fn test_option_confidence() {
        let menu = detect("Press 1 for sales. Press 2 for customer service hours. Press 3 for gift cards.");
        let menu = menu.menu().expect("menu detected");

        // department category
        assert!((menu.option("1").unwrap().confidence - 0.7).abs() < 1e-6);
        // customer + service + hours (also a department category)
        assert!((menu.option("2").unwrap().confidence - 1.0).abs() < 1e-6);
        // nothing recognized
        assert!((menu.option("3").unwrap().confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stt_confidence_caps_options() {
        let result = MenuDetector::new().detect("c", "For sales, press 1.", 0.3, Utc::now());
        let menu = result.menu().expect("menu detected");
        assert!((menu.options[0].confidence - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_dedup_keeps_longer_description() {
        let menu = detect("For sales press 1. Press 1 for new vehicle sales. Press 0 for the operator.");
        let menu = menu.menu().expect("menu detected");
        assert_eq!(menu.options.len(), 2);
        assert_eq!(menu.options[0].key, "0");
        assert_eq!(menu.option("1").unwrap().description, "new vehicle sales");
    }

    #[test]
    fn test_sort_order() {
        let menu = detect("Press star for the main menu. Press 10 for hours. Press 2 for sales. Press pound to repeat.");
        let menu = menu.menu().expect("menu detected");
        let keys: Vec<_> = menu.options.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["2", "10", "#", "*"]);
    }

    #[test]
    fn test_framing_raises_menu_confidence() {
        let plain = detect("Press 3 for gift cards.");
        let framed = detect("Thank you for calling. Press 3 for gift cards.");
        assert!(framed.menu().unwrap().confidence > plain.menu().unwrap().confidence);
    }

    #[test]
    fn test_automated_openers() {
        let detector = MenuDetector::new();
        let opener = "Thank you for calling Acme Clinic. Please listen carefully as our menu options have changed.";
        assert!(detector.is_menu_like(opener));
        assert!(detector.is_framed(opener));
        assert_eq!(detector.detect("c1", opener, 0.9, Utc::now()), DetectionResult::NoSignal);

        assert!(detector.is_framed("Thank you for calling Acme, this is Maria speaking"));
        assert!(!detector.is_menu_like("Good morning, Acme Clinic, how can I help you?"));
        assert!(!detector.is_framed("Good morning, Acme Clinic, how can I help you?"));
    }

    #[test]
    fn test_indicators_without_options() {
        assert_eq!(detect("Please select from the following menu"), DetectionResult::NoSignal);
    }
}
