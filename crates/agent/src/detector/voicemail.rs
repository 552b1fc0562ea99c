//! Answering machine detection

use once_cell::sync::Lazy;
use regex::Regex;

/// Any one of these means we reached a voicemail greeting
static STRONG_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bleave (?:a|your|me a|us a) (?:brief |short |detailed )?message\b",
        r"\b(?:at|after) the (?:tone|beep)\b",
        r"\bvoice ?mail\b",
        r"\bmailbox\b",
        r"\brecord your message\b",
        r"\bwhen you(?:'ve| have) finished recording\b",
        r"\bto (?:save|send|erase|delete|re-?record) (?:this |your )?(?:message|recording)?\s*,?\s*press\b",
        r"\bre-?record\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Two or more of these together mean voicemail
const WEAK_INDICATORS: &[&str] = &[
    "unavailable",
    "not available",
    "call you back",
    "return your call",
    "away from",
    "can't come to the phone",
    "cannot come to the phone",
    "get back to you",
    "as soon as possible",
];

/// Check a lowercased transcript for a voicemail greeting
pub fn is_voicemail(lowered: &str) -> bool {
    if STRONG_PATTERNS.iter().any(|p| p.is_match(lowered)) {
        return true;
    }

    let weak = WEAK_INDICATORS
        .iter()
        .filter(|indicator| lowered.contains(*indicator))
        .count();
    weak >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_phrases() {
        assert!(is_voicemail("please leave a message at the tone"));
        assert!(is_voicemail("you have reached the voicemail of dr. smith"));
        assert!(is_voicemail("to save this message, press 2"));
        assert!(is_voicemail("the mailbox is full"));
    }

    #[test]
    fn test_weak_indicators_need_two() {
        assert!(!is_voicemail("our sales team is unavailable right now"));
        assert!(is_voicemail("i'm unavailable, i will call you back"));
        assert!(is_voicemail("sorry i can't come to the phone, i'll get back to you"));
    }

    #[test]
    fn test_menu_is_not_voicemail() {
        assert!(!is_voicemail("for sales, press 1. for support, press 2."));
    }
}
