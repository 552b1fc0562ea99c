//! Transcript normalization before option extraction

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Number words spoken as keys
const NUMBER_WORDS: &[(&str, &str)] = &[
    ("zero", "0"),
    ("oh", "0"),
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("ten", "10"),
];

static KEY_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(press|dial|push|enter|select)\s+(zero|oh|one|two|three|four|five|six|seven|eight|nine|ten)\b",
    )
    .unwrap()
});

static SYMBOL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(press|dial|push|enter|select)\s+(?:the\s+)?(pound|hash|star|asterisk)(?:\s+(?:key|sign))?\b")
        .unwrap()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase, turn spoken keys into key symbols and collapse whitespace
///
/// "Press one for sales" becomes "press 1 for sales", "press the pound key"
/// becomes "press #".
pub fn normalize_transcript(text: &str) -> String {
    let lowered = text.to_lowercase();

    let digits = KEY_WORD.replace_all(&lowered, |caps: &Captures| {
        let digit = NUMBER_WORDS
            .iter()
            .find(|(word, _)| *word == &caps[2])
            .map(|(_, digit)| *digit)
            .unwrap_or("");
        format!("{} {}", &caps[1], digit)
    });

    let symbols = SYMBOL_KEY.replace_all(&digits, |caps: &Captures| {
        let symbol = match &caps[2] {
            "pound" | "hash" => "#",
            _ => "*",
        };
        format!("{} {}", &caps[1], symbol)
    });

    WHITESPACE.replace_all(symbols.trim(), " ").into_owned()
}

/// Is this token a spoken or written number?
pub fn is_numeric_token(token: &str) -> bool {
    (!token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
        || NUMBER_WORDS.iter().any(|(word, _)| *word == token && *word != "oh")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_words_after_press() {
        assert_eq!(normalize_transcript("Press ONE for sales"), "press 1 for sales");
        assert_eq!(normalize_transcript("dial oh for the operator"), "dial 0 for the operator");
        // Only after a key verb
        assert_eq!(normalize_transcript("one moment please"), "one moment please");
    }

    #[test]
    fn test_symbol_keys() {
        assert_eq!(normalize_transcript("Press the pound key to repeat"), "press # to repeat");
        assert_eq!(normalize_transcript("press star to go back"), "press * to go back");
        assert_eq!(normalize_transcript("press hash"), "press #");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(normalize_transcript("  for   sales,\n press 1. "), "for sales, press 1.");
    }

    #[test]
    fn test_numeric_tokens() {
        assert!(is_numeric_token("3"));
        assert!(is_numeric_token("seven"));
        assert!(!is_numeric_token("oh"));
        assert!(!is_numeric_token("sales"));
    }
}
