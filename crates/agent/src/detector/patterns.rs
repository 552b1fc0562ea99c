//! Option extraction from a normalized transcript
//!
//! Two families of patterns are tried on every clause:
//! - key-first: "press 1 for sales", "press 2 if you want to pay a bill"
//! - description-first: "for sales, press 1", "if you need support press 2"
//!
//! The family with more matches in a clause wins. Without punctuation,
//! "press 1 for sales press 2 for support" would otherwise also read as
//! "sales, press 2".

use std::collections::BTreeMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// A key/description pair before scoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOption {
    pub key: String,
    pub description: String,
}

static CLAUSE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.;!?]+").unwrap());

static PRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bpress\b").unwrap());

/// Key-first patterns, anchored at the start of a "press ..." chunk
static KEY_FIRST: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^press\s+([0-9]{1,2}|[#*])\s*,?\s*if\s+you\s+(?:want|would\s+like|need|wish)\s+(?:to\s+)?(.+)$",
        r"^press\s+([0-9]{1,2}|[#*])\s*,?\s*(?:for|to)\s+(.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Description-first patterns, ordered by specificity
static DESCRIPTION_FIRST: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bif\s+you\s+(?:want|would\s+like|need|wish|are)\s+(?:to\s+)?(.+?)\s*,?\s*(?:please\s+)?press\s+([0-9]{1,2}|[#*])",
        r"\b(?:for|to)\s+(.+?)\s*,?\s*(?:please\s+)?press\s+([0-9]{1,2}|[#*])",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TRAILING_FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:(?:^|\s+)(?:or|and|please|now))+$").unwrap());

/// Extract options clause by clause, in transcript order
///
/// Keys may repeat; deduplication happens later.
pub fn extract_options(normalized: &str) -> Vec<RawOption> {
    let mut options = Vec::new();

    for clause in CLAUSE_SPLIT.split(normalized) {
        let clause = clause.trim();
        if clause.is_empty() || !clause.contains("press") {
            continue;
        }

        let key_first = extract_key_first(clause);
        let description_first = extract_description_first(clause);

        // Ties go to key-first, the more common phrasing
        if description_first.len() > key_first.len() {
            options.extend(description_first);
        } else {
            options.extend(key_first);
        }
    }

    options
}

fn extract_key_first(clause: &str) -> Vec<RawOption> {
    let starts: Vec<usize> = PRESS.find_iter(clause).map(|m| m.start()).collect();
    let mut options = Vec::new();

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(clause.len());
        let chunk = clause[start..end].trim();

        let found = KEY_FIRST.iter().find_map(|pattern| {
            pattern.captures(chunk).map(|caps| (caps[1].to_string(), caps[2].to_string()))
        });

        if let Some((key, description)) = found {
            if let Some(description) = clean_description(&description, false) {
                options.push(RawOption { key, description });
            }
        }
    }

    options
}

fn extract_description_first(clause: &str) -> Vec<RawOption> {
    // Keyed by the position of the key so overlapping patterns count once
    let mut by_position: BTreeMap<usize, RawOption> = BTreeMap::new();

    for pattern in DESCRIPTION_FIRST.iter() {
        for caps in pattern.captures_iter(clause) {
            let (Some(description), Some(key)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if by_position.contains_key(&key.start()) {
                continue;
            }
            if let Some(description) = clean_description(description.as_str(), true) {
                by_position.insert(
                    key.start(),
                    RawOption {
                        key: key.as_str().to_string(),
                        description,
                    },
                );
            }
        }
    }

    by_position.into_values().collect()
}

/// Trim filler around a captured description; `None` when nothing is left
///
/// Description-first captures start at the first "for"/"to" of the clause,
/// so only the part after the last " for " is kept for them.
fn clean_description(raw: &str, take_last_for: bool) -> Option<String> {
    let mut text = raw.trim();

    if take_last_for {
        if let Some(idx) = text.rfind(" for ") {
            text = &text[idx + " for ".len()..];
        }
    }

    let text = text.trim_matches(|c: char| !c.is_alphanumeric());
    let text = text.strip_prefix("the ").unwrap_or(text);
    let text = TRAILING_FILLER.replace(text, "");
    let text = text.trim_matches(|c: char| !c.is_alphanumeric()).trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
