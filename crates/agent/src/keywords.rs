//! Keyword tables and whole-word matching shared by detection and scoring

/// Departments that raise option confidence when named
pub const DEPARTMENT_CATEGORIES: &[(&str, &[&str])] = &[
    ("sales", &["sales", "sell", "buy", "purchase", "pricing", "quote", "new account"]),
    ("support", &["support", "technical", "tech", "troubleshooting", "repair", "help desk"]),
    ("billing", &["billing", "bill", "payment", "payments", "invoice", "balance"]),
    ("emergency", &["emergency", "urgent", "911"]),
    ("directory", &["directory", "extension", "operator", "receptionist", "dial by name"]),
    ("hours", &["hours", "location", "locations", "directions", "address"]),
];

/// Generic business terms, each adding a little confidence
pub const BUSINESS_TERMS: &[&str] = &["customer", "service", "hours", "location"];

/// Categories a caller goal may target
pub const GOAL_CATEGORIES: &[(&str, &[&str])] = &[
    ("sales", &["sales", "buy", "purchase", "pricing", "quote", "new customer", "new account"]),
    ("support", &["support", "technical", "tech", "troubleshooting", "repair", "help desk", "it department"]),
    ("billing", &["billing", "bill", "payment", "payments", "invoice", "balance", "accounts"]),
    (
        "hr",
        &["hr", "human resources", "careers", "career", "jobs", "job", "employment", "hiring", "recruiting", "personnel"],
    ),
    ("referrals", &["referral", "referrals", "physician", "doctor", "provider", "providers"]),
    ("medical", &["patient", "patients", "appointment", "appointments", "nurse", "clinic", "medical"]),
    ("pharmacy", &["pharmacy", "prescription", "prescriptions", "refill", "refills"]),
    ("emergency", &["emergency", "urgent", "911"]),
    ("directory", &["directory", "extension", "dial by name"]),
    ("hours", &["hours", "location", "locations", "directions", "address"]),
];

/// Options that reach administration when nothing better matches
pub const ADMINISTRATIVE_TERMS: &[&str] = &[
    "hr",
    "human resources",
    "administration",
    "administrative",
    "admin",
    "office",
    "business office",
    "general",
    "management",
];

/// Options that reach a person who can route the call
pub const ROUTING_TERMS: &[&str] = &[
    "operator",
    "representative",
    "directory",
    "receptionist",
    "front desk",
    "agent",
    "all other",
    "anything else",
    "someone",
];

/// Options to avoid unless the goal targets them
pub const AVOID_TERMS: &[&str] = &[
    "patient",
    "patients",
    "billing",
    "emergency",
    "pharmacy",
    "prescription",
    "prescriptions",
    "refill",
];

/// Words that carry no meaning when comparing goals and descriptions
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "to", "for", "of", "and", "or", "in", "on", "at", "with", "about", "our", "your",
    "you", "me", "my", "i", "we", "is", "are", "be", "if", "please", "would", "like", "want", "need",
    "get", "reach", "speak", "talk", "someone", "person", "contact", "information", "info", "call",
    "calling", "this", "that", "who", "can",
];

/// Lowercase alphanumeric tokens of `text`
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokens that are not stop words and have at least three characters
/// ("hr" excepted)
pub fn meaningful_words(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| w.len() >= 3 || w == "hr")
        .collect()
}

/// Whole-word (or whole-phrase) containment, case-insensitive
pub fn mentions(text: &str, term: &str) -> bool {
    let needle = words(term);
    if needle.is_empty() {
        return false;
    }
    let haystack = words(text);
    haystack.windows(needle.len()).any(|window| window == needle.as_slice())
}

/// Does `text` mention any of `terms`?
pub fn mentions_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| mentions(text, term))
}

/// Names of the categories in `table` that `text` mentions
pub fn categories_in(text: &str, table: &[(&'static str, &[&str])]) -> Vec<&'static str> {
    table
        .iter()
        .filter(|(_, terms)| mentions_any(text, terms))
        .map(|(name, _)| *name)
        .collect()
}
