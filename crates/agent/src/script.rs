//! Scripted lines spoken to people and answering machines

use crate::keywords::{categories_in, GOAL_CATEGORIES};

/// Used for `{org}` when the organization is unknown
pub const DEFAULT_ORG_LABEL: &str = "your organization";

/// Service phrase matching a navigation goal
pub fn service_phrase(goal: &str) -> &'static str {
    let categories = categories_in(goal, GOAL_CATEGORIES);
    let has = |name: &str| categories.iter().any(|c| *c == name);

    if has("referrals") {
        "physician referrals"
    } else if has("billing") {
        "billing services"
    } else if has("hr") {
        "career opportunities"
    } else if has("support") {
        "technical support"
    } else if has("sales") {
        "your products"
    } else {
        "your services"
    }
}

/// Fill `{service}`, `{target}` and `{org}` in a template
pub fn render(
    template: &str,
    goal: &str,
    org_name: Option<&str>,
    target_person: Option<&str>,
    default_target: &str,
) -> String {
    let target = target_person
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(default_target);
    let org = org_name
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(DEFAULT_ORG_LABEL);

    template
        .replace("{service}", service_phrase(goal))
        .replace("{target}", target)
        .replace("{org}", org)
}
