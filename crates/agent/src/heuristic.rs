//! Keyword heuristic for menu navigation
//!
//! Used whenever the reasoning service is unavailable, slow, or returns
//! something unusable. Every option is placed in a match tier against the
//! caller's goal; the option confidence breaks ties between tiers.

use ivr_agent_core::{Decision, DecisionContext, MenuOption};

use crate::keywords::{
    categories_in, meaningful_words, mentions, mentions_any, ADMINISTRATIVE_TERMS, AVOID_TERMS,
    GOAL_CATEGORIES, ROUTING_TERMS,
};

/// How well an option description matches the goal, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    /// Area the caller should not enter (patients, billing, emergencies)
    Avoid,
    Unmatched,
    /// Operator, directory or receptionist
    Acceptable,
    /// Administrative office
    Good,
    /// Goal keywords overlap
    VeryGood,
    /// Same category as the goal
    Excellent,
    /// Goal phrase and description name the same thing
    Perfect,
}

impl MatchTier {
    pub fn score(&self) -> f32 {
        match self {
            MatchTier::Perfect => 100.0,
            MatchTier::Excellent => 90.0,
            MatchTier::VeryGood => 80.0,
            MatchTier::Good => 70.0,
            MatchTier::Acceptable => 60.0,
            MatchTier::Unmatched => 30.0,
            MatchTier::Avoid => -10.0,
        }
    }

    /// Confidence reported on the resulting decision
    pub fn confidence(&self) -> f32 {
        match self {
            MatchTier::Perfect => 0.9,
            MatchTier::Excellent => 0.8,
            MatchTier::VeryGood => 0.7,
            MatchTier::Good => 0.6,
            MatchTier::Acceptable => 0.5,
            MatchTier::Unmatched => 0.3,
            MatchTier::Avoid => 0.1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchTier::Perfect => "perfect",
            MatchTier::Excellent => "excellent",
            MatchTier::VeryGood => "very good",
            MatchTier::Good => "good",
            MatchTier::Acceptable => "acceptable",
            MatchTier::Unmatched => "unmatched",
            MatchTier::Avoid => "avoid",
        }
    }
}

/// Deterministic option scorer
pub struct HeuristicScorer;

impl HeuristicScorer {
    /// Place one option description in a tier for `goal`
    pub fn classify(goal: &str, description: &str) -> MatchTier {
        let avoided = AVOID_TERMS
            .iter()
            .any(|term| mentions(description, term) && !Self::goal_targets(goal, term));
        if avoided {
            return MatchTier::Avoid;
        }

        let goal_words = meaningful_words(goal);
        let description_words = meaningful_words(description);

        if Self::is_phrase_match(goal, description, &goal_words, &description_words) {
            return MatchTier::Perfect;
        }

        let goal_categories = categories_in(goal, GOAL_CATEGORIES);
        if categories_in(description, GOAL_CATEGORIES)
            .iter()
            .any(|c| goal_categories.contains(c))
        {
            return MatchTier::Excellent;
        }

        if description_words.iter().any(|w| goal_words.contains(w)) {
            return MatchTier::VeryGood;
        }

        if mentions_any(description, ADMINISTRATIVE_TERMS) {
            return MatchTier::Good;
        }

        if mentions_any(description, ROUTING_TERMS) {
            return MatchTier::Acceptable;
        }

        MatchTier::Unmatched
    }

    /// Tier score plus a confidence bonus
    pub fn score(goal: &str, option: &MenuOption) -> f32 {
        Self::classify(goal, &option.description).score() + option.confidence * 10.0
    }

    /// Pick the best option for `goal`
    ///
    /// Ties go to the option heard first. `None` only for an empty menu.
    pub fn choose(goal: &str, options: &[MenuOption]) -> Option<Decision> {
        let mut best: Option<(&MenuOption, MatchTier, f32)> = None;

        for option in options {
            let tier = Self::classify(goal, &option.description);
            let score = tier.score() + option.confidence * 10.0;
            if best.map_or(true, |(_, _, top)| score > top) {
                best = Some((option, tier, score));
            }
        }

        best.map(|(option, tier, score)| {
            tracing::debug!(
                key = %option.key,
                tier = tier.label(),
                score,
                "Heuristic selected option"
            );
            Decision::press(
                option.key.clone(),
                format!(
                    "Heuristic {} match: '{}' for goal '{}'",
                    tier.label(),
                    option.description,
                    goal
                ),
                tier.confidence(),
            )
        })
    }

    pub fn decide(context: &DecisionContext) -> Option<Decision> {
        Self::choose(&context.goal, &context.options)
    }

    /// Does the goal itself aim at the area named by `term`?
    fn goal_targets(goal: &str, term: &str) -> bool {
        if mentions(goal, term) {
            return true;
        }
        let goal_categories = categories_in(goal, GOAL_CATEGORIES);
        categories_in(term, GOAL_CATEGORIES)
            .iter()
            .any(|c| goal_categories.contains(c))
    }

    fn is_phrase_match(
        goal: &str,
        description: &str,
        goal_words: &[String],
        description_words: &[String],
    ) -> bool {
        // The whole description appears in the goal ("support" in "technical support")
        if !description_words.is_empty() && mentions(goal, &description_words.join(" ")) {
            return true;
        }

        // Any two consecutive goal words appear in the description
        goal_words
            .windows(2)
            .any(|pair| mentions(description, &pair.join(" ")))
    }
}
