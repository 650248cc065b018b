//! Aggregation and health analysis over windows of logged reps.
//!
//! Everything here is synchronous and pure: hand in a slice of events, get
//! back counts, rankings and verdicts. Nothing is cached between calls.

pub mod aggregate;
pub mod config;
pub mod health;
pub mod rank;
pub mod recap;
pub mod suggest;
pub mod transfer;

pub use aggregate::*;
pub use config::*;
pub use health::*;
pub use rank::*;
pub use recap::{Recap, RankedShare};
pub use suggest::*;
pub use transfer::*;

use axis_schema::Event;

/// Configured entry point shared by every front end.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    health: HealthEvaluator,
    suggestions: SuggestionMap,
}

impl Engine {
    pub fn new(config: EngineConfig, suggestions: SuggestionMap) -> Self {
        Self {
            health: HealthEvaluator::new(config),
            suggestions,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.health.config()
    }

    pub fn suggestions(&self) -> &SuggestionMap {
        &self.suggestions
    }

    pub fn summarize(&self, window: &[Event], axis: Axis) -> FrequencySummary {
        aggregate(window, axis)
    }

    pub fn evaluate(&self, window: &[Event]) -> HealthVerdict {
        self.health.evaluate(window)
    }

    pub fn transfer(&self, practice: &[Event], game: &[Event], outcome: &str) -> TransferInsight {
        transfer_insight(practice, game, outcome, self.config())
    }

    pub fn recap(&self, window: &[Event]) -> Recap {
        let k = self.config().top_k();
        let outcomes = aggregate(window, Axis::Outcome);
        let tags = aggregate(window, Axis::Tags);
        let constraints = aggregate(window, Axis::Constraints);

        let top_outcome = recap::ranked_shares(&outcomes, 1).into_iter().next();
        let last_event = recap::latest(window).cloned();
        let next_constraint = last_event
            .as_ref()
            .and_then(|e| e.outcome.as_deref())
            .map(|label| self.suggestions.suggest(label).to_string());

        Recap {
            total: window.len(),
            outcomes: recap::ranked_shares(&outcomes, k),
            tags: recap::ranked_shares(&tags, k),
            constraints: recap::ranked_shares(&constraints, k),
            top_outcome,
            health: self.health.evaluate(window),
            last_event,
            next_constraint,
        }
    }
}
