use axis_schema::Event;
use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate, Axis};
use crate::config::EngineConfig;
use crate::rank::percent_of;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthVerdict {
    pub status: HealthStatus,
    pub flags: Vec<String>,
    pub suggestions: Vec<String>,
    /// Set when the window was below `min_sample_size` and no rule ran.
    #[serde(default)]
    pub insufficient_data: bool,
}

impl HealthVerdict {
    pub fn insufficient() -> Self {
        Self {
            status: HealthStatus::Ok,
            flags: Vec::new(),
            suggestions: Vec::new(),
            insufficient_data: true,
        }
    }

    pub fn is_warn(&self) -> bool {
        self.status == HealthStatus::Warn
    }
}

/// Flags windows where the constraint has collapsed into one repetitive
/// outcome or one repeating tag pattern.
#[derive(Debug, Clone, Default)]
pub struct HealthEvaluator {
    config: EngineConfig,
}

impl HealthEvaluator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluate(&self, window: &[Event]) -> HealthVerdict {
        let total = window.len();
        if total == 0 || total < self.config.min_sample_size() {
            return HealthVerdict::insufficient();
        }

        let mut flags = Vec::new();
        let mut suggestions = Vec::new();

        let outcomes = aggregate(window, Axis::Outcome);
        if let Some(top) = outcomes.top1() {
            let share = top.count as f64 / total as f64;
            let pct = percent_of(top.count, total);
            if share >= self.config.high_concentration_threshold() {
                flags.push(format!(
                    "{} is {}% of the last {} reps: the constraint is collapsing into one result",
                    top.symbol, pct, total
                ));
                suggestions.push(
                    "Widen variability: change the setup or remove one restriction.".to_string(),
                );
            } else if share >= self.config.moderate_concentration_threshold() {
                flags.push(format!(
                    "{} is trending high at {}% of the last {} reps",
                    top.symbol, pct, total
                ));
                suggestions
                    .push("Add a new cue or rule so a second option shows up.".to_string());
            }
        }

        let tags = aggregate(window, Axis::Tags);
        let diversity = tags.distinct() as f64 / total as f64;
        if diversity < self.config.min_tag_diversity_ratio() {
            flags.push(format!(
                "Same pattern repeating: {} distinct tag(s) across {} reps",
                tags.distinct(),
                total
            ));
            suggestions.push(
                "Introduce a second independent constraint dimension (space or time) instead of adding more rules."
                    .to_string(),
            );
        }

        let status = if flags.is_empty() {
            HealthStatus::Ok
        } else {
            tracing::debug!(total, flags = flags.len(), "window flagged");
            HealthStatus::Warn
        };

        HealthVerdict {
            status,
            flags,
            suggestions,
            insufficient_data: false,
        }
    }
}

pub fn evaluate(window: &[Event], config: &EngineConfig) -> HealthVerdict {
    HealthEvaluator::new(config.clone()).evaluate(window)
}
