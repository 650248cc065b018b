use axis_schema::Event;
use serde::{Deserialize, Serialize};

use crate::aggregate::FrequencySummary;
use crate::health::HealthVerdict;
use crate::rank::percent_of;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedShare {
    pub symbol: String,
    pub count: u64,
    pub percent: u32,
}

/// Everything the recap view shows for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recap {
    pub total: usize,
    pub outcomes: Vec<RankedShare>,
    pub tags: Vec<RankedShare>,
    pub constraints: Vec<RankedShare>,
    pub top_outcome: Option<RankedShare>,
    pub health: HealthVerdict,
    pub last_event: Option<Event>,
    /// Suggested from the last event's outcome label
    pub next_constraint: Option<String>,
}

pub(crate) fn ranked_shares(summary: &FrequencySummary, k: usize) -> Vec<RankedShare> {
    summary
        .top(k)
        .into_iter()
        .map(|sc| RankedShare {
            percent: percent_of(sc.count, summary.total()),
            symbol: sc.symbol,
            count: sc.count,
        })
        .collect()
}

/// Latest by timestamp; a later position wins a timestamp tie.
pub(crate) fn latest(window: &[Event]) -> Option<&Event> {
    window.iter().max_by_key(|event| event.created_at)
}
