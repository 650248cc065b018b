use std::collections::HashMap;

use axis_schema::Event;
use serde::{Deserialize, Serialize};

/// Which countable key set of an event to tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Outcome,
    Tags,
    Constraints,
}

impl Axis {
    pub fn keys(self, event: &Event) -> Vec<&str> {
        match self {
            Axis::Outcome => event.outcome.as_deref().into_iter().collect(),
            Axis::Tags => event.tags.iter().map(String::as_str).collect(),
            Axis::Constraints => event.constraint_labels.iter().map(String::as_str).collect(),
        }
    }
}

/// Symbol tallies over one window.
///
/// Entries are stored in first-seen order, which is what ranking uses to
/// break ties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencySummary {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
    total: usize,
}

impl FrequencySummary {
    /// Number of events that contributed, whether or not they carried a key.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of symbols with a nonzero count.
    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, symbol: &str) -> u64 {
        self.index
            .get(symbol)
            .map(|&i| self.entries[i].1)
            .unwrap_or(0)
    }

    /// `(symbol, count)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(s, c)| (s.as_str(), *c))
    }

    /// Summary of `self` followed by `other`, as if both windows were
    /// concatenated.
    pub fn merge(&self, other: &FrequencySummary) -> FrequencySummary {
        let mut merged = self.clone();
        for (symbol, count) in other.iter() {
            merged.bump(symbol, count);
        }
        merged.total += other.total;
        merged
    }

    pub(crate) fn entries(&self) -> &[(String, u64)] {
        &self.entries
    }

    fn bump(&mut self, symbol: &str, by: u64) {
        match self.index.get(symbol) {
            Some(&i) => self.entries[i].1 += by,
            None => {
                self.index.insert(symbol.to_string(), self.entries.len());
                self.entries.push((symbol.to_string(), by));
            }
        }
    }
}

pub fn aggregate(window: &[Event], axis: Axis) -> FrequencySummary {
    aggregate_by(window, |event| axis.keys(event))
}

/// Tally whatever `extract` yields per event. A symbol repeated within one
/// event is counted once for that event.
pub fn aggregate_by<'a, F, I>(window: &'a [Event], extract: F) -> FrequencySummary
where
    F: Fn(&'a Event) -> I,
    I: IntoIterator<Item = &'a str>,
{
    let mut summary = FrequencySummary {
        total: window.len(),
        ..FrequencySummary::default()
    };
    let mut seen: Vec<&str> = Vec::new();
    for event in window {
        seen.clear();
        for symbol in extract(event) {
            if symbol.is_empty() || seen.contains(&symbol) {
                continue;
            }
            seen.push(symbol);
            summary.bump(symbol, 1);
        }
    }
    summary
}
