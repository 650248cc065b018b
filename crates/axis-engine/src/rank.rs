use serde::{Deserialize, Serialize};

use crate::aggregate::FrequencySummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCount {
    pub symbol: String,
    pub count: u64,
}

impl SymbolCount {
    pub fn new(symbol: impl Into<String>, count: u64) -> Self {
        Self {
            symbol: symbol.into(),
            count,
        }
    }
}

/// `count / total` as a whole percent, rounded half away from zero. Zero when
/// there is nothing to divide by.
pub fn percent_of(count: u64, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

impl FrequencySummary {
    /// All symbols by count descending, ties in first-seen order.
    pub fn ranked(&self) -> Vec<SymbolCount> {
        let mut ranked: Vec<SymbolCount> = self
            .entries()
            .iter()
            .map(|(symbol, count)| SymbolCount::new(symbol.clone(), *count))
            .collect();
        // stable: equal counts keep first-seen order
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }

    pub fn top(&self, k: usize) -> Vec<SymbolCount> {
        let mut ranked = self.ranked();
        ranked.truncate(k);
        ranked
    }

    pub fn top1(&self) -> Option<SymbolCount> {
        if self.total() == 0 {
            return None;
        }
        let mut best: Option<&(String, u64)> = None;
        for entry in self.entries() {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(symbol, count)| SymbolCount::new(symbol.clone(), *count))
    }

    /// Fraction of the window's events carrying `symbol`.
    pub fn share(&self, symbol: &str) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.count(symbol) as f64 / self.total() as f64
    }

    pub fn percent(&self, symbol: &str) -> u32 {
        percent_of(self.count(symbol), self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, Axis};
    use axis_schema::Event;
    use chrono::Utc;

    fn outcomes(labels: &[&str]) -> Vec<Event> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| Event::new(i as i64, Utc::now()).with_outcome(*l))
            .collect()
    }

    #[test]
    fn ties_break_by_first_seen() {
        let window = outcomes(&["C", "A", "B", "A", "B", "A", "B"]);
        let summary = aggregate(&window, Axis::Outcome);
        assert_eq!(
            summary.top(2),
            vec![SymbolCount::new("A", 3), SymbolCount::new("B", 3)]
        );
        assert_eq!(summary.top1(), Some(SymbolCount::new("A", 3)));
    }

    #[test]
    fn top_k_larger_than_distinct_returns_all() {
        let summary = aggregate(&outcomes(&["A", "B"]), Axis::Outcome);
        assert_eq!(summary.top(10).len(), 2);
        assert!(summary.top(0).is_empty());
    }

    #[test]
    fn top1_on_empty_is_none() {
        let summary = aggregate(&[], Axis::Outcome);
        assert_eq!(summary.top1(), None);
        assert_eq!(summary.share("A"), 0.0);
        assert_eq!(summary.percent("A"), 0);
    }

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(2, 3), 67);
        assert_eq!(percent_of(1, 8), 13);
        assert_eq!(percent_of(5, 0), 0);
    }
}
