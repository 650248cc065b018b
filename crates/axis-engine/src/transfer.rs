use axis_schema::Event;
use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate, Axis};
use crate::config::EngineConfig;

// absorbs float noise so a drop exactly equal to the gap still transfers
const GAP_EPSILON: f64 = 1e-9;

/// Whether an outcome practiced under a constraint shows up in games too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TransferInsight {
    Insufficient {
        practice_total: usize,
        game_total: usize,
    },
    Transferring {
        outcome: String,
        practice_percent: u32,
        game_percent: u32,
    },
    NotTransferring {
        outcome: String,
        practice_percent: u32,
        game_percent: u32,
        message: String,
    },
}

pub fn transfer_insight(
    practice: &[Event],
    game: &[Event],
    outcome: &str,
    config: &EngineConfig,
) -> TransferInsight {
    let min = config.min_sample_size().max(1);
    if practice.len() < min || game.len() < min {
        return TransferInsight::Insufficient {
            practice_total: practice.len(),
            game_total: game.len(),
        };
    }

    let practice_summary = aggregate(practice, Axis::Outcome);
    let game_summary = aggregate(game, Axis::Outcome);
    let practice_share = practice_summary.share(outcome);
    let game_share = game_summary.share(outcome);
    let practice_percent = practice_summary.percent(outcome);
    let game_percent = game_summary.percent(outcome);

    if practice_share - game_share <= config.transfer_gap() + GAP_EPSILON {
        TransferInsight::Transferring {
            outcome: outcome.to_string(),
            practice_percent,
            game_percent,
        }
    } else {
        TransferInsight::NotTransferring {
            outcome: outcome.to_string(),
            practice_percent,
            game_percent,
            message: format!(
                "{outcome} shows up in {practice_percent}% of practice reps but only {game_percent}% of game reps: bring game pressure into the practice constraint"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reps(good: usize, total: usize) -> Vec<Event> {
        (0..total)
            .map(|i| {
                let outcome = if i < good { "GOOD" } else { "MISS" };
                Event::new(i as i64, Utc::now()).with_outcome(outcome)
            })
            .collect()
    }

    #[test]
    fn small_windows_are_insufficient() {
        let insight = transfer_insight(&reps(9, 9), &reps(5, 20), "GOOD", &EngineConfig::default());
        assert_eq!(
            insight,
            TransferInsight::Insufficient {
                practice_total: 9,
                game_total: 20
            }
        );
    }

    #[test]
    fn drop_equal_to_gap_still_transfers() {
        let insight = transfer_insight(&reps(8, 10), &reps(6, 10), "GOOD", &EngineConfig::default());
        assert!(matches!(insight, TransferInsight::Transferring { game_percent: 60, .. }));
    }

    #[test]
    fn large_drop_does_not_transfer() {
        let insight = transfer_insight(&reps(9, 10), &reps(3, 10), "GOOD", &EngineConfig::default());
        match insight {
            TransferInsight::NotTransferring { message, .. } => {
                assert!(message.contains("90%"));
                assert!(message.contains("30%"));
            }
            other => panic!("unexpected insight: {other:?}"),
        }
    }
}
