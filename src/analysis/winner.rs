//! Per-metric and overall winner determination.
//!
//! For each tracked metric the strict best entity wins; ties and
//! non-positive tops produce no winner. Wins are then tallied and an
//! overall winner is declared only for a unique, nonzero top tally.

use crate::models::EntityMetrics;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Relative tolerance under which two metric values are considered tied.
const TIE_EPSILON: f64 = 1e-9;

/// Winner of one tracked metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWinner {
    /// Metric name.
    pub metric: String,
    /// Winning entity, or `None` on a tie or a non-positive top value.
    pub winner: Option<String>,
    /// Top value observed for the metric.
    pub top_value: f64,
}

/// Number of metrics an entity won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub entity: String,
    pub wins: usize,
}

/// Result of a winner decision.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WinnerDecision {
    /// Per-metric winners, in tracked order.
    pub metric_winners: Vec<MetricWinner>,
    /// Win counts per entity, in input order.
    pub tallies: Vec<Tally>,
    /// Overall winner, or `None` on a shared or zero top tally.
    pub overall_winner: Option<String>,
}

impl WinnerDecision {
    /// Returns the winner of a metric (`None` also when the metric is not tracked).
    pub fn winner_of(&self, metric: &str) -> Option<&str> {
        self.metric_winners
            .iter()
            .find(|m| m.metric == metric)
            .and_then(|m| m.winner.as_deref())
    }

    /// Returns the number of metrics won by an entity.
    pub fn wins_of(&self, entity: &str) -> usize {
        self.tallies
            .iter()
            .find(|t| t.entity == entity)
            .map(|t| t.wins)
            .unwrap_or(0)
    }
}

/// Whether `value` is within the tie tolerance of `top`.
///
/// Integral values (counts) tie only when exactly equal.
fn ties_with(value: f64, top: f64) -> bool {
    if value.fract() == 0.0 && top.fract() == 0.0 {
        return value == top;
    }
    (value - top).abs() <= TIE_EPSILON * top.abs().max(1.0)
}

/// Decide the winner of one metric.
fn decide_metric(entities: &[EntityMetrics], metric: &str) -> MetricWinner {
    let mut values: Vec<(&str, f64)> = entities
        .iter()
        .map(|e| (e.entity.as_str(), e.metrics.get(metric)))
        .collect();
    values.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let Some(&(leader, top)) = values.first() else {
        return MetricWinner {
            metric: metric.to_string(),
            winner: None,
            top_value: 0.0,
        };
    };

    let holders = values.iter().filter(|(_, v)| ties_with(*v, top)).count();
    let winner = if top <= 0.0 || holders > 1 {
        None
    } else {
        Some(leader.to_string())
    };

    MetricWinner {
        metric: metric.to_string(),
        winner,
        top_value: top,
    }
}

/// Decide per-metric winners, tally wins and pick an overall winner.
///
/// Fewer than two entities is a degenerate comparison with no winners.
pub fn decide_winners(entities: &[EntityMetrics], tracked: &[String]) -> WinnerDecision {
    let degenerate = entities.len() < 2;

    let metric_winners: Vec<MetricWinner> = tracked
        .iter()
        .map(|metric| {
            let mut decided = decide_metric(entities, metric);
            if degenerate {
                decided.winner = None;
            }
            debug!("{}: winner {:?}", metric, decided.winner);
            decided
        })
        .collect();

    let tallies: Vec<Tally> = entities
        .iter()
        .map(|e| Tally {
            entity: e.entity.clone(),
            wins: metric_winners
                .iter()
                .filter(|m| m.winner.as_deref() == Some(e.entity.as_str()))
                .count(),
        })
        .collect();

    let top_tally = tallies.iter().map(|t| t.wins).max().unwrap_or(0);
    let mut leaders = tallies.iter().filter(|t| t.wins == top_tally);
    let overall_winner = match (leaders.next(), leaders.next()) {
        (Some(only), None) if top_tally > 0 => Some(only.entity.clone()),
        _ => None,
    };

    WinnerDecision {
        metric_winners,
        tallies,
        overall_winner,
    }
}
