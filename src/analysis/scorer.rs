//! Cross-entity normalization and composite scoring.
//!
//! Each weighted metric is normalized against the other entities in the
//! same comparison (or against a fixed ceiling), scaled into its weight
//! and summed into a composite total used for ranking.

use super::scheme::{Normalization, SchemeError, WeightedMetric, WeightingScheme, BONUS_SCALE};
use crate::models::{EntityMetrics, MetricDefinition};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// One metric's contribution to an entity's composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    /// Metric name.
    pub metric: String,
    /// Aggregated raw value.
    pub raw: f64,
    /// Normalized ratio in [0, 1].
    pub normalized: f64,
    /// Bonus points awarded (on the 100-point bonus scale).
    pub bonus: f64,
    /// Points contributed, in [0, weight].
    pub score: f64,
    /// Ceiling of this sub-score.
    pub weight: f64,
}

/// Composite score of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Entity identifier.
    pub entity: String,
    /// Per-metric sub-scores, in scheme order.
    pub sub_scores: Vec<SubScore>,
    /// Sum of all sub-scores.
    pub total: f64,
}

impl CompositeScore {
    /// Returns the sub-score for a metric, if it is part of the scheme.
    pub fn sub_score(&self, metric: &str) -> Option<&SubScore> {
        self.sub_scores.iter().find(|s| s.metric == metric)
    }
}

/// Score every entity under a validated weighting scheme.
///
/// Returns scores in input order; use [`rank`] to order them.
pub fn score(
    entities: &[EntityMetrics],
    scheme: &WeightingScheme,
    definitions: &[MetricDefinition],
) -> Result<Vec<CompositeScore>, SchemeError> {
    scheme.validate(definitions)?;

    let denominators: Vec<f64> = scheme
        .weights
        .iter()
        .map(|w| denominator(entities, w))
        .collect();

    let scores = entities
        .iter()
        .map(|e| {
            let sub_scores: Vec<SubScore> = scheme
                .weights
                .iter()
                .zip(&denominators)
                .map(|(w, denom)| sub_score(e, w, *denom))
                .collect();
            let total = sub_scores.iter().map(|s| s.score).sum();

            debug!("{} scored {:.2} under {}", e.entity, total, scheme.name);
            CompositeScore {
                entity: e.entity.clone(),
                sub_scores,
                total,
            }
        })
        .collect();

    Ok(scores)
}

/// Order scores by total, highest first; equal totals keep input order.
pub fn rank(mut scores: Vec<CompositeScore>) -> Vec<CompositeScore> {
    scores.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    scores
}

/// Denominator for one weighted metric across all entities, floored at 1.
fn denominator(entities: &[EntityMetrics], weighted: &WeightedMetric) -> f64 {
    match weighted.normalization {
        Normalization::Absolute { ceiling } => ceiling,
        Normalization::Relative => entities
            .iter()
            .map(|e| weighted.transform.apply(e.metrics.get(&weighted.metric)))
            .fold(1.0, f64::max),
    }
}

fn sub_score(entity: &EntityMetrics, weighted: &WeightedMetric, denom: f64) -> SubScore {
    let raw = entity.metrics.get(&weighted.metric);
    let normalized = (weighted.transform.apply(raw) / denom).clamp(0.0, 1.0);
    let weight = weighted.weight;

    let (bonus, unclamped) = match weighted.bonus {
        None => (0.0, normalized * weight),
        Some(ref b) => {
            let mut points = 0.0;
            if raw != 0.0 {
                points += b.activity_points;
            }
            if let Some(ref diversity) = b.diversity {
                points += diversity.points(entity.metrics.get(&diversity.metric));
            }
            let scaled = (normalized * BONUS_SCALE * b.base_share + points) / BONUS_SCALE;
            (points, scaled * weight)
        }
    };

    SubScore {
        metric: weighted.metric.clone(),
        raw,
        normalized,
        bonus,
        score: unclamped.clamp(0.0, weight),
        weight,
    }
}
