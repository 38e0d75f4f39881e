//! Weighting schemes for composite scoring.
//!
//! A scheme assigns each scored metric a share of a fixed total (usually
//! 100), together with how the metric is normalized across entities and
//! any bonus adjustments. Schemes are validated before any scoring runs;
//! a scheme whose weights do not add up is rejected, never renormalized.

use crate::models::MetricDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Relative tolerance when comparing the weight sum to the scheme total.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Scale on which bonus points and the normalized share are expressed.
pub const BONUS_SCALE: f64 = 100.0;

/// Configuration errors detected when validating a scheme.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemeError {
    #[error("scheme '{scheme}' weights sum to {actual}, expected {expected}")]
    WeightSumMismatch {
        scheme: String,
        expected: f64,
        actual: f64,
    },

    #[error("scheme '{scheme}' has no weighted metrics")]
    Empty { scheme: String },

    #[error("weight for metric '{metric}' must be a non-negative number, got {weight}")]
    InvalidWeight { metric: String, weight: f64 },

    #[error("metric '{metric}' is weighted but not defined")]
    UnknownMetric { metric: String },

    #[error("metric '{metric}' is weighted more than once")]
    DuplicateMetric { metric: String },

    #[error("absolute ceiling for metric '{metric}' must be positive, got {ceiling}")]
    InvalidCeiling { metric: String, ceiling: f64 },

    #[error("bonus for metric '{metric}' has base share {share}, expected a value in [0, 1]")]
    InvalidShare { metric: String, share: f64 },

    #[error("bonus for metric '{metric}' references undefined metric '{source_metric}'")]
    UnknownBonusSource {
        metric: String,
        source_metric: String,
    },
}

/// How a raw metric value is turned into a ratio in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Divide by the cross-entity maximum, floored at 1.
    #[default]
    Relative,
    /// Divide by a fixed ceiling.
    Absolute { ceiling: f64 },
}

/// Transform applied to a raw value before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    #[default]
    Identity,
    /// `log10(v + 1)`.
    Log10p1,
    /// Square root.
    Sqrt,
}

impl Transform {
    /// Apply the transform; negative inputs clamp to 0 first.
    pub fn apply(self, value: f64) -> f64 {
        let v = value.max(0.0);
        match self {
            Transform::Identity => v,
            Transform::Log10p1 => (v + 1.0).log10(),
            Transform::Sqrt => v.sqrt(),
        }
    }
}

/// Diversity bonus: points per unit of another metric, capped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diversity {
    /// Metric supplying the count (e.g. number of active languages).
    pub metric: String,
    /// Points per counted item.
    pub per_item: f64,
    /// Maximum points awarded.
    pub cap: f64,
}

impl Diversity {
    /// Points awarded for a given count.
    pub fn points(&self, count: f64) -> f64 {
        (count.max(0.0) * self.per_item).min(self.cap).max(0.0)
    }
}

/// Bonus adjustment applied after normalization.
///
/// The normalized ratio contributes `ratio * 100 * base_share` points,
/// bonus points are added on the same 100-point scale, and the result is
/// scaled into the metric's weight and clamped to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bonus {
    /// Fraction of the 100-point scale earned by the normalized value.
    #[serde(default = "default_base_share")]
    pub base_share: f64,
    /// Points added when the raw value is nonzero.
    #[serde(default)]
    pub activity_points: f64,
    /// Optional diversity bonus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diversity: Option<Diversity>,
}

fn default_base_share() -> f64 {
    1.0
}

/// One metric's share of the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedMetric {
    /// Name of the scored metric.
    pub metric: String,
    /// Maximum points this metric contributes.
    pub weight: f64,
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus: Option<Bonus>,
}

impl WeightedMetric {
    /// Creates a relative, untransformed weighted metric.
    pub fn new(metric: &str, weight: f64) -> Self {
        Self {
            metric: metric.to_string(),
            weight,
            normalization: Normalization::Relative,
            transform: Transform::Identity,
            bonus: None,
        }
    }

    /// Uses a fixed ceiling instead of the cross-entity maximum.
    pub fn absolute(mut self, ceiling: f64) -> Self {
        self.normalization = Normalization::Absolute { ceiling };
        self
    }

    /// Applies a transform before normalization.
    pub fn transformed(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Attaches a bonus adjustment.
    pub fn with_bonus(mut self, bonus: Bonus) -> Self {
        self.bonus = Some(bonus);
        self
    }
}

/// A complete weighting scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingScheme {
    /// Scheme name, used in reports and errors.
    #[serde(default = "default_scheme_name")]
    pub name: String,
    /// Value the weights must sum to.
    #[serde(default = "default_total")]
    pub total: f64,
    /// Weighted metrics, in report order.
    #[serde(default)]
    pub weights: Vec<WeightedMetric>,
}

fn default_scheme_name() -> String {
    "custom".to_string()
}

fn default_total() -> f64 {
    100.0
}

impl WeightingScheme {
    /// Creates a scheme with the default total of 100.
    pub fn new(name: &str, weights: Vec<WeightedMetric>) -> Self {
        Self {
            name: name.to_string(),
            total: default_total(),
            weights,
        }
    }

    /// Creates a scheme splitting the total evenly across `metrics`.
    pub fn equal(name: &str, metrics: &[&str]) -> Self {
        let total = default_total();
        let share = if metrics.is_empty() {
            0.0
        } else {
            total / metrics.len() as f64
        };
        Self::new(
            name,
            metrics.iter().map(|m| WeightedMetric::new(m, share)).collect(),
        )
    }

    /// Sum of all weights.
    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    /// Validate the scheme against the available metric definitions.
    pub fn validate(&self, definitions: &[MetricDefinition]) -> Result<(), SchemeError> {
        if self.weights.is_empty() {
            return Err(SchemeError::Empty {
                scheme: self.name.clone(),
            });
        }

        let defined: HashSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        let mut seen = HashSet::new();

        for w in &self.weights {
            if !w.weight.is_finite() || w.weight < 0.0 {
                return Err(SchemeError::InvalidWeight {
                    metric: w.metric.clone(),
                    weight: w.weight,
                });
            }
            if !defined.contains(w.metric.as_str()) {
                return Err(SchemeError::UnknownMetric {
                    metric: w.metric.clone(),
                });
            }
            if !seen.insert(w.metric.as_str()) {
                return Err(SchemeError::DuplicateMetric {
                    metric: w.metric.clone(),
                });
            }
            if let Normalization::Absolute { ceiling } = w.normalization {
                if !ceiling.is_finite() || ceiling <= 0.0 {
                    return Err(SchemeError::InvalidCeiling {
                        metric: w.metric.clone(),
                        ceiling,
                    });
                }
            }
            if let Some(ref bonus) = w.bonus {
                if !(0.0..=1.0).contains(&bonus.base_share) {
                    return Err(SchemeError::InvalidShare {
                        metric: w.metric.clone(),
                        share: bonus.base_share,
                    });
                }
                if let Some(ref diversity) = bonus.diversity {
                    if !defined.contains(diversity.metric.as_str()) {
                        return Err(SchemeError::UnknownBonusSource {
                            metric: w.metric.clone(),
                            source_metric: diversity.metric.clone(),
                        });
                    }
                }
            }
        }

        let actual = self.weight_sum();
        let tolerance = WEIGHT_SUM_TOLERANCE * self.total.abs().max(1.0);
        if (actual - self.total).abs() > tolerance {
            return Err(SchemeError::WeightSumMismatch {
                scheme: self.name.clone(),
                expected: self.total,
                actual,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AggregationKind;

    fn defs(names: &[&str]) -> Vec<MetricDefinition> {
        names
            .iter()
            .map(|n| MetricDefinition::new(n, &[], Some(n), AggregationKind::Sum))
            .collect()
    }

    #[test]
    fn test_valid_scheme() {
        let scheme = WeightingScheme::new(
            "profiles",
            vec![
                WeightedMetric::new("repo", 25.0),
                WeightedMetric::new("lang", 25.0),
                WeightedMetric::new("pr", 25.0),
                WeightedMetric::new("activity", 25.0),
            ],
        );
        assert!(scheme.validate(&defs(&["repo", "lang", "pr", "activity"])).is_ok());
    }

    #[test]
    fn test_weight_sum_mismatch_is_rejected() {
        let scheme = WeightingScheme::new(
            "broken",
            vec![WeightedMetric::new("a", 50.0), WeightedMetric::new("b", 40.0)],
        );
        let err = scheme.validate(&defs(&["a", "b"])).unwrap_err();
        assert_eq!(
            err,
            SchemeError::WeightSumMismatch {
                scheme: "broken".to_string(),
                expected: 100.0,
                actual: 90.0,
            }
        );
        assert!(err.to_string().contains("sum to 90"));
    }

    #[test]
    fn test_equal_scheme_sums_to_total() {
        let scheme = WeightingScheme::equal("even", &["a", "b", "c"]);
        assert!(scheme.validate(&defs(&["a", "b", "c"])).is_ok());
        assert!((scheme.weight_sum() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_and_duplicate_metrics() {
        let scheme = WeightingScheme::new("s", vec![WeightedMetric::new("x", 100.0)]);
        assert!(matches!(
            scheme.validate(&defs(&["a"])),
            Err(SchemeError::UnknownMetric { .. })
        ));

        let scheme = WeightingScheme::new(
            "s",
            vec![WeightedMetric::new("a", 50.0), WeightedMetric::new("a", 50.0)],
        );
        assert!(matches!(
            scheme.validate(&defs(&["a"])),
            Err(SchemeError::DuplicateMetric { .. })
        ));
    }

    #[test]
    fn test_invalid_weight_ceiling_and_bonus() {
        let scheme = WeightingScheme::new(
            "s",
            vec![WeightedMetric::new("a", 120.0), WeightedMetric::new("b", -20.0)],
        );
        assert!(matches!(
            scheme.validate(&defs(&["a", "b"])),
            Err(SchemeError::InvalidWeight { .. })
        ));

        let scheme =
            WeightingScheme::new("s", vec![WeightedMetric::new("a", 100.0).absolute(0.0)]);
        assert!(matches!(
            scheme.validate(&defs(&["a"])),
            Err(SchemeError::InvalidCeiling { .. })
        ));

        let bonus = Bonus {
            base_share: 0.6,
            activity_points: 5.0,
            diversity: Some(Diversity {
                metric: "missing".to_string(),
                per_item: 2.0,
                cap: 10.0,
            }),
        };
        let scheme = WeightingScheme::new("s", vec![WeightedMetric::new("a", 100.0).with_bonus(bonus)]);
        assert!(matches!(
            scheme.validate(&defs(&["a"])),
            Err(SchemeError::UnknownBonusSource { .. })
        ));
    }

    #[test]
    fn test_empty_scheme_is_rejected() {
        let scheme = WeightingScheme::new("none", Vec::new());
        assert!(matches!(
            scheme.validate(&[]),
            Err(SchemeError::Empty { .. })
        ));
    }

    #[test]
    fn test_transforms() {
        assert_eq!(Transform::Identity.apply(4.0), 4.0);
        assert_eq!(Transform::Sqrt.apply(16.0), 4.0);
        assert!((Transform::Log10p1.apply(99.0) - 2.0).abs() < 1e-12);
        assert_eq!(Transform::Sqrt.apply(-4.0), 0.0);
    }

    #[test]
    fn test_diversity_points_capped() {
        let d = Diversity {
            metric: "langs".to_string(),
            per_item: 2.0,
            cap: 10.0,
        };
        assert_eq!(d.points(3.0), 6.0);
        assert_eq!(d.points(8.0), 10.0);
        assert_eq!(d.points(0.0), 0.0);
    }

    #[test]
    fn test_scheme_from_toml() {
        let content = r#"
name = "activity"
total = 100

[[weights]]
metric = "commits"
weight = 40
transform = "log10p1"

[[weights]]
metric = "perDay"
weight = 60
normalization = { absolute = { ceiling = 5.0 } }

[weights.bonus]
base_share = 0.6
activity_points = 5
"#;
        let scheme: WeightingScheme = toml::from_str(content).unwrap();
        assert_eq!(scheme.weights[0].transform, Transform::Log10p1);
        assert_eq!(
            scheme.weights[1].normalization,
            Normalization::Absolute { ceiling: 5.0 }
        );
        assert_eq!(scheme.weights[1].bonus.as_ref().map(|b| b.base_share), Some(0.6));
        assert!(scheme.validate(&defs(&["commits", "perDay"])).is_ok());
    }
}
