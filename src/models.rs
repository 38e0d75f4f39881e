//! Data models for the comparison engine.
//!
//! This module contains the core data structures shared by the aggregator,
//! the scorer and the winner decider: raw record trees, metric definitions,
//! filters and the aggregated metric sets.

use crate::analysis::{CompositeScore, WinnerDecision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Filter value that selects every record.
pub const MATCH_ALL: &str = "All";

/// Placeholder in a metric field name replaced by the active filter value.
pub const FILTER_PLACEHOLDER: &str = "{filter}";

/// Collection name under which a filter targets the entity root itself.
pub const ROOT_COLLECTION: &str = "";

/// A single raw field on a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric value (counts, scores, durations).
    Number(f64),
    /// Boolean flag.
    Flag(bool),
    /// Categorical or free text value.
    Text(String),
    /// List of categorical values (e.g. all languages of a repository).
    List(Vec<String>),
}

impl FieldValue {
    /// Coerce this value to a finite number.
    ///
    /// Numeric text parses, flags map to 1/0, anything else is 0.
    pub fn as_number(&self) -> f64 {
        let n = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Flag(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            FieldValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            FieldValue::List(_) => 0.0,
        };

        if n.is_finite() {
            n
        } else {
            0.0
        }
    }

    /// Returns the categorical values carried by this field.
    pub fn tags(&self) -> Vec<&str> {
        match self {
            FieldValue::Text(s) => vec![s.as_str()],
            FieldValue::List(items) => items.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether this field carries the given tag (case-insensitive).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Scalar fields of a record, keyed by (possibly dotted) field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// One unit of raw evidence about an entity.
///
/// Records form a tree: a commit may carry named collections of
/// function-level analyses, a repository may carry its commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
pub enum RecordNode {
    /// Record without nested collections.
    Leaf { fields: Fields },
    /// Record with named sub-collections.
    Composite {
        fields: Fields,
        children: BTreeMap<String, Vec<RecordNode>>,
    },
}

impl Default for RecordNode {
    fn default() -> Self {
        RecordNode::Leaf {
            fields: Fields::new(),
        }
    }
}

impl RecordNode {
    /// Creates a leaf record from its fields.
    pub fn leaf(fields: Fields) -> Self {
        RecordNode::Leaf { fields }
    }

    /// Creates a composite record, collapsing to a leaf if it has no collections.
    pub fn composite(fields: Fields, children: BTreeMap<String, Vec<RecordNode>>) -> Self {
        if children.is_empty() {
            RecordNode::leaf(fields)
        } else {
            RecordNode::Composite { fields, children }
        }
    }

    /// Returns the scalar fields of this record.
    pub fn fields(&self) -> &Fields {
        match self {
            RecordNode::Leaf { fields } | RecordNode::Composite { fields, .. } => fields,
        }
    }

    /// Returns a field by name, if present.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields().get(name)
    }

    /// Returns a field coerced to a number; absent fields read as 0.
    pub fn number(&self, name: &str) -> f64 {
        self.field(name).map(FieldValue::as_number).unwrap_or(0.0)
    }

    /// Returns the named sub-collection; absent or leaf records yield an empty slice.
    pub fn children(&self, collection: &str) -> &[RecordNode] {
        match self {
            RecordNode::Composite { children, .. } => {
                children.get(collection).map(Vec::as_slice).unwrap_or(&[])
            }
            RecordNode::Leaf { .. } => &[],
        }
    }
}

/// The unit being compared (a developer or a repository).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier of the entity (username, repository name).
    pub id: String,
    /// Root record holding entity-level fields and top-level collections.
    pub root: RecordNode,
}

impl Entity {
    /// Creates a new entity.
    pub fn new(id: impl Into<String>, root: RecordNode) -> Self {
        Self {
            id: id.into(),
            root,
        }
    }
}

/// How the extracted values of a metric are reduced to one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    /// Arithmetic sum of the field.
    Sum,
    /// Maximum of the field, 0 when nothing matches.
    Max,
    /// Number of matching records.
    Count,
    /// Sum divided by count, 0 when nothing matches.
    Average,
    /// Number of distinct non-empty categorical values of the field.
    Distinct,
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationKind::Sum => write!(f, "sum"),
            AggregationKind::Max => write!(f, "max"),
            AggregationKind::Count => write!(f, "count"),
            AggregationKind::Average => write!(f, "average"),
            AggregationKind::Distinct => write!(f, "distinct"),
        }
    }
}

/// Definition of one tracked metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Unique metric name.
    pub name: String,
    /// Collection selectors walked from the entity root.
    ///
    /// A selector may list sibling collections separated by `|`.
    #[serde(default)]
    pub path: Vec<String>,
    /// Field read at the final level (unused for `count`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Aggregation applied to the extracted values.
    pub kind: AggregationKind,
    /// Activity gate.
    ///
    /// For `distinct`, a category counts only when this field is positive,
    /// with `{filter}` replaced by the category. For `average`, only records
    /// where it is positive count toward the divisor (at least 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_field: Option<String>,
}

impl MetricDefinition {
    /// Creates a new metric definition.
    pub fn new(name: &str, path: &[&str], field: Option<&str>, kind: AggregationKind) -> Self {
        Self {
            name: name.to_string(),
            path: path.iter().map(|s| s.to_string()).collect(),
            field: field.map(String::from),
            kind,
            active_field: None,
        }
    }

    /// Gates the metric on a positive activity field.
    pub fn with_active_field(mut self, field: &str) -> Self {
        self.active_field = Some(field.to_string());
        self
    }
}

/// Categorical filter applied at one collection level.
///
/// An empty collection name ([`ROOT_COLLECTION`]) filters whole entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagFilter {
    /// Name of the collection whose records carry the tag.
    pub collection: String,
    /// Tag fields checked on those records; any may match.
    pub fields: Vec<String>,
    /// Selected value; `None` matches everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl TagFilter {
    /// Creates a filter; a value of `All` (any case) or empty matches everything.
    pub fn new(collection: &str, fields: &[&str], value: Option<&str>) -> Self {
        Self {
            collection: collection.to_string(),
            fields: fields.iter().map(|s| s.to_string()).collect(),
            value: normalize_selection(value),
        }
    }

    /// A filter that admits every record.
    pub fn match_all() -> Self {
        Self {
            collection: String::new(),
            fields: Vec::new(),
            value: None,
        }
    }

    /// Returns a copy of this filter with a new selected value.
    pub fn with_value(&self, value: Option<&str>) -> Self {
        Self {
            value: normalize_selection(value),
            ..self.clone()
        }
    }

    /// Whether this filter admits every record.
    pub fn is_match_all(&self) -> bool {
        self.value.is_none()
    }

    /// Whether a record found in `collection` passes the filter.
    pub fn admits(&self, collection: &str, record: &RecordNode) -> bool {
        let Some(ref value) = self.value else {
            return true;
        };

        if collection != self.collection {
            return true;
        }

        self.fields
            .iter()
            .filter_map(|f| record.field(f))
            .any(|v| v.has_tag(value))
    }

    /// Human-readable label of the active selection.
    pub fn label(&self) -> &str {
        match self.value {
            Some(ref value) => value,
            None => MATCH_ALL,
        }
    }
}

impl Default for TagFilter {
    fn default() -> Self {
        Self::match_all()
    }
}

fn normalize_selection(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(MATCH_ALL))
        .map(String::from)
}

/// Aggregated scalar values of one entity, keyed by metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet {
    values: BTreeMap<String, f64>,
}

impl MetricSet {
    /// Creates an empty metric set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a metric value; non-finite values are stored as 0.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let value = if value.is_finite() { value } else { 0.0 };
        self.values.insert(name.into(), value);
    }

    /// Returns a metric value; absent metrics read as 0.
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// Iterates metrics in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut set = MetricSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

/// Metric set of one entity, tagged with its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetrics {
    /// Entity identifier.
    pub entity: String,
    /// Aggregated metric values.
    pub metrics: MetricSet,
}

impl EntityMetrics {
    /// Creates a new entity metric set.
    pub fn new(entity: impl Into<String>, metrics: MetricSet) -> Self {
        Self {
            entity: entity.into(),
            metrics,
        }
    }
}

/// Metadata about a comparison report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Date and time of the comparison.
    pub generated_at: DateTime<Utc>,
    /// Scoring profile used.
    pub profile: String,
    /// Weighting scheme used.
    pub scheme: String,
    /// Active filter selection.
    pub filter: String,
    /// Number of entities compared.
    pub entities: usize,
    /// Duration of the comparison in seconds.
    pub duration_seconds: f64,
}

/// The complete comparison report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Metadata about the report.
    pub metadata: ReportMetadata,
    /// Composite scores, highest total first.
    pub ranking: Vec<CompositeScore>,
    /// Aggregated metric sets, in input order.
    pub metrics: Vec<EntityMetrics>,
    /// Per-metric and overall winners.
    pub decision: WinnerDecision,
}

impl ComparisonReport {
    /// Whether the comparison had fewer than two entities.
    pub fn is_degenerate(&self) -> bool {
        self.metrics.len() < 2
    }
}
