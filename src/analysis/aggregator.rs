//! Metric aggregation over nested record trees.
//!
//! This module reduces each entity's record tree to a [`MetricSet`],
//! honoring the active [`TagFilter`]. Aggregation is a pure function of
//! the records, the filter and the metric definitions.

use crate::models::{
    AggregationKind, Entity, EntityMetrics, FieldValue, MetricDefinition, MetricSet, RecordNode,
    TagFilter, FILTER_PLACEHOLDER, ROOT_COLLECTION,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Separator between sibling collections in one path selector.
const SIBLING_SEPARATOR: char = '|';

/// Aggregate one entity into a metric set.
pub fn aggregate(
    entity: &Entity,
    filter: &TagFilter,
    definitions: &[MetricDefinition],
) -> MetricSet {
    let mut set = MetricSet::new();
    let root_admitted = filter.admits(ROOT_COLLECTION, &entity.root);
    if !root_admitted {
        debug!("{} excluded by filter {}", entity.id, filter.label());
    }

    for definition in definitions {
        let mut matched: Vec<&RecordNode> = Vec::new();
        if root_admitted {
            collect_records(&entity.root, &definition.path, filter, &mut matched);
        }

        let value = reduce(&matched, definition, filter);
        debug!(
            "{}: {} = {} over {} records",
            entity.id,
            definition.name,
            value,
            matched.len()
        );
        set.insert(definition.name.clone(), value);
    }

    set
}

/// Aggregate every entity independently, preserving input order.
pub fn aggregate_all(
    entities: &[Entity],
    filter: &TagFilter,
    definitions: &[MetricDefinition],
) -> Vec<EntityMetrics> {
    entities
        .iter()
        .map(|e| EntityMetrics::new(e.id.clone(), aggregate(e, filter, definitions)))
        .collect()
}

/// Walk `path` from `node`, collecting the records that survive the filter.
///
/// `node` itself is assumed to have passed the filter already.
fn collect_records<'a>(
    node: &'a RecordNode,
    path: &[String],
    filter: &TagFilter,
    out: &mut Vec<&'a RecordNode>,
) {
    let Some((selector, rest)) = path.split_first() else {
        out.push(node);
        return;
    };

    for collection in selector.split(SIBLING_SEPARATOR).map(str::trim) {
        for child in node.children(collection) {
            if filter.admits(collection, child) {
                collect_records(child, rest, filter, out);
            }
        }
    }
}

/// Field name selector resolved against the active filter.
enum FieldSelector<'a> {
    Exact(String),
    /// Placeholder replaced by the filter value; the key matches ignoring case.
    Substituted(String),
    Prefixed { prefix: &'a str, suffix: &'a str },
}

impl<'a> FieldSelector<'a> {
    fn resolve(field: &'a str, filter: &TagFilter) -> Self {
        match field.split_once(FILTER_PLACEHOLDER) {
            None => FieldSelector::Exact(field.to_string()),
            Some((prefix, suffix)) => match filter.value {
                Some(ref value) => {
                    FieldSelector::Substituted(format!("{}{}{}", prefix, value, suffix))
                }
                None => FieldSelector::Prefixed { prefix, suffix },
            },
        }
    }

    fn number(&self, record: &RecordNode) -> f64 {
        match self {
            FieldSelector::Exact(name) => record.number(name),
            FieldSelector::Substituted(name) => {
                substituted_field(record, name).map_or(0.0, FieldValue::as_number)
            }
            FieldSelector::Prefixed { prefix, suffix } => record
                .fields()
                .iter()
                .filter(|(k, _)| {
                    k.len() > prefix.len() + suffix.len()
                        && k.starts_with(prefix)
                        && k.ends_with(suffix)
                })
                .map(|(_, v)| v.as_number())
                .sum(),
        }
    }

    fn tags<'r>(&self, record: &'r RecordNode) -> Vec<&'r str> {
        match self {
            FieldSelector::Exact(name) => record
                .field(name)
                .map(|v| v.tags())
                .unwrap_or_default(),
            FieldSelector::Substituted(name) => substituted_field(record, name)
                .map(|v| v.tags())
                .unwrap_or_default(),
            FieldSelector::Prefixed { .. } => Vec::new(),
        }
    }
}

fn substituted_field<'r>(record: &'r RecordNode, name: &str) -> Option<&'r FieldValue> {
    record.field(name).or_else(|| {
        record
            .fields()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

/// Activity of one category in a record, read from the gate template.
fn category_activity(record: &RecordNode, template: &str, category: &str) -> f64 {
    let name = template.replace(FILTER_PLACEHOLDER, category);
    substituted_field(record, &name).map_or(0.0, FieldValue::as_number)
}

/// Reduce the matched records according to the metric's aggregation kind.
fn reduce(records: &[&RecordNode], definition: &MetricDefinition, filter: &TagFilter) -> f64 {
    if definition.kind == AggregationKind::Count {
        return records.len() as f64;
    }

    let Some(ref field) = definition.field else {
        debug!("Metric {} has no field, reading as 0", definition.name);
        return 0.0;
    };
    let selector = FieldSelector::resolve(field, filter);

    match definition.kind {
        AggregationKind::Sum => records.iter().map(|r| selector.number(r)).sum(),
        AggregationKind::Max => records
            .iter()
            .map(|r| selector.number(r))
            .fold(0.0, f64::max),
        AggregationKind::Average => {
            let divisor = match definition.active_field {
                Some(ref active) => {
                    let gate = FieldSelector::resolve(active, filter);
                    records.iter().filter(|r| gate.number(r) > 0.0).count().max(1)
                }
                None => records.len(),
            };
            if divisor == 0 {
                0.0
            } else {
                let total: f64 = records.iter().map(|r| selector.number(r)).sum();
                total / divisor as f64
            }
        }
        AggregationKind::Distinct => {
            let selected = filter
                .value
                .as_deref()
                .filter(|_| filter.fields.iter().any(|f| f == field));

            // lowercased category -> accumulated activity
            let mut categories: BTreeMap<String, f64> = BTreeMap::new();
            for record in records {
                for tag in selector.tags(record).into_iter().map(str::trim) {
                    if tag.is_empty() || selected.is_some_and(|s| !tag.eq_ignore_ascii_case(s)) {
                        continue;
                    }
                    let activity = match definition.active_field {
                        Some(ref template) => category_activity(record, template, tag),
                        None => 1.0,
                    };
                    *categories.entry(tag.to_lowercase()).or_insert(0.0) += activity;
                }
            }
            categories.values().filter(|a| **a > 0.0).count() as f64
        }
        AggregationKind::Count => records.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, Fields};

    fn function(ccn: f64) -> RecordNode {
        let mut fields = Fields::new();
        fields.insert("ccn".to_string(), FieldValue::Number(ccn));
        RecordNode::leaf(fields)
    }

    fn commit(category: &str, similarity: f64, old: &[f64], new: &[f64]) -> RecordNode {
        let mut fields = Fields::new();
        fields.insert("category".to_string(), FieldValue::Text(category.into()));
        fields.insert("similarity_score".to_string(), FieldValue::Number(similarity));

        let mut children = BTreeMap::new();
        children.insert(
            "gitDiffAnalysis.old_code_analysis".to_string(),
            old.iter().map(|c| function(*c)).collect(),
        );
        children.insert(
            "gitDiffAnalysis.new_code_analysis".to_string(),
            new.iter().map(|c| function(*c)).collect(),
        );
        RecordNode::composite(fields, children)
    }

    fn developer(id: &str, commits: Vec<RecordNode>) -> Entity {
        let mut repo_children = BTreeMap::new();
        repo_children.insert("commits".to_string(), commits);
        let repo = RecordNode::composite(Fields::new(), repo_children);

        let mut root_children = BTreeMap::new();
        root_children.insert("repositories".to_string(), vec![repo]);
        Entity::new(id, RecordNode::composite(Fields::new(), root_children))
    }

    const FUNCTIONS: &str = "gitDiffAnalysis.old_code_analysis|gitDiffAnalysis.new_code_analysis";

    fn definitions() -> Vec<MetricDefinition> {
        vec![
            MetricDefinition::new(
                "commitCount",
                &["repositories", "commits"],
                None,
                AggregationKind::Count,
            ),
            MetricDefinition::new(
                "totalSimilarity",
                &["repositories", "commits"],
                Some("similarity_score"),
                AggregationKind::Sum,
            ),
            MetricDefinition::new(
                "avgSimilarity",
                &["repositories", "commits"],
                Some("similarity_score"),
                AggregationKind::Average,
            ),
            MetricDefinition::new(
                "totalCcn",
                &["repositories", "commits", FUNCTIONS],
                Some("ccn"),
                AggregationKind::Sum,
            ),
            MetricDefinition::new(
                "maxFunctionCcn",
                &["repositories", "commits", FUNCTIONS],
                Some("ccn"),
                AggregationKind::Max,
            ),
            MetricDefinition::new(
                "functionCount",
                &["repositories", "commits", FUNCTIONS],
                None,
                AggregationKind::Count,
            ),
            MetricDefinition::new(
                "ccnPerFunction",
                &["repositories", "commits", FUNCTIONS],
                Some("ccn"),
                AggregationKind::Average,
            ),
        ]
    }

    fn sample() -> Entity {
        developer(
            "alice",
            vec![
                commit("bug fix", 0.5, &[3.0, 4.0], &[5.0]),
                commit("new feature", 0.25, &[], &[12.0]),
            ],
        )
    }

    #[test]
    fn test_aggregate_all_kinds() {
        let set = aggregate(&sample(), &TagFilter::match_all(), &definitions());

        assert_eq!(set.get("commitCount"), 2.0);
        assert_eq!(set.get("totalSimilarity"), 0.75);
        assert_eq!(set.get("avgSimilarity"), 0.375);
        assert_eq!(set.get("totalCcn"), 24.0);
        assert_eq!(set.get("maxFunctionCcn"), 12.0);
        assert_eq!(set.get("functionCount"), 4.0);
        assert_eq!(set.get("ccnPerFunction"), 6.0);
    }

    #[test]
    fn test_filter_excludes_nested_records() {
        let filter = TagFilter::new("commits", &["category"], Some("Bug Fix"));
        let set = aggregate(&sample(), &filter, &definitions());

        assert_eq!(set.get("commitCount"), 1.0);
        assert_eq!(set.get("totalCcn"), 12.0);
        assert_eq!(set.get("maxFunctionCcn"), 5.0);
        assert_eq!(set.get("functionCount"), 3.0);
    }

    #[test]
    fn test_filter_matching_nothing_yields_zero() {
        let filter = TagFilter::new("commits", &["category"], Some("documentation"));
        let set = aggregate(&sample(), &filter, &definitions());

        for definition in definitions() {
            assert_eq!(set.get(&definition.name), 0.0, "{}", definition.name);
        }
    }

    #[test]
    fn test_empty_entity_yields_all_zero_set() {
        let ghost = Entity::new("ghost", RecordNode::default());
        let set = aggregate(&ghost, &TagFilter::match_all(), &definitions());

        assert_eq!(set.iter().count(), definitions().len());
        assert!(set.iter().all(|(_, v)| v == 0.0));
    }

    #[test]
    fn test_scalar_where_collection_expected_is_empty() {
        let mut fields = Fields::new();
        fields.insert("repositories".to_string(), FieldValue::Text("oops".into()));
        let entity = Entity::new("broken", RecordNode::leaf(fields));

        let set = aggregate(&entity, &TagFilter::match_all(), &definitions());
        assert_eq!(set.get("commitCount"), 0.0);
        assert_eq!(set.get("ccnPerFunction"), 0.0);
    }

    #[test]
    fn test_missing_and_non_numeric_fields_coerce_to_zero() {
        let mut fields = Fields::new();
        fields.insert("ccn".to_string(), FieldValue::Text("n/a".into()));
        let odd = RecordNode::leaf(fields);

        let mut children = BTreeMap::new();
        children.insert(
            "gitDiffAnalysis.new_code_analysis".to_string(),
            vec![odd, RecordNode::default(), function(2.0)],
        );
        let c = RecordNode::composite(Fields::new(), children);
        let entity = developer("bob", vec![c]);

        let set = aggregate(&entity, &TagFilter::match_all(), &definitions());
        assert_eq!(set.get("totalCcn"), 2.0);
        assert_eq!(set.get("functionCount"), 3.0);
        assert_eq!(set.get("totalSimilarity"), 0.0);
    }

    #[test]
    fn test_filter_placeholder_field() {
        let mut fields = Fields::new();
        fields.insert("languageCommits.Rust".to_string(), FieldValue::Number(10.0));
        fields.insert("languageCommits.Go".to_string(), FieldValue::Number(4.0));
        fields.insert(
            "languages".to_string(),
            FieldValue::List(vec!["Rust".into(), "Go".into()]),
        );
        let repo = RecordNode::leaf(fields);

        let mut children = BTreeMap::new();
        children.insert("repositories".to_string(), vec![repo]);
        let entity = Entity::new("carol", RecordNode::composite(Fields::new(), children));

        let defs = vec![
            MetricDefinition::new(
                "languageCommits",
                &["repositories"],
                Some("languageCommits.{filter}"),
                AggregationKind::Sum,
            ),
            MetricDefinition::new(
                "activeLanguages",
                &["repositories"],
                Some("languages"),
                AggregationKind::Distinct,
            ),
        ];

        let all = aggregate(&entity, &TagFilter::match_all(), &defs);
        assert_eq!(all.get("languageCommits"), 14.0);
        assert_eq!(all.get("activeLanguages"), 2.0);

        let rust = TagFilter::new("repositories", &["language", "languages"], Some("Rust"));
        let only_rust = aggregate(&entity, &rust, &defs);
        assert_eq!(only_rust.get("languageCommits"), 10.0);

        assert_eq!(only_rust.get("activeLanguages"), 1.0);

        let lowercase = rust.with_value(Some("rust"));
        assert_eq!(aggregate(&entity, &lowercase, &defs).get("languageCommits"), 10.0);

        let python = rust.with_value(Some("Python"));
        let none = aggregate(&entity, &python, &defs);
        assert_eq!(none.get("languageCommits"), 0.0);
        assert_eq!(none.get("activeLanguages"), 0.0);
    }

    #[test]
    fn test_empty_path_reads_root() {
        let mut fields = Fields::new();
        fields.insert("totalPRs".to_string(), FieldValue::Number(9.0));
        let entity = Entity::new("dave", RecordNode::leaf(fields));

        let defs = vec![MetricDefinition::new(
            "totalPRs",
            &[],
            Some("totalPRs"),
            AggregationKind::Sum,
        )];
        let filter = TagFilter::new("repositories", &["language"], Some("Rust"));
        assert_eq!(aggregate(&entity, &filter, &defs).get("totalPRs"), 9.0);
    }

    #[test]
    fn test_root_filter_excludes_entity() {
        let mut fields = Fields::new();
        fields.insert("language".to_string(), FieldValue::Text("Go".into()));
        fields.insert("totalCommits".to_string(), FieldValue::Number(40.0));
        let entity = Entity::new("svc", RecordNode::leaf(fields));

        let defs = vec![MetricDefinition::new(
            "totalCommits",
            &[],
            Some("totalCommits"),
            AggregationKind::Sum,
        )];

        let go = TagFilter::new(ROOT_COLLECTION, &["language"], Some("go"));
        assert_eq!(aggregate(&entity, &go, &defs).get("totalCommits"), 40.0);

        let rust = go.with_value(Some("rust"));
        let set = aggregate(&entity, &rust, &defs);
        assert_eq!(set.get("totalCommits"), 0.0);
        assert!(set.iter().any(|(name, _)| name == "totalCommits"));
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let entities = vec![sample(), Entity::new("ghost", RecordNode::default())];
        let filter = TagFilter::new("commits", &["category"], Some("bug fix"));

        let first = aggregate_all(&entities, &filter, &definitions());
        let second = aggregate_all(&entities, &filter, &definitions());
        assert_eq!(first, second);
        assert_eq!(first[1].entity, "ghost");
    }

    fn language_repo(languages: &[&str], commits: &[(&str, f64)], total: f64) -> RecordNode {
        let mut fields = Fields::new();
        fields.insert(
            "languages".to_string(),
            FieldValue::List(languages.iter().map(|l| l.to_string()).collect()),
        );
        for (language, count) in commits {
            fields.insert(format!("languageCommits.{}", language), FieldValue::Number(*count));
        }
        fields.insert("commits.totalCommits".to_string(), FieldValue::Number(total));
        fields.insert("duration.commitsPerDay".to_string(), FieldValue::Number(2.0));
        RecordNode::leaf(fields)
    }

    fn with_repos(id: &str, repos: Vec<RecordNode>) -> Entity {
        let mut children = BTreeMap::new();
        children.insert("repositories".to_string(), repos);
        Entity::new(id, RecordNode::composite(Fields::new(), children))
    }

    #[test]
    fn test_distinct_skips_inactive_categories() {
        let entity = with_repos(
            "erin",
            vec![language_repo(
                &["Rust", "Go", "C", "Java", "Ruby", "Perl"],
                &[
                    ("Rust", 5.0),
                    ("Go", 0.0),
                    ("C", 0.0),
                    ("Java", 0.0),
                    ("Ruby", 0.0),
                    ("Perl", 0.0),
                ],
                5.0,
            )],
        );
        let defs = vec![MetricDefinition::new(
            "activeLanguages",
            &["repositories"],
            Some("languages"),
            AggregationKind::Distinct,
        )
        .with_active_field("languageCommits.{filter}")];

        let all = aggregate(&entity, &TagFilter::match_all(), &defs);
        assert_eq!(all.get("activeLanguages"), 1.0);

        let rust = TagFilter::new("repositories", &["language", "languages"], Some("Rust"));
        assert_eq!(aggregate(&entity, &rust, &defs).get("activeLanguages"), 1.0);

        let go = rust.with_value(Some("Go"));
        assert_eq!(aggregate(&entity, &go, &defs).get("activeLanguages"), 0.0);
    }

    #[test]
    fn test_distinct_sums_activity_across_records() {
        let entity = with_repos(
            "frank",
            vec![
                language_repo(&["Go"], &[("Go", 0.0)], 1.0),
                language_repo(&["Go", "Rust"], &[("Go", 3.0)], 3.0),
            ],
        );
        let defs = vec![MetricDefinition::new(
            "activeLanguages",
            &["repositories"],
            Some("languages"),
            AggregationKind::Distinct,
        )
        .with_active_field("languageCommits.{filter}")];

        let set = aggregate(&entity, &TagFilter::match_all(), &defs);
        assert_eq!(set.get("activeLanguages"), 1.0);
    }

    #[test]
    fn test_gated_average_divides_by_active_records() {
        let entity = with_repos(
            "gina",
            vec![
                language_repo(&["Rust"], &[("Rust", 4.0)], 4.0),
                language_repo(&["Rust"], &[("Rust", 0.0)], 0.0),
            ],
        );
        let plain = MetricDefinition::new(
            "commitsPerDay",
            &["repositories"],
            Some("duration.commitsPerDay"),
            AggregationKind::Average,
        );
        let gated = MetricDefinition::new(
            "gatedCommitsPerDay",
            &["repositories"],
            Some("duration.commitsPerDay"),
            AggregationKind::Average,
        )
        .with_active_field("commits.totalCommits");

        let set = aggregate(&entity, &TagFilter::match_all(), &[plain, gated.clone()]);
        assert_eq!(set.get("commitsPerDay"), 2.0);
        assert_eq!(set.get("gatedCommitsPerDay"), 4.0);

        let idle = with_repos("hal", vec![language_repo(&["Rust"], &[], 0.0)]);
        let set = aggregate(&idle, &TagFilter::match_all(), &[gated]);
        assert_eq!(set.get("gatedCommitsPerDay"), 2.0);
    }
}
