//! Built-in scoring profiles.
//!
//! Each profile bundles the metric definitions, weighting scheme, tracked
//! winner metrics and filter level for one comparison scenario. They are
//! plain data; a config file can replace any of them wholesale.

use super::scheme::{Bonus, Diversity, Transform, WeightedMetric, WeightingScheme};
use crate::models::{AggregationKind, MetricDefinition, TagFilter, ROOT_COLLECTION};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Commit collections of a developer payload.
const COMMITS: &[&str] = &["repositories", "commits"];

/// Function-level analyses before and after each commit.
const FUNCTIONS: &[&str] = &[
    "repositories",
    "commits",
    "gitDiffAnalysis.old_code_analysis|gitDiffAnalysis.new_code_analysis",
];

/// Built-in comparison scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Developer vs developer on analyzed commits
    #[default]
    Commits,
    /// Developer profiles: repositories, languages, pull requests, activity
    Profiles,
    /// Repository vs repository on commit activity
    Repositories,
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::Commits => write!(f, "commits"),
            Preset::Profiles => write!(f, "profiles"),
            Preset::Repositories => write!(f, "repositories"),
        }
    }
}

/// Everything needed to run one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringProfile {
    pub name: String,
    pub definitions: Vec<MetricDefinition>,
    pub scheme: WeightingScheme,
    pub tracked: Vec<String>,
    /// Filter level; its value is supplied per request.
    pub filter: TagFilter,
}

impl Preset {
    /// Build the profile for this preset.
    pub fn profile(self) -> ScoringProfile {
        match self {
            Preset::Commits => commits_profile(),
            Preset::Profiles => developer_profile(),
            Preset::Repositories => repository_profile(),
        }
    }
}

fn commits_profile() -> ScoringProfile {
    use AggregationKind::*;

    let definitions = vec![
        MetricDefinition::new("commitCount", COMMITS, None, Count),
        MetricDefinition::new("totalSimilarity", COMMITS, Some("similarity_score"), Sum),
        MetricDefinition::new("avgSimilarityPerCommit", COMMITS, Some("similarity_score"), Average),
        MetricDefinition::new("maxCommitSimilarity", COMMITS, Some("similarity_score"), Max),
        MetricDefinition::new("totalCcn", FUNCTIONS, Some("ccn"), Sum),
        MetricDefinition::new("functionCount", FUNCTIONS, None, Count),
        MetricDefinition::new("ccnPerFunction", FUNCTIONS, Some("ccn"), Average),
        MetricDefinition::new("maxFunctionCcn", FUNCTIONS, Some("ccn"), Max),
    ];

    let tracked = [
        "maxFunctionCcn",
        "ccnPerFunction",
        "maxCommitSimilarity",
        "avgSimilarityPerCommit",
        "commitCount",
    ];

    ScoringProfile {
        name: Preset::Commits.to_string(),
        definitions,
        scheme: WeightingScheme::equal("commits", &tracked),
        tracked: tracked.iter().map(|s| s.to_string()).collect(),
        filter: TagFilter::new("commits", &["category"], None),
    }
}

fn developer_profile() -> ScoringProfile {
    use AggregationKind::*;

    let definitions = vec![
        MetricDefinition::new("repoCount", &["repositories"], None, Count),
        MetricDefinition::new(
            "languageCommits",
            &["repositories"],
            Some("languageCommits.{filter}"),
            Sum,
        ),
        MetricDefinition::new("activeLanguages", &["repositories"], Some("languages"), Distinct)
            .with_active_field("languageCommits.{filter}"),
        MetricDefinition::new("totalPRs", &[], Some("pullRequests.totalPRs"), Sum),
        MetricDefinition::new("acceptedPRs", &[], Some("pullRequests.acceptedPRs"), Sum),
        MetricDefinition::new(
            "commitsPerDay",
            &["repositories"],
            Some("duration.commitsPerDay"),
            Average,
        )
        .with_active_field("commits.totalCommits"),
        MetricDefinition::new(
            "durationInDays",
            &["repositories"],
            Some("duration.durationInDays"),
            Average,
        )
        .with_active_field("commits.totalCommits"),
    ];

    let language_bonus = Bonus {
        base_share: 0.6,
        activity_points: 5.0,
        diversity: Some(Diversity {
            metric: "activeLanguages".to_string(),
            per_item: 2.0,
            cap: 10.0,
        }),
    };

    let scheme = WeightingScheme::new(
        "profiles",
        vec![
            WeightedMetric::new("repoCount", 25.0),
            WeightedMetric::new("languageCommits", 25.0).with_bonus(language_bonus),
            WeightedMetric::new("totalPRs", 12.5),
            WeightedMetric::new("acceptedPRs", 12.5),
            WeightedMetric::new("commitsPerDay", 12.5).absolute(5.0),
            WeightedMetric::new("durationInDays", 12.5).absolute(30.0),
        ],
    );

    let tracked = [
        "repoCount",
        "languageCommits",
        "totalPRs",
        "acceptedPRs",
        "commitsPerDay",
        "durationInDays",
    ];

    ScoringProfile {
        name: Preset::Profiles.to_string(),
        definitions,
        scheme,
        tracked: tracked.iter().map(|s| s.to_string()).collect(),
        filter: TagFilter::new("repositories", &["language", "languages"], None),
    }
}

fn repository_profile() -> ScoringProfile {
    use AggregationKind::*;

    let definitions = vec![
        MetricDefinition::new("totalCommits", &[], Some("totalCommits"), Sum),
        MetricDefinition::new("commitsPerDay", &[], Some("commitsPerDay"), Sum),
        MetricDefinition::new("durationInDays", &[], Some("durationInDays"), Sum),
    ];

    let scheme = WeightingScheme::new(
        "repositories",
        vec![
            WeightedMetric::new("totalCommits", 40.0).transformed(Transform::Log10p1),
            WeightedMetric::new("commitsPerDay", 35.0).absolute(1.0),
            WeightedMetric::new("durationInDays", 25.0)
                .transformed(Transform::Sqrt)
                .absolute(20.0),
        ],
    );

    ScoringProfile {
        name: Preset::Repositories.to_string(),
        definitions,
        scheme,
        tracked: vec![
            "totalCommits".to_string(),
            "commitsPerDay".to_string(),
            "durationInDays".to_string(),
        ],
        filter: TagFilter::new(ROOT_COLLECTION, &["language"], None),
    }
}
