//! Markdown and JSON report generation.
//!
//! This module renders a [`ComparisonReport`] as a Markdown document or
//! pretty-printed JSON.

use crate::analysis::{CompositeScore, MetricWinner, WinnerDecision};
use crate::models::{ComparisonReport, EntityMetrics, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &ComparisonReport) -> String {
    let mut output = String::new();

    output.push_str("# Rivalry Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_verdict_section(report));
    output.push_str(&generate_ranking_section(&report.ranking));
    output.push_str(&generate_winners_section(&report.decision));
    output.push_str(&generate_metrics_section(&report.metrics, &report.decision));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Profile:** `{}`\n", metadata.profile));
    section.push_str(&format!("- **Scheme:** `{}`\n", metadata.scheme));
    section.push_str(&format!("- **Filter:** {}\n", metadata.filter));
    section.push_str(&format!("- **Entities Compared:** {}\n", metadata.entities));
    section.push_str(&format!(
        "- **Duration:** {:.3}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the overall verdict.
fn generate_verdict_section(report: &ComparisonReport) -> String {
    let mut section = String::new();

    section.push_str("## Verdict\n\n");

    match report.decision.overall_winner {
        Some(ref winner) => section.push_str(&format!(
            "🏆 **{}** wins {} of {} tracked metrics.\n\n",
            winner,
            report.decision.wins_of(winner),
            report.decision.metric_winners.len()
        )),
        None if report.is_degenerate() => {
            section.push_str("Not enough entities to declare a winner.\n\n")
        }
        None => section.push_str("No overall winner: the top tally is shared or zero.\n\n"),
    }

    section
}

/// Generate the ranking table with per-metric sub-scores.
fn generate_ranking_section(ranking: &[CompositeScore]) -> String {
    let mut section = String::new();

    section.push_str("## Ranking\n\n");

    let Some(first) = ranking.first() else {
        section.push_str("No entities were scored.\n\n");
        return section;
    };

    section.push_str("| # | Entity |");
    for sub in &first.sub_scores {
        section.push_str(&format!(" {} (/{}) |", sub.metric, format_number(sub.weight)));
    }
    section.push_str(" **Total** |\n");

    section.push_str("|:---:|:---|");
    for _ in &first.sub_scores {
        section.push_str(":---:|");
    }
    section.push_str(":---:|\n");

    for (i, score) in ranking.iter().enumerate() {
        section.push_str(&format!("| {} | {} |", i + 1, score.entity));
        for metric in &first.sub_scores {
            match score.sub_score(&metric.metric) {
                Some(sub) => section.push_str(&format!(" {:.2} |", sub.score)),
                None => section.push_str(" - |"),
            }
        }
        section.push_str(&format!(" **{:.2}** |\n", score.total));
    }
    section.push('\n');

    section
}

/// Generate the per-metric winners and tally tables.
fn generate_winners_section(decision: &WinnerDecision) -> String {
    let mut section = String::new();

    section.push_str("## Metric Winners\n\n");

    if decision.metric_winners.is_empty() {
        section.push_str("No metrics are tracked for winners.\n\n");
        return section;
    }

    section.push_str("| Metric | Winner | Top Value |\n");
    section.push_str("|:---|:---|:---:|\n");
    let single = decision.tallies.len() < 2;
    for m in &decision.metric_winners {
        section.push_str(&generate_winner_row(m, single));
    }
    section.push('\n');

    if !decision.tallies.is_empty() {
        section.push_str("### Win Tally\n\n");
        section.push_str("| Entity | Wins |\n");
        section.push_str("|:---|:---:|\n");

        let mut tallies: Vec<_> = decision.tallies.iter().collect();
        tallies.sort_by_key(|t| std::cmp::Reverse(t.wins));

        for t in tallies {
            section.push_str(&format!("| {} | {} |\n", t.entity, t.wins));
        }
        section.push('\n');
    }

    section
}

/// Generate the raw aggregated values; metric winners are starred.
fn generate_metrics_section(metrics: &[EntityMetrics], decision: &WinnerDecision) -> String {
    let mut section = String::new();

    let Some(first) = metrics.first() else {
        return section;
    };

    section.push_str("## Aggregated Metrics\n\n");
    section.push_str("| Entity |");
    for (name, _) in first.metrics.iter() {
        section.push_str(&format!(" {} |", name));
    }
    section.push_str("\n|:---|");
    for _ in first.metrics.iter() {
        section.push_str(":---:|");
    }
    section.push('\n');

    for entry in metrics {
        section.push_str(&format!("| {} |", entry.entity));
        for (name, _) in first.metrics.iter() {
            let value = format_number(entry.metrics.get(name));
            if decision.winner_of(name) == Some(entry.entity.as_str()) {
                section.push_str(&format!(" {} ★ |", value));
            } else {
                section.push_str(&format!(" {} |", value));
            }
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

fn generate_winner_row(m: &MetricWinner, single: bool) -> String {
    let winner = match m.winner {
        Some(ref w) => format!("**{}**", w),
        None if single => "- (single entity)".to_string(),
        None if m.top_value <= 0.0 => "- (no activity)".to_string(),
        None => "- (tie)".to_string(),
    };
    format!("| {} | {} | {} |\n", m.metric, winner, format_number(m.top_value))
}

/// Format a number without trailing zeros.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        let s = format!("{:.4}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by Rivalry*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &ComparisonReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
