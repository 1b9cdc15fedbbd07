use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::bots::BotFilterOutcome;
use crate::graph::GraphSummary;
use crate::models::{BotStats, Forecast, Overview, RegionCluster};

/// All four analytical views from a single run over one cleaned record set.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub overview: Overview,
    pub bot_stats: BotStats,
    pub graph: GraphSummary,
    pub clusters: Vec<RegionCluster>,
    pub forecast: Option<Forecast>,
}

impl AnalysisReport {
    pub fn new(
        overview: Overview,
        bots: &BotFilterOutcome,
        graph: GraphSummary,
        clusters: Vec<RegionCluster>,
        forecast: Option<Forecast>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            overview,
            bot_stats: bots.stats,
            graph,
            clusters,
            forecast,
        }
    }
}

pub fn build_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Skill Genome Report");
    let _ = writeln!(
        output,
        "Run {} generated {}",
        report.run_id,
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let overview = &report.overview;
    let _ = writeln!(
        output,
        "- {} records from {} users across {} regions mentioning {} skills",
        overview.total_records, overview.total_users, overview.total_regions, overview.total_skills
    );

    let stats = &report.bot_stats;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Bot Filtering");
    let _ = writeln!(
        output,
        "- {} of {} users flagged as bots ({:.2}% removed)",
        stats.bots_detected, stats.total_users, stats.percent_removed
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Skills");
    if report.graph.top_skills.is_empty() {
        let _ = writeln!(output, "No co-occurring skills found.");
    } else {
        for skill in &report.graph.top_skills {
            let _ = writeln!(output, "- {} (degree {})", skill.skill, skill.degree);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Skill Pairs");
    if report.graph.top_pairs.is_empty() {
        let _ = writeln!(output, "No co-occurring skills found.");
    } else {
        for pair in &report.graph.top_pairs {
            let _ = writeln!(output, "- {} + {}: {} records", pair.skill_1, pair.skill_2, pair.weight);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Regional Clusters");
    if report.clusters.is_empty() {
        let _ = writeln!(output, "No regions to cluster.");
    } else {
        for cluster in &report.clusters {
            let _ = writeln!(
                output,
                "- {}: cluster {} ({})",
                cluster.region,
                cluster.cluster_id,
                cluster.top_skills.join(", ")
            );
        }
    }

    if let Some(forecast) = &report.forecast {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Forecast: {}", forecast.skill);
        let _ = writeln!(output, "Trend: {}", forecast.trend);
        if forecast.historical.is_empty() {
            let _ = writeln!(output, "No activity recorded for this skill.");
        }
        for point in &forecast.historical {
            let _ = writeln!(output, "- {}: {}", point.week, point.count);
        }
        for point in &forecast.forecast {
            let _ = writeln!(output, "- {}: {:.1} (predicted)", point.week, point.predicted_count);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::bots::summarize;
    use crate::models::{ForecastPoint, RecordSet, SkillDegree, SkillPair, Trend, WeekCount};

    fn sample_report(forecast: Option<Forecast>) -> AnalysisReport {
        let bots = BotFilterOutcome {
            cleaned: RecordSet::new(Vec::new()),
            decisions: Vec::new(),
            stats: summarize(3, 1),
        };
        AnalysisReport::new(
            Overview {
                total_records: 12,
                total_users: 3,
                total_regions: 2,
                total_skills: 4,
            },
            &bots,
            GraphSummary {
                node_count: 2,
                edge_count: 1,
                top_skills: vec![SkillDegree { skill: "Rust".into(), degree: 1 }],
                top_pairs: vec![SkillPair {
                    skill_1: "Rust".into(),
                    skill_2: "SQL".into(),
                    weight: 4,
                }],
            },
            vec![RegionCluster {
                region: "Pune".into(),
                cluster_id: 0,
                top_skills: vec!["Rust".into(), "SQL".into()],
            }],
            forecast,
        )
    }

    #[test]
    fn report_includes_every_section() {
        let output = build_report(&sample_report(None));
        assert!(output.contains("# Skill Genome Report"));
        assert!(output.contains("1 of 3 users flagged as bots (33.33% removed)"));
        assert!(output.contains("- Rust (degree 1)"));
        assert!(output.contains("- Rust + SQL: 4 records"));
        assert!(output.contains("- Pune: cluster 0 (Rust, SQL)"));
        assert!(!output.contains("## Forecast"));
    }

    #[test]
    fn report_renders_forecast_when_present() {
        let week = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        let forecast = Forecast {
            skill: "Rust".into(),
            historical: vec![WeekCount { week, count: 3 }],
            forecast: vec![ForecastPoint {
                week: week + chrono::Duration::weeks(1),
                predicted_count: 4.0,
            }],
            trend: Trend::Rising,
        };
        let output = build_report(&sample_report(Some(forecast)));
        assert!(output.contains("## Forecast: Rust"));
        assert!(output.contains("Trend: rising"));
        assert!(output.contains("- 2024-01-07: 3"));
        assert!(output.contains("- 2024-01-14: 4.0 (predicted)"));
    }

    #[test]
    fn report_serializes_to_json() {
        let value = serde_json::to_value(sample_report(None)).unwrap();
        assert_eq!(value["bot_stats"]["bots_detected"], 1);
        assert_eq!(value["graph"]["top_pairs"][0]["weight"], 4);
        assert_eq!(value["clusters"][0]["region"], "Pune");
        assert!(value["forecast"].is_null());
    }
}
