use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

mod bots;
mod cluster;
mod config;
mod error;
mod forecast;
mod graph;
mod ingest;
mod models;
mod normalize;
mod overview;
mod report;

use config::AnalyticsConfig;
use models::RecordSet;

#[derive(Parser)]
#[command(name = "skillgenome")]
#[command(about = "Skill demand analytics over user activity records", long_about = None)]
struct Cli {
    /// CSV file with user_id, region, timestamp, source, raw_text, skill_tags, engagement
    #[arg(long, global = true, default_value = "data/skillgenome.csv")]
    csv: PathBuf,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Settings {
    /// TOML file with analytics settings
    #[arg(long, global = true, env = "SKILLGENOME_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "BOT_POSTS_PER_DAY_THRESHOLD")]
    posts_per_day_threshold: Option<f64>,
    #[arg(long, global = true, env = "BOT_DUPLICATE_TEXT_THRESHOLD")]
    duplicate_text_threshold: Option<f64>,
    #[arg(long, global = true, env = "SKILLGENOME_CLUSTERS")]
    clusters: Option<usize>,
    #[arg(long, global = true, env = "SKILLGENOME_HORIZON_WEEKS")]
    horizon_weeks: Option<usize>,
}

impl Settings {
    fn resolve(&self) -> anyhow::Result<AnalyticsConfig> {
        let mut config = match &self.config {
            Some(path) => AnalyticsConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => AnalyticsConfig::default(),
        };
        if let Some(value) = self.posts_per_day_threshold {
            config.bot.posts_per_day = value;
        }
        if let Some(value) = self.duplicate_text_threshold {
            config.bot.duplicate_text_ratio = value;
        }
        if let Some(value) = self.clusters {
            config.n_clusters = value;
        }
        if let Some(value) = self.horizon_weeks {
            config.horizon_weeks = value;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the raw dataset
    Overview,
    /// Detect and report bot-like users
    Bots {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Rank skills and skill pairs by co-occurrence
    Graph {
        #[arg(long)]
        top: Option<usize>,
    },
    /// Group regions by skill profile
    Clusters {
        #[arg(long)]
        k: Option<usize>,
    },
    /// Forecast weekly demand for one skill
    Forecast {
        #[arg(long)]
        skill: String,
        #[arg(long)]
        horizon: Option<usize>,
    },
    /// Run every view over the cleaned dataset and print JSON
    Analyze {
        #[arg(long)]
        skill: Option<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        skill: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = cli.settings.resolve()?;

    let ingested = ingest::read_path(&cli.csv)
        .with_context(|| format!("failed to ingest {}", cli.csv.display()))?;
    info!(
        rows = ingested.rows_read,
        dropped = ingested.rows_dropped,
        at = %ingested.ingested_at,
        "dataset loaded"
    );
    let records = ingested.records;
    if records.is_empty() {
        warn!(path = %cli.csv.display(), "no usable records, every view will be empty");
    }

    match cli.command {
        Commands::Overview => {
            let summary = overview::overview(&records);
            let heat = overview::region_heatmap(&records);
            if cli.json {
                print_json(&serde_json::json!({ "overview": summary, "heatmap": heat }))?;
            } else {
                println!(
                    "{} records, {} users, {} regions, {} skills",
                    summary.total_records,
                    summary.total_users,
                    summary.total_regions,
                    summary.total_skills
                );
                for region in heat {
                    println!("- {}: {} skill mentions", region.region, region.skill_count);
                }
            }
        }
        Commands::Bots { limit } => {
            let outcome = bots::filter_bots(&records, &config.bot)?;
            if cli.json {
                print_json(&serde_json::json!({
                    "stats": outcome.stats,
                    "decisions": outcome.decisions,
                }))?;
                return Ok(());
            }
            println!(
                "{} of {} users flagged ({:.2}% removed), {} records kept.",
                outcome.stats.bots_detected,
                outcome.stats.total_users,
                outcome.stats.percent_removed,
                outcome.cleaned.len()
            );
            for decision in outcome.decisions.iter().filter(|d| d.is_bot).take(limit) {
                println!(
                    "- {} posts/day {:.2}, duplicate ratio {:.2}, trust {:.1}",
                    decision.user_id,
                    decision.metrics.posts_per_day,
                    decision.metrics.duplicate_text_ratio,
                    decision.trust_score
                );
            }
        }
        Commands::Graph { top } => {
            let cleaned = clean(&records, &config)?;
            let summary = graph::build_summary(&cleaned, top.unwrap_or(config.top_n));
            if cli.json {
                print_json(&summary)?;
                return Ok(());
            }
            println!("{} skills, {} co-occurring pairs", summary.node_count, summary.edge_count);
            println!("Top skills by degree:");
            for skill in &summary.top_skills {
                println!("- {} ({})", skill.skill, skill.degree);
            }
            println!("Top pairs by weight:");
            for pair in &summary.top_pairs {
                println!("- {} + {} ({})", pair.skill_1, pair.skill_2, pair.weight);
            }
        }
        Commands::Clusters { k } => {
            if let Some(k) = k {
                config.n_clusters = k;
                config.validate()?;
            }
            let cleaned = clean(&records, &config)?;
            let clusters = cluster::cluster_regions(&cleaned, &config);
            if cli.json {
                print_json(&clusters)?;
                return Ok(());
            }
            if clusters.is_empty() {
                println!("No regions to cluster.");
            }
            for entry in clusters {
                println!(
                    "- {} -> cluster {} ({})",
                    entry.region,
                    entry.cluster_id,
                    entry.top_skills.join(", ")
                );
            }
        }
        Commands::Forecast { skill, horizon } => {
            if let Some(horizon) = horizon {
                config.horizon_weeks = horizon;
                config.validate()?;
            }
            let cleaned = clean(&records, &config)?;
            let result = forecast::forecast_skill(&cleaned, &skill, config.horizon_weeks);
            if cli.json {
                print_json(&result)?;
                return Ok(());
            }
            println!("{} is {}", result.skill, result.trend);
            for point in &result.historical {
                println!("- {}: {}", point.week, point.count);
            }
            for point in &result.forecast {
                println!("- {}: {:.1} (predicted)", point.week, point.predicted_count);
            }
        }
        Commands::Analyze { skill } => {
            let analysis = run_analysis(&records, &config, skill.as_deref())?;
            print_json(&analysis)?;
        }
        Commands::Report { skill, out } => {
            let analysis = run_analysis(&records, &config, skill.as_deref())?;
            std::fs::write(&out, report::build_report(&analysis))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn clean(records: &RecordSet, config: &AnalyticsConfig) -> anyhow::Result<RecordSet> {
    Ok(bots::filter_bots(records, &config.bot)?.cleaned)
}

/// Filters bots once, then builds the graph, clusters and forecast
/// concurrently over the same cleaned records.
fn run_analysis(
    records: &RecordSet,
    config: &AnalyticsConfig,
    skill: Option<&str>,
) -> anyhow::Result<report::AnalysisReport> {
    let summary = overview::overview(records);
    let outcome = bots::filter_bots(records, &config.bot)?;
    let cleaned = &outcome.cleaned;

    let (graph, (clusters, forecast)) = rayon::join(
        || graph::build_summary(cleaned, config.top_n),
        || {
            rayon::join(
                || cluster::cluster_regions(cleaned, config),
                || skill.map(|s| forecast::forecast_skill(cleaned, s, config.horizon_weeks)),
            )
        },
    );

    Ok(report::AnalysisReport::new(summary, &outcome, graph, clusters, forecast))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
