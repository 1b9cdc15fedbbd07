use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::BotThresholds;
use crate::error::{AnalyticsError, Result};
use crate::models::{BotDecision, BotStats, Column, RecordSet, UserMetrics};
use crate::normalize::{normalize_text, round_to};

pub const BOT_TRUST_SCORE: f64 = 0.2;
pub const HUMAN_TRUST_SCORE: f64 = 1.0;

const REQUIRED: [Column; 4] = [
    Column::UserId,
    Column::Timestamp,
    Column::RawText,
    Column::Engagement,
];

#[derive(Debug, Clone)]
pub struct BotFilterOutcome {
    pub cleaned: RecordSet,
    pub decisions: Vec<BotDecision>,
    pub stats: BotStats,
}

impl BotFilterOutcome {
    pub fn decision(&self, user_id: &str) -> Option<&BotDecision> {
        self.decisions.iter().find(|d| d.user_id == user_id)
    }
}

#[derive(Default)]
struct UserActivity {
    posts: usize,
    days: HashSet<NaiveDate>,
    texts: HashSet<String>,
}

/// Flags users whose posting rate or duplicate-text ratio exceeds the
/// thresholds and returns a copy of the records without them.
pub fn filter_bots(records: &RecordSet, thresholds: &BotThresholds) -> Result<BotFilterOutcome> {
    let missing = records.missing(&REQUIRED);
    if !missing.is_empty() {
        return Err(AnalyticsError::missing_columns(&missing));
    }

    let mut order: Vec<&str> = Vec::new();
    let mut activity: HashMap<&str, UserActivity> = HashMap::new();

    for record in &records.records {
        let entry = activity.entry(record.user_id.as_str()).or_insert_with(|| {
            order.push(record.user_id.as_str());
            UserActivity::default()
        });
        entry.posts += 1;
        entry.days.insert(record.timestamp.date());
        entry.texts.insert(normalize_text(&record.raw_text));
    }

    let decisions: Vec<BotDecision> = order
        .iter()
        .map(|user_id| {
            let metrics = user_metrics(&activity[user_id]);
            let is_bot = is_bot(&metrics, thresholds);
            debug!(
                user_id,
                posts_per_day = metrics.posts_per_day,
                duplicate_text_ratio = metrics.duplicate_text_ratio,
                is_bot,
                "scored user"
            );
            BotDecision {
                user_id: user_id.to_string(),
                is_bot,
                trust_score: if is_bot { BOT_TRUST_SCORE } else { HUMAN_TRUST_SCORE },
                metrics,
            }
        })
        .collect();

    let bots: HashSet<&str> = decisions
        .iter()
        .filter(|d| d.is_bot)
        .map(|d| d.user_id.as_str())
        .collect();

    let cleaned = RecordSet {
        columns: records.columns.clone(),
        records: records
            .records
            .iter()
            .filter(|record| !bots.contains(record.user_id.as_str()))
            .cloned()
            .collect(),
    };

    let stats = summarize(decisions.len(), bots.len());
    info!(
        total_users = stats.total_users,
        bots_detected = stats.bots_detected,
        percent_removed = stats.percent_removed,
        kept_records = cleaned.len(),
        "bot filter finished"
    );

    Ok(BotFilterOutcome {
        cleaned,
        decisions,
        stats,
    })
}

fn user_metrics(activity: &UserActivity) -> UserMetrics {
    let active_days = activity.days.len().max(1) as f64;
    let total_posts = activity.posts.max(1) as f64;
    UserMetrics {
        posts_per_day: activity.posts as f64 / active_days,
        duplicate_text_ratio: 1.0 - activity.texts.len() as f64 / total_posts,
    }
}

pub fn is_bot(metrics: &UserMetrics, thresholds: &BotThresholds) -> bool {
    metrics.posts_per_day > thresholds.posts_per_day
        || metrics.duplicate_text_ratio > thresholds.duplicate_text_ratio
}

pub fn summarize(total_users: usize, bots_detected: usize) -> BotStats {
    let percent_removed = if total_users == 0 {
        0.0
    } else {
        round_to(100.0 * bots_detected as f64 / total_users as f64, 2)
    };
    BotStats {
        total_users,
        bots_detected,
        percent_removed,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime};

    use super::*;
    use crate::ingest::parse_timestamp;
    use crate::models::Record;

    fn sample_record(user_id: &str, timestamp: &str, text: &str) -> Record {
        Record {
            user_id: user_id.to_string(),
            region: "Pune".to_string(),
            timestamp: parse_timestamp(timestamp).unwrap(),
            source: "web".to_string(),
            raw_text: text.to_string(),
            skill_tags: vec!["Rust".to_string()],
            engagement: 1.0,
        }
    }

    #[test]
    fn repeated_text_below_threshold_is_not_bot() {
        let records = RecordSet::new(vec![
            sample_record("userA", "2024-01-01", "hi hi hi"),
            sample_record("userA", "2024-01-01", "hi hi hi"),
            sample_record("userA", "2024-01-01", "hi hi hi"),
        ]);
        let outcome = filter_bots(&records, &BotThresholds::default()).unwrap();
        let decision = outcome.decision("userA").unwrap();
        assert_eq!(decision.metrics.posts_per_day, 3.0);
        assert!((decision.metrics.duplicate_text_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert!(!decision.is_bot);
        assert_eq!(decision.trust_score, 1.0);
        assert_eq!(outcome.cleaned.len(), 3);
        assert_eq!(outcome.stats.bots_detected, 0);
    }

    #[test]
    fn duplicate_spammer_is_removed() {
        let mut rows: Vec<Record> = (0..5)
            .map(|_| sample_record("spam", "2024-01-01", "  BUY   now "))
            .collect();
        rows.push(sample_record("human", "2024-01-01", "learning rust"));
        rows.push(sample_record("human", "2024-01-02", "shipping sql"));
        let records = RecordSet::new(rows);

        let outcome = filter_bots(&records, &BotThresholds::default()).unwrap();
        let spam = outcome.decision("spam").unwrap();
        assert!(spam.is_bot);
        assert_eq!(spam.trust_score, 0.2);
        assert!((spam.metrics.duplicate_text_ratio - 0.8).abs() < 1e-9);

        assert!(outcome.cleaned.records.iter().all(|r| r.user_id == "human"));
        assert_eq!(outcome.stats.total_users, 2);
        assert_eq!(outcome.stats.bots_detected, 1);
        assert_eq!(outcome.stats.percent_removed, 50.0);
        assert_eq!(records.len(), 7);
    }

    #[test]
    fn high_volume_poster_is_removed() {
        let start: NaiveDateTime = parse_timestamp("2024-02-01").unwrap();
        let rows: Vec<Record> = (0..45)
            .map(|i| {
                let mut record = sample_record("flood", "2024-02-01", &format!("post {i}"));
                record.timestamp = start + Duration::minutes(i);
                record
            })
            .collect();
        let outcome = filter_bots(&RecordSet::new(rows), &BotThresholds::default()).unwrap();
        let decision = outcome.decision("flood").unwrap();
        assert_eq!(decision.metrics.posts_per_day, 45.0);
        assert_eq!(decision.metrics.duplicate_text_ratio, 0.0);
        assert!(decision.is_bot);
        assert!(outcome.cleaned.is_empty());
    }

    #[test]
    fn decisions_agree_with_thresholds() {
        let thresholds = BotThresholds {
            posts_per_day: 2.0,
            duplicate_text_ratio: 0.4,
        };
        let records = RecordSet::new(vec![
            sample_record("a", "2024-01-01", "x"),
            sample_record("a", "2024-01-01", "y"),
            sample_record("a", "2024-01-01", "z"),
            sample_record("b", "2024-01-01", "x"),
            sample_record("b", "2024-01-02", "x"),
            sample_record("c", "2024-01-01", "x"),
            sample_record("c", "2024-01-02", "y"),
        ]);
        let outcome = filter_bots(&records, &thresholds).unwrap();
        for decision in &outcome.decisions {
            let exceeds = decision.metrics.posts_per_day > thresholds.posts_per_day
                || decision.metrics.duplicate_text_ratio > thresholds.duplicate_text_ratio;
            assert_eq!(decision.is_bot, exceeds, "user {}", decision.user_id);
        }
        assert!(outcome.decision("a").unwrap().is_bot);
        assert!(outcome.decision("b").unwrap().is_bot);
        assert!(!outcome.decision("c").unwrap().is_bot);
        assert_eq!(outcome.stats.percent_removed, 66.67);
    }

    #[test]
    fn missing_columns_raise_schema_error() {
        let records = RecordSet::with_columns(
            [Column::UserId, Column::Timestamp, Column::Region],
            vec![sample_record("a", "2024-01-01", "x")],
        );
        match filter_bots(&records, &BotThresholds::default()) {
            Err(AnalyticsError::Schema { missing }) => {
                assert_eq!(missing, vec!["raw_text", "engagement"]);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_yields_zero_stats() {
        let outcome = filter_bots(&RecordSet::new(Vec::new()), &BotThresholds::default()).unwrap();
        assert!(outcome.cleaned.is_empty());
        assert_eq!(outcome.stats, summarize(0, 0));
        assert_eq!(outcome.stats.percent_removed, 0.0);
    }
}
