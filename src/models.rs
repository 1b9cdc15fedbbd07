use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    UserId,
    Region,
    Timestamp,
    Source,
    RawText,
    SkillTags,
    Engagement,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::UserId,
        Column::Region,
        Column::Timestamp,
        Column::Source,
        Column::RawText,
        Column::SkillTags,
        Column::Engagement,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::UserId => "user_id",
            Column::Region => "region",
            Column::Timestamp => "timestamp",
            Column::Source => "source",
            Column::RawText => "raw_text",
            Column::SkillTags => "skill_tags",
            Column::Engagement => "engagement",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|column| column.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub user_id: String,
    pub region: String,
    pub timestamp: NaiveDateTime,
    pub source: String,
    pub raw_text: String,
    pub skill_tags: Vec<String>,
    pub engagement: f64,
}

/// Records plus the set of columns the upstream source actually provided.
/// Fields of absent columns hold empty defaults and must not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub columns: BTreeSet<Column>,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            columns: Column::ALL.into_iter().collect(),
            records,
        }
    }

    pub fn with_columns(columns: impl IntoIterator<Item = Column>, records: Vec<Record>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            records,
        }
    }

    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn missing(&self, required: &[Column]) -> Vec<Column> {
        required
            .iter()
            .copied()
            .filter(|column| !self.has(*column))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UserMetrics {
    pub posts_per_day: f64,
    pub duplicate_text_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotDecision {
    pub user_id: String,
    pub is_bot: bool,
    pub trust_score: f64,
    pub metrics: UserMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BotStats {
    pub total_users: usize,
    pub bots_detected: usize,
    pub percent_removed: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillDegree {
    pub skill: String,
    pub degree: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillPair {
    pub skill_1: String,
    pub skill_2: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionCluster {
    pub region: String,
    pub cluster_id: usize,
    pub top_skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekCount {
    pub week: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub week: NaiveDate,
    pub predicted_count: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Declining,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Rising => "rising",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub skill: String,
    pub historical: Vec<WeekCount>,
    pub forecast: Vec<ForecastPoint>,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub total_records: usize,
    pub total_users: usize,
    pub total_regions: usize,
    pub total_skills: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionHeat {
    pub region: String,
    pub skill_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ingested {
    #[serde(skip)]
    pub records: RecordSet,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub ingested_at: DateTime<Utc>,
    pub source_type: &'static str,
}
