use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{AnalyticsError, Result};
use crate::models::{Column, Ingested, Record, RecordSet};
use crate::normalize::split_skill_tags;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    raw_text: Option<String>,
    #[serde(default)]
    skill_tags: Option<String>,
    #[serde(default)]
    engagement: Option<String>,
}

pub fn read_path(csv_path: &Path) -> Result<Ingested> {
    let file = std::fs::File::open(csv_path)?;
    read_records(file)
}

/// Strict ingestion: every column must be present in the header.
pub fn read_records<R: Read>(reader: R) -> Result<Ingested> {
    let ingested = read_partial(reader)?;
    let missing = ingested.records.missing(&Column::ALL);
    if !missing.is_empty() {
        return Err(AnalyticsError::missing_columns(&missing));
    }
    Ok(ingested)
}

pub fn read_partial<R: Read>(reader: R) -> Result<Ingested> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let columns: Vec<Column> = reader
        .headers()?
        .iter()
        .filter_map(Column::from_name)
        .collect();
    let has_timestamp = columns.contains(&Column::Timestamp);

    let mut records = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_dropped = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        rows_read += 1;

        let timestamp = match row.timestamp.as_deref().map(parse_timestamp) {
            Some(Some(ts)) => ts,
            Some(None) => {
                warn!(row = rows_read, value = ?row.timestamp, "dropping row with unparseable timestamp");
                rows_dropped += 1;
                continue;
            }
            None if has_timestamp => {
                warn!(row = rows_read, "dropping row with empty timestamp");
                rows_dropped += 1;
                continue;
            }
            None => NaiveDateTime::default(),
        };

        let engagement = row
            .engagement
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| match raw.parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    debug!(row = rows_read, raw, "engagement is not numeric, using 0");
                    None
                }
            })
            .unwrap_or(0.0);

        records.push(Record {
            user_id: row.user_id.unwrap_or_default(),
            region: row.region.unwrap_or_default().trim().to_string(),
            timestamp,
            source: row.source.unwrap_or_default().trim().to_lowercase(),
            raw_text: row.raw_text.unwrap_or_default(),
            skill_tags: split_skill_tags(row.skill_tags.as_deref().unwrap_or_default()),
            engagement,
        });
    }

    info!(rows_read, rows_dropped, kept = records.len(), "ingested csv");

    Ok(Ingested {
        records: RecordSet::with_columns(columns, records),
        rows_read,
        rows_dropped,
        ingested_at: Utc::now(),
        source_type: "csv",
    })
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const HEADER: &str = "user_id,region,timestamp,source,raw_text,skill_tags,engagement\n";

    #[test]
    fn reads_and_normalizes_rows() {
        let data = format!(
            "{HEADER}u1, Pune ,2024-01-01 10:00:00, Reddit ,Learning rust,Rust; SQL ;,12\n\
             u2,Delhi,2024-01-02,twitter,hello,,\n"
        );
        let ingested = read_records(data.as_bytes()).unwrap();
        assert_eq!(ingested.rows_read, 2);
        assert_eq!(ingested.rows_dropped, 0);
        assert_eq!(ingested.source_type, "csv");

        let records = &ingested.records.records;
        assert_eq!(records[0].region, "Pune");
        assert_eq!(records[0].source, "reddit");
        assert_eq!(records[0].skill_tags, vec!["Rust", "SQL"]);
        assert_eq!(records[0].engagement, 12.0);
        assert!(records[1].skill_tags.is_empty());
        assert_eq!(records[1].engagement, 0.0);
    }

    #[test]
    fn drops_rows_with_bad_timestamps() {
        let data = format!(
            "{HEADER}u1,Pune,not-a-date,web,a,Rust,1\n\
             u2,Pune,,web,b,Rust,1\n\
             u3,Pune,2024-03-04T08:30:00Z,web,c,Rust,1\n"
        );
        let ingested = read_records(data.as_bytes()).unwrap();
        assert_eq!(ingested.rows_read, 3);
        assert_eq!(ingested.rows_dropped, 2);
        assert_eq!(ingested.records.len(), 1);
        assert_eq!(ingested.records.records[0].user_id, "u3");
    }

    #[test]
    fn strict_read_reports_missing_columns() {
        let data = "user_id,timestamp,raw_text\nu1,2024-01-01,hi\n";
        match read_records(data.as_bytes()) {
            Err(AnalyticsError::Schema { missing }) => {
                assert_eq!(missing, vec!["region", "source", "skill_tags", "engagement"]);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn partial_read_tracks_present_columns() {
        let data = "region,skill_tags\nPune,Rust;Go\n";
        let ingested = read_partial(data.as_bytes()).unwrap();
        assert!(ingested.records.has(Column::Region));
        assert!(!ingested.records.has(Column::UserId));
        assert_eq!(ingested.records.records[0].skill_tags, vec!["Rust", "Go"]);
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{HEADER}u1,Pune,2024-01-01,web,hi,Rust,3\n").unwrap();
        let ingested = read_path(file.path()).unwrap();
        assert_eq!(ingested.records.len(), 1);
    }

    #[test]
    fn parses_supported_timestamp_formats() {
        assert!(parse_timestamp("2024-01-01").is_some());
        assert!(parse_timestamp("2024-01-01 09:15").is_some());
        assert!(parse_timestamp("2024-01-01T09:15:00+05:30").is_some());
        assert!(parse_timestamp("01/02/2024").is_none());
    }
}
