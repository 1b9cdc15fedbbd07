use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::models::{Column, Forecast, ForecastPoint, RecordSet, Trend, WeekCount};
use crate::normalize::round_to;

const MIN_SLOPE_THRESHOLD: f64 = 0.1;
const RELATIVE_SLOPE_THRESHOLD: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

/// Sunday that opens the week containing `ts`.
pub fn week_start(ts: NaiveDateTime) -> NaiveDate {
    let date = ts.date();
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

pub fn forecast_skill(records: &RecordSet, skill: &str, horizon_weeks: usize) -> Forecast {
    let skill = skill.trim();
    let empty = Forecast {
        skill: skill.to_string(),
        historical: Vec::new(),
        forecast: Vec::new(),
        trend: Trend::Stable,
    };
    if skill.is_empty() || !records.has(Column::Timestamp) || !records.has(Column::SkillTags) {
        return empty;
    }

    let historical = weekly_counts(records, skill);
    if historical.is_empty() {
        debug!(skill, "no records mention skill");
        return empty;
    }
    if historical.len() < 2 {
        return Forecast {
            historical,
            ..empty
        };
    }

    let counts: Vec<f64> = historical.iter().map(|point| point.count as f64).collect();
    let fit = linear_fit(&counts);
    let mean_count = counts.iter().sum::<f64>() / counts.len() as f64;
    let trend = classify(fit.slope, mean_count);

    let last_index = historical.len() - 1;
    let last_week = historical[last_index].week;
    // stops early once the calendar runs out
    let forecast: Vec<ForecastPoint> = (1..=horizon_weeks)
        .map_while(|i| {
            let week = i64::try_from(i)
                .ok()
                .and_then(Duration::try_weeks)
                .and_then(|offset| last_week.checked_add_signed(offset))?;
            let x = (last_index + i) as f64;
            Some(ForecastPoint {
                week,
                predicted_count: round_to(fit.slope * x + fit.intercept, 1).max(0.0),
            })
        })
        .collect();

    info!(
        skill,
        weeks = historical.len(),
        slope = fit.slope,
        %trend,
        horizon_weeks,
        "forecast complete"
    );

    Forecast {
        skill: skill.to_string(),
        historical,
        forecast,
        trend,
    }
}

/// Dense weekly counts from the first to the last week that mentions `skill`.
pub fn weekly_counts(records: &RecordSet, skill: &str) -> Vec<WeekCount> {
    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in &records.records {
        if record.skill_tags.iter().any(|tag| tag.trim() == skill) {
            *buckets.entry(week_start(record.timestamp)).or_insert(0) += 1;
        }
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut week = first;
    while week <= last {
        series.push(WeekCount {
            week,
            count: buckets.get(&week).copied().unwrap_or(0),
        });
        match week.checked_add_signed(Duration::weeks(1)) {
            Some(next) => week = next,
            None => break,
        }
    }
    series
}

/// Ordinary least squares of `values` against their index.
pub fn linear_fit(values: &[f64]) -> LinearFit {
    let n = values.len() as f64;
    if values.is_empty() {
        return LinearFit {
            slope: 0.0,
            intercept: 0.0,
        };
    }
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }
    let slope = if sxx == 0.0 { 0.0 } else { sxy / sxx };
    LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    }
}

pub fn classify(slope: f64, mean_count: f64) -> Trend {
    let threshold = MIN_SLOPE_THRESHOLD.max(mean_count * RELATIVE_SLOPE_THRESHOLD);
    if slope > threshold {
        Trend::Rising
    } else if slope < -threshold {
        Trend::Declining
    } else {
        Trend::Stable
    }
}
