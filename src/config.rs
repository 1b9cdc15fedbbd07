use std::path::Path;

use serde::Deserialize;

use crate::error::{AnalyticsError, Result};

pub const DEFAULT_POSTS_PER_DAY_THRESHOLD: f64 = 40.0;
pub const DEFAULT_DUPLICATE_TEXT_THRESHOLD: f64 = 0.75;
pub const DEFAULT_CLUSTERS: usize = 3;
pub const DEFAULT_HORIZON_WEEKS: usize = 12;
/// Ten years of weekly forecast points.
pub const MAX_HORIZON_WEEKS: usize = 520;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BotThresholds {
    pub posts_per_day: f64,
    pub duplicate_text_ratio: f64,
}

impl Default for BotThresholds {
    fn default() -> Self {
        Self {
            posts_per_day: DEFAULT_POSTS_PER_DAY_THRESHOLD,
            duplicate_text_ratio: DEFAULT_DUPLICATE_TEXT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub bot: BotThresholds,
    pub n_clusters: usize,
    pub horizon_weeks: usize,
    pub cluster_seed: u64,
    pub cluster_restarts: usize,
    pub top_n: usize,
    pub cluster_top_skills: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            bot: BotThresholds::default(),
            n_clusters: DEFAULT_CLUSTERS,
            horizon_weeks: DEFAULT_HORIZON_WEEKS,
            cluster_seed: 42,
            cluster_restarts: 10,
            top_n: 10,
            cluster_top_skills: 5,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: AnalyticsConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let ppd = self.bot.posts_per_day;
        if !ppd.is_finite() || ppd < 0.0 {
            return Err(AnalyticsError::InvalidConfig(format!(
                "posts_per_day threshold must be a non-negative number, got {ppd}"
            )));
        }
        let dup = self.bot.duplicate_text_ratio;
        if !(0.0..=1.0).contains(&dup) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "duplicate_text_ratio threshold must be within [0, 1], got {dup}"
            )));
        }
        if self.n_clusters == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "n_clusters must be at least 1".to_string(),
            ));
        }
        if self.horizon_weeks > MAX_HORIZON_WEEKS {
            return Err(AnalyticsError::InvalidConfig(format!(
                "horizon_weeks must be at most {MAX_HORIZON_WEEKS}, got {}",
                self.horizon_weeks
            )));
        }
        if self.cluster_restarts == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "cluster_restarts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.bot.posts_per_day, 40.0);
        assert_eq!(config.bot.duplicate_text_ratio, 0.75);
        assert_eq!(config.n_clusters, 3);
        assert_eq!(config.horizon_weeks, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AnalyticsConfig::from_toml_str(
            r#"
            n_clusters = 5

            [bot]
            posts_per_day = 25.0
            "#,
        )
        .unwrap();
        assert_eq!(config.n_clusters, 5);
        assert_eq!(config.bot.posts_per_day, 25.0);
        assert_eq!(config.bot.duplicate_text_ratio, 0.75);
        assert_eq!(config.horizon_weeks, 12);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = AnalyticsConfig::default();
        config.bot.duplicate_text_ratio = 1.5;
        assert!(matches!(config.validate(), Err(AnalyticsError::InvalidConfig(_))));

        let mut config = AnalyticsConfig::default();
        config.n_clusters = 0;
        assert!(config.validate().is_err());

        assert!(AnalyticsConfig::from_toml_str("[bot]\nposts_per_day = -1.0").is_err());

        let mut config = AnalyticsConfig::default();
        config.horizon_weeks = MAX_HORIZON_WEEKS;
        assert!(config.validate().is_ok());
        config.horizon_weeks = 14_000_000;
        assert!(config.validate().is_err());
    }
}
