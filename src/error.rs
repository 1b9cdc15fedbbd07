use thiserror::Error;

use crate::models::Column;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    pub fn missing_columns(columns: &[Column]) -> Self {
        AnalyticsError::Schema {
            missing: columns.iter().map(|column| column.name().to_string()).collect(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
