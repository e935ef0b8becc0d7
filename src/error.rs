use thiserror::Error;

use crate::aggregate::WatershedId;

// Errors raised while assigning and aggregating curve numbers
#[derive(Debug, Error)]
pub enum Error {
    // Zone table is missing an entry or holds invalid values
    #[error("configuration error: {message}")]
    Configuration { message: String },

    // Aggregation or runoff math has no meaningful result
    #[error("domain error in {record}: {message}")]
    Domain { record: String, message: String },

    // Record attribute is missing or malformed
    #[error("input error in {record}: {message}")]
    Input { record: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn missing_zone(zone: &str) -> Self {
        Error::Configuration {
            message: format!("no curve number entry for land-use zone '{zone}'"),
        }
    }

    pub(crate) fn zero_area(watershed: WatershedId) -> Self {
        Error::domain(watershed.to_string(), "total area is zero, cannot area-weight")
    }

    pub(crate) fn domain(record: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Domain {
            record: record.into(),
            message: message.into(),
        }
    }

    pub(crate) fn input(record: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Input {
            record: record.into(),
            message: message.into(),
        }
    }
}
