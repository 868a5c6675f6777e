//! Error types shared across the crate.
use thiserror::Error;

/// Errors produced while building carpets and filters or while persisting their data
#[derive(Error, Debug)]
pub enum CarpetError {
    #[error("invalid carpet map: {0}")]
    InvalidMap(String),

    #[error("invalid filter configuration: {0}")]
    InvalidConfig(String),

    #[error("particle filter is not initialized; it initializes on the first update")]
    NotInitialized,

    #[error("input logging is not enabled for this filter")]
    LoggingDisabled,

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("input log format version {found} is not supported (expected {expected})")]
    LogVersion { found: u32, expected: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, CarpetError>;
