//! Error types for sqlgauge configuration, query execution, and parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading query definitions. All of these are fatal
/// at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("query {query}: {reason}")]
    Invalid { query: String, reason: String },
}

/// Errors from the query execution capability.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("statement error: {0}")]
    Statement(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors raised while turning rows into samples.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("value column {column} missing from result set")]
    MissingValueColumn { column: String },
}
