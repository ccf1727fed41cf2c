//! sqlgauge-core — shared building blocks for the sqlgauge exporter.
//!
//! # Architecture
//!
//! ```text
//! ExporterConfig (TOML)
//!   └── jobs() → Vec<Job>
//!
//! QueryExecutor::fetch(db, sql) → Vec<Row>
//!   └── parse_rows() → Vec<MetricSample>
//!         └── format_metric_name() / format_labels()
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod format;
pub mod parser;
pub mod types;

pub use config::{ExporterConfig, QueryConfig};
pub use error::{ConfigError, ConfigResult, ParseError, QueryError};
pub use executor::{BoxFuture, QueryExecutor};
pub use format::{format_label_key, format_label_value, format_labels, format_metric_name};
pub use parser::parse_rows;
pub use types::*;
