//! Query configuration parser.
//!
//! Queries are defined as `[query.<name>]` tables in one main TOML file,
//! optionally extended by every `*.toml` file of a config directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Job, MergePolicy, Policy, TriggerSpec};

/// Interval used when a query sets neither `interval_secs` nor `cron`.
pub const DEFAULT_INTERVAL_SECS: f64 = 15.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExporterConfig {
    #[serde(default)]
    pub query: BTreeMap<String, QueryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    pub database: String,
    pub statement: String,
    pub value_columns: Vec<String>,
    pub interval_secs: Option<f64>,
    /// Takes precedence over `interval_secs` when both are set.
    pub cron: Option<String>,
    pub cron_timezone: Option<String>,
    #[serde(default)]
    pub on_error: Policy,
    #[serde(default)]
    pub on_missing: Policy,
}

impl ExporterConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the main file, then merge every `*.toml` file of `dir` in
    /// filename order. A missing directory is not an error.
    pub fn load(main: &Path, dir: Option<&Path>) -> ConfigResult<Self> {
        let mut config = Self::from_file(main)?;
        debug!(path = ?main, queries = config.query.len(), "loaded config file");

        let Some(dir) = dir else {
            return Ok(config);
        };
        if !dir.is_dir() {
            debug!(path = ?dir, "config directory not found, skipping");
            return Ok(config);
        }

        for path in config_dir_files(dir)? {
            let extra = Self::from_file(&path)?;
            debug!(path = ?path, queries = extra.query.len(), "merging config file");
            config.merge(extra);
        }
        Ok(config)
    }

    /// Merge `other` into `self`. A query defined in both is replaced by
    /// `other`'s definition.
    pub fn merge(&mut self, other: ExporterConfig) {
        self.query.extend(other.query);
    }

    /// Validate every query and build its immutable [`Job`].
    pub fn jobs(&self) -> ConfigResult<Vec<Job>> {
        self.query
            .iter()
            .map(|(name, query)| query.to_job(name))
            .collect()
    }
}

impl QueryConfig {
    pub fn to_job(&self, name: &str) -> ConfigResult<Job> {
        let invalid = |reason: &str| ConfigError::Invalid {
            query: name.to_string(),
            reason: reason.to_string(),
        };

        if self.database.trim().is_empty() {
            return Err(invalid("database must not be empty"));
        }
        if self.statement.trim().is_empty() {
            return Err(invalid("statement must not be empty"));
        }
        if self.value_columns.is_empty() {
            return Err(invalid("value_columns must list at least one column"));
        }

        let trigger = match &self.cron {
            Some(expression) => TriggerSpec::Cron {
                expression: expression.clone(),
                timezone: self.cron_timezone.clone(),
            },
            None => {
                let secs = self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);
                let interval = Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| invalid("interval_secs must be a positive number in range"))?;
                TriggerSpec::Interval(interval)
            }
        };

        Ok(Job {
            name: name.to_string(),
            database: self.database.clone(),
            statement: self.statement.clone(),
            value_columns: self.value_columns.clone(),
            trigger,
            policy: MergePolicy {
                on_error: self.on_error,
                on_missing: self.on_missing,
            },
        })
    }
}

fn config_dir_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    let read_err = |source| ConfigError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
