//! Domain types shared by the parser, reconciler, and scheduler.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Unique name of a configured query job.
pub type JobName = String;

/// Label key → label value. Ordered so that series identity and rendering
/// are independent of column order.
pub type Labels = BTreeMap<String, String>;

// ── Result rows ───────────────────────────────────────────────────

/// A single decoded result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact-precision decimal as sent by the server.
    Decimal(String),
    Text(String),
    Null,
}

impl Value {
    /// Numeric view of the cell, or `None` for anything that cannot be a
    /// metric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Decimal(s) => s.trim().parse().ok(),
            Value::Text(_) | Value::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(s) | Value::Text(s) => f.write_str(s),
            Value::Null => Ok(()),
        }
    }
}

/// One result row: column name → value, in result-set column order.
pub type Row = Vec<(String, Value)>;

// ── Jobs ──────────────────────────────────────────────────────────

/// What to do with previously published series when a run fails or a
/// series goes missing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Keep the last known value.
    Preserve,
    /// Stop publishing the series.
    #[default]
    Drop,
    /// Keep the series, forced to 0.
    Zero,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Policy::Preserve => "preserve",
            Policy::Drop => "drop",
            Policy::Zero => "zero",
        };
        f.write_str(s)
    }
}

/// Reconciliation policies of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MergePolicy {
    /// Applied to the previous state when a run fails.
    pub on_error: Policy,
    /// Applied to series absent from a successful run.
    pub on_missing: Policy,
}

/// When a job runs. Cron expressions are validated by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerSpec {
    Interval(Duration),
    Cron {
        expression: String,
        /// IANA zone name; `None` means the system local zone.
        timezone: Option<String>,
    },
}

/// One configured recurring query.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: JobName,
    pub database: String,
    pub statement: String,
    pub value_columns: Vec<String>,
    pub trigger: TriggerSpec,
    pub policy: MergePolicy,
}

// ── Samples ───────────────────────────────────────────────────────

/// Identity of a metric series: two samples with the same key are the
/// same series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub name: String,
    pub labels: Labels,
}

/// One named, labelled observation produced by a job run.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub help: String,
    pub labels: Labels,
    pub value: f64,
}

impl MetricSample {
    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            name: self.name.clone(),
            labels: self.labels.clone(),
        }
    }
}
