//! Metric reconciler — owns the published per-query metric state.
//!
//! Every job outcome is merged with the job's previous state according to
//! its [`MergePolicy`], and the result replaces the job's entry as a whole.
//! Entries are `Arc`-shared and never mutated in place, so a scrape that
//! copied the map keeps reading a consistent set.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use sqlgauge_core::{MergePolicy, MetricSample, Policy, SeriesKey};

/// Help text and value of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub help: String,
    pub value: f64,
}

/// The series published by one job, keyed and ordered by identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    series: BTreeMap<SeriesKey, Reading>,
}

impl MetricSet {
    /// Build a set from samples. A later sample with the same identity
    /// replaces an earlier one.
    pub fn from_samples<I: IntoIterator<Item = MetricSample>>(samples: I) -> Self {
        let series = samples
            .into_iter()
            .map(|s| {
                (
                    SeriesKey {
                        name: s.name,
                        labels: s.labels,
                    },
                    Reading {
                        help: s.help,
                        value: s.value,
                    },
                )
            })
            .collect();
        Self { series }
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&Reading> {
        self.series.get(key)
    }

    /// Series in identity order: by metric name, then labels.
    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &Reading)> {
        self.series.iter()
    }

    fn zeroed(&self) -> Self {
        let series = self
            .series
            .iter()
            .map(|(key, reading)| (key.clone(), zero(reading)))
            .collect();
        Self { series }
    }

    /// Add every series of `prior` missing from `self`, mapped through `carry`.
    fn with_missing_from(mut self, prior: &MetricSet, carry: fn(&Reading) -> Reading) -> Self {
        for (key, reading) in &prior.series {
            if !self.series.contains_key(key) {
                self.series.insert(key.clone(), carry(reading));
            }
        }
        self
    }
}

fn zero(reading: &Reading) -> Reading {
    Reading {
        help: reading.help.clone(),
        value: 0.0,
    }
}

/// Result of one job run.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Success(Vec<MetricSample>),
    Failure,
}

/// Authoritative job name → metric set mapping.
#[derive(Default)]
pub struct MetricReconciler {
    state: RwLock<HashMap<String, Arc<MetricSet>>>,
}

impl MetricReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `outcome` into the job's state and replace its entry.
    ///
    /// A failure before any successful run records nothing.
    pub async fn reconcile(&self, job_name: &str, policy: MergePolicy, outcome: JobOutcome) {
        let mut state = self.state.write().await;

        let next = match (state.get(job_name), outcome) {
            (None, JobOutcome::Success(samples)) => Arc::new(MetricSet::from_samples(samples)),
            (None, JobOutcome::Failure) => {
                debug!(job = %job_name, "no prior metrics, nothing to reconcile");
                return;
            }
            (Some(prior), JobOutcome::Success(samples)) => Arc::new(merge_success(
                prior,
                MetricSet::from_samples(samples),
                policy.on_missing,
            )),
            (Some(prior), JobOutcome::Failure) => merge_failure(prior, policy.on_error),
        };

        debug!(job = %job_name, series = next.len(), "metric state replaced");
        state.insert(job_name.to_string(), next);
    }

    /// Shallow copy of the whole mapping. Sets are shared, not cloned.
    pub async fn snapshot(&self) -> HashMap<String, Arc<MetricSet>> {
        self.state.read().await.clone()
    }

    /// Current state of one job, if it has any.
    pub async fn job_metrics(&self, job_name: &str) -> Option<Arc<MetricSet>> {
        self.state.read().await.get(job_name).cloned()
    }
}

fn merge_success(prior: &MetricSet, new: MetricSet, on_missing: Policy) -> MetricSet {
    match on_missing {
        Policy::Drop => new,
        Policy::Preserve => new.with_missing_from(prior, Reading::clone),
        Policy::Zero => new.with_missing_from(prior, zero),
    }
}

fn merge_failure(prior: &Arc<MetricSet>, on_error: Policy) -> Arc<MetricSet> {
    match on_error {
        Policy::Drop => Arc::new(MetricSet::default()),
        Policy::Preserve => Arc::clone(prior),
        Policy::Zero => Arc::new(prior.zeroed()),
    }
}
