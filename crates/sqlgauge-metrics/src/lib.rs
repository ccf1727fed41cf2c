//! sqlgauge-metrics — the metric side of the exporter.
//!
//! Owns the published per-query metric state, reconciles every job
//! outcome into it, and exposes it to scrapes in Prometheus text format.
//!
//! # Architecture
//!
//! ```text
//! run_query()                      ← job body, called by the scheduler
//!   ├── QueryExecutor::fetch()
//!   ├── parse_rows()
//!   └── MetricReconciler::reconcile()
//!
//! Registry                         ← scrape
//!   └── QueryMetricCollector::collect()
//!         └── MetricReconciler::snapshot()
//! ```

pub mod collector;
pub mod pipeline;
pub mod prometheus;
pub mod reconciler;

pub use collector::QueryMetricCollector;
pub use pipeline::run_query;
pub use prometheus::{render_prometheus, Collector, FamilySample, MetricFamily, Registry};
pub use reconciler::{JobOutcome, MetricReconciler, MetricSet, Reading};
