//! Scrape-time collector over the reconciler's state.

use std::sync::Arc;

use sqlgauge_core::BoxFuture;

use crate::prometheus::{Collector, FamilySample, MetricFamily};
use crate::reconciler::{MetricReconciler, MetricSet};

/// Emits every job's published series on each scrape.
///
/// Reads from a shallow copy of the job map, so reconciliations that land
/// during a scrape are simply not visible until the next one.
pub struct QueryMetricCollector {
    reconciler: Arc<MetricReconciler>,
}

impl QueryMetricCollector {
    pub fn new(reconciler: Arc<MetricReconciler>) -> Self {
        Self { reconciler }
    }

    pub async fn families(&self) -> Vec<MetricFamily> {
        let snapshot = self.reconciler.snapshot().await;

        let mut jobs: Vec<_> = snapshot.into_iter().collect();
        jobs.sort_by(|a, b| a.0.cmp(&b.0));

        jobs.iter()
            .flat_map(|(_, set)| group_by_name(set))
            .collect()
    }
}

impl Collector for QueryMetricCollector {
    fn name(&self) -> &str {
        "query_metrics"
    }

    fn collect(&self) -> BoxFuture<'_, Vec<MetricFamily>> {
        Box::pin(self.families())
    }
}

/// One family per metric name. The set iterates in name order, so equal
/// names are adjacent; labels come out in sorted key order.
fn group_by_name(set: &MetricSet) -> Vec<MetricFamily> {
    let mut families: Vec<MetricFamily> = Vec::new();
    for (key, reading) in set.iter() {
        let sample = FamilySample {
            labels: key
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            value: reading.value,
        };
        match families.last_mut() {
            Some(family) if family.name == key.name => family.samples.push(sample),
            _ => families.push(MetricFamily {
                name: key.name.clone(),
                help: reading.help.clone(),
                samples: vec![sample],
            }),
        }
    }
    families
}
