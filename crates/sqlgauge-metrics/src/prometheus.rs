//! Prometheus text exposition format.
//!
//! Collectors are registered once and asked for their metric families on
//! every scrape. Families are rendered as gauges.

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlgauge_core::BoxFuture;

/// A single sample within a metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySample {
    /// Label pairs in the order they are rendered.
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

/// A gauge family: one name, one help text, many samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub samples: Vec<FamilySample>,
}

/// Anything that can produce its current metric families on demand.
pub trait Collector: Send + Sync {
    /// Unique name for this collector, used in logs.
    fn name(&self) -> &str;

    fn collect(&self) -> BoxFuture<'_, Vec<MetricFamily>>;
}

/// Holds registered collectors and gathers metrics from them.
#[derive(Clone, Default)]
pub struct Registry {
    collectors: Vec<Arc<dyn Collector>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        tracing::debug!(collector = collector.name(), "collector registered");
        self.collectors.push(collector);
    }

    /// Collect from every collector. Families sharing a name are merged;
    /// the first help text wins.
    pub async fn gather(&self) -> Vec<MetricFamily> {
        let mut merged: BTreeMap<String, MetricFamily> = BTreeMap::new();
        for collector in &self.collectors {
            for family in collector.collect().await {
                match merged.get_mut(&family.name) {
                    Some(existing) => existing.samples.extend(family.samples),
                    None => {
                        merged.insert(family.name.clone(), family);
                    }
                }
            }
        }
        merged.into_values().collect()
    }

    /// Gather and render in one step, for the `/metrics` endpoint.
    pub async fn render(&self) -> String {
        render_prometheus(&self.gather().await)
    }
}

/// Render metric families into Prometheus text format.
pub fn render_prometheus(families: &[MetricFamily]) -> String {
    let mut out = String::new();
    for family in families {
        out.push_str(&format!("# HELP {} {}\n", family.name, escape_help(&family.help)));
        out.push_str(&format!("# TYPE {} gauge\n", family.name));
        for sample in &family.samples {
            out.push_str(&family.name);
            if !sample.labels.is_empty() {
                out.push('{');
                for (i, (key, value)) in sample.labels.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("{}=\"{}\"", key, escape_label_value(value)));
                }
                out.push('}');
            }
            out.push(' ');
            out.push_str(&format_value(sample.value));
            out.push('\n');
        }
    }
    out
}

fn escape_label_value(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Integers without a decimal point, everything else in shortest
/// round-trip form.
fn format_value(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v.is_sign_positive() { "+Inf" } else { "-Inf" }.to_string();
    }
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
