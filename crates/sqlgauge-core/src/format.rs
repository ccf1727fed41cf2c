//! Canonical metric names, label keys, and label values.

use std::collections::BTreeMap;

use tracing::warn;

use crate::types::Labels;

/// Join name parts into one metric name.
///
/// Parts are joined with `_`; every character outside `[a-zA-Z0-9_:]`
/// becomes `_`, and a leading digit is prefixed with `_`.
pub fn format_metric_name<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("_");
    sanitize(&joined, true)
}

/// Sanitize a label key. Same rules as metric names, minus `:`.
pub fn format_label_key(key: &str) -> String {
    sanitize(key, false)
}

/// Collapse the source values of one label into a single label value.
///
/// Composite values are joined with `_`. This is lossy: `["a_b"]` and
/// `["a", "b"]` produce the same value, and downstream consumers rely on it.
pub fn format_label_value<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("_")
}

/// Format every key and value of a raw label set.
///
/// Sanitizing can map distinct source keys onto one label key, e.g.
/// `host.name` and `host_name`. The later one wins and a warning is
/// logged. Repeating the same source key is a plain override.
pub fn format_labels<I>(labels: I) -> Labels
where
    I: IntoIterator<Item = (String, Vec<String>)>,
{
    let mut sources: BTreeMap<String, String> = BTreeMap::new();
    let mut out = Labels::new();
    for (raw_key, values) in labels {
        let key = format_label_key(&raw_key);
        if let Some(previous) = sources.get(&key) {
            if *previous != raw_key {
                warn!(
                    label = %key,
                    replaced = %previous,
                    by = %raw_key,
                    "label keys collide after sanitizing"
                );
            }
        }
        out.insert(key.clone(), format_label_value(&values));
        sources.insert(key, raw_key);
    }
    out
}

fn sanitize(raw: &str, allow_colon: bool) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    if raw.starts_with(|c: char| c.is_ascii_digit()) {
        out.push('_');
    }
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || (allow_colon && c == ':') {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}
