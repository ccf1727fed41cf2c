//! Row parser — turns a query result into metric samples.

use crate::error::ParseError;
use crate::format::{format_labels, format_metric_name};
use crate::types::{MetricSample, Row};

/// Label carrying the target database on every sample.
pub const DB_LABEL: &str = "db";

/// Parse a query result into metric samples.
///
/// Each value column of each row yields one sample, as long as the cell is
/// numeric. Every other column becomes a label, as does the database name
/// under [`DB_LABEL`]. A result column named `db` overrides it.
///
/// A value column absent from a row is an error: the statement and the
/// configuration disagree.
pub fn parse_rows(
    job_name: &str,
    database: &str,
    value_columns: &[String],
    rows: &[Row],
) -> Result<Vec<MetricSample>, ParseError> {
    let mut samples = Vec::new();

    for row in rows {
        let raw_labels = std::iter::once((DB_LABEL.to_string(), vec![database.to_string()])).chain(
            row.iter()
                .filter(|(column, _)| !value_columns.contains(column))
                .map(|(column, value)| (column.clone(), vec![value.to_string()])),
        );
        let labels = format_labels(raw_labels);

        for column in value_columns {
            let value = row
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| value)
                .ok_or_else(|| ParseError::MissingValueColumn {
                    column: column.clone(),
                })?;

            if let Some(value) = value.as_f64() {
                samples.push(MetricSample {
                    name: format_metric_name(&[job_name, column.as_str()]),
                    help: format!("Value column '{column}' for query '{job_name}'."),
                    labels: labels.clone(),
                    value,
                });
            }
        }
    }

    Ok(samples)
}
