//! Job body: execute, parse, reconcile.

use tracing::debug;

use sqlgauge_core::{parse_rows, Job, QueryError, QueryExecutor};

use crate::reconciler::{JobOutcome, MetricReconciler};

/// Run one job's query and reconcile the outcome into `reconciler`.
///
/// Failures are reconciled with the job's on-error policy before being
/// returned, so the caller only has to report them. Returns the number of
/// samples the run produced.
pub async fn run_query(
    job: &Job,
    executor: &dyn QueryExecutor,
    reconciler: &MetricReconciler,
) -> Result<usize, QueryError> {
    debug!(job = %job.name, db = %job.database, "running query");

    let result = executor
        .fetch(&job.database, &job.statement)
        .await
        .and_then(|rows| {
            parse_rows(&job.name, &job.database, &job.value_columns, &rows)
                .map_err(QueryError::from)
        });

    match result {
        Ok(samples) => {
            let count = samples.len();
            reconciler
                .reconcile(&job.name, job.policy, JobOutcome::Success(samples))
                .await;
            debug!(job = %job.name, samples = count, "query succeeded");
            Ok(count)
        }
        Err(e) => {
            reconciler
                .reconcile(&job.name, job.policy, JobOutcome::Failure)
                .await;
            Err(e)
        }
    }
}
