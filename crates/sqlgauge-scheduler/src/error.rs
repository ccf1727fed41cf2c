//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while building or running the schedule.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("interval must be positive")]
    InvalidInterval,

    #[error("job already scheduled: {0}")]
    DuplicateJob(String),

    #[error("cron expression {0:?} has no upcoming run")]
    NoUpcomingRun(String),

    #[error("cron evaluator returned a non-positive delay for {0:?}")]
    NonPositiveDelay(String),

    #[error("next wake overflows the clock (step {0:?})")]
    WakeOverflow(std::time::Duration),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
