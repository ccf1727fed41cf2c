//! sqlgauge-scheduler — time-ordered job dispatch.
//!
//! One loop owns a min-heap of wake instants and runs due jobs one at a
//! time. A job's failure or panic is logged and the job is rescheduled;
//! only shutdown (or a broken cron evaluator) ends the loop.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── BinaryHeap<Reverse<Wake>>   (earliest first)
//!   └── ScheduledJob
//!       ├── Trigger::Interval → last_scheduled + n·interval
//!       └── Trigger::Cron     → next cron match in the job's zone
//! ```

pub mod error;
pub mod scheduler;
pub mod trigger;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{job_action, JobAction, Scheduler};
pub use trigger::{CronZone, Trigger};
