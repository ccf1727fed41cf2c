//! Scheduler — single dispatch loop over a min-heap of wake instants.
//!
//! Jobs run one at a time. Each body is spawned and awaited on the spot so
//! that a panic surfaces as a `JoinError` instead of unwinding through the
//! loop. Every run is followed by a reschedule, whatever its outcome.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use sqlgauge_core::BoxFuture;

use crate::error::{SchedulerError, SchedulerResult};
use crate::trigger::Trigger;

/// Body of a job. Called once per run; the returned future owns
/// everything it needs.
pub type JobAction = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`JobAction`].
pub fn job_action<F, Fut>(f: F) -> JobAction
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(f()) })
}

struct ScheduledJob {
    name: String,
    trigger: Trigger,
    action: JobAction,
}

/// Queue entry. `seq` keeps equal instants in insertion order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Wake {
    at: Instant,
    seq: u64,
    job: usize,
}

/// Time-ordered dispatcher for interval and cron jobs.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    queue: BinaryHeap<Reverse<Wake>>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Its first run is due immediately.
    pub fn add_job(&mut self, name: &str, trigger: Trigger, action: JobAction) -> SchedulerResult<()> {
        if self.jobs.iter().any(|j| j.name == name) {
            return Err(SchedulerError::DuplicateJob(name.to_string()));
        }

        let index = self.jobs.len();
        self.jobs.push(ScheduledJob {
            name: name.to_string(),
            trigger,
            action,
        });
        self.enqueue(Instant::now(), index);
        debug!(job = %name, "job scheduled");
        Ok(())
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Run until `shutdown` broadcasts `true` or its sender is dropped.
    ///
    /// Returns an error only when a cron trigger yields a non-positive
    /// delay, which is a defect rather than a schedulable state. A job
    /// whose next wake cannot be represented is retired instead.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerResult<()> {
        info!(jobs = self.jobs.len(), "scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let Some(Reverse(wake)) = self.queue.pop() else {
                debug!("no jobs scheduled, idling until shutdown");
                if shutdown.changed().await.is_err() {
                    break;
                }
                continue;
            };

            tokio::select! {
                _ = tokio::time::sleep_until(wake.at) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    self.queue.push(Reverse(wake));
                    continue;
                }
            }

            let job = &self.jobs[wake.job];
            run_job(job).await;
            let next = job.trigger.next_wake(wake.at, Instant::now(), Utc::now());

            match next {
                Ok(at) => {
                    debug!(
                        job = %self.jobs[wake.job].name,
                        delay_ms = at.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "job rescheduled"
                    );
                    self.enqueue(at, wake.job);
                }
                Err(SchedulerError::NoUpcomingRun(expression)) => {
                    warn!(
                        job = %self.jobs[wake.job].name,
                        %expression,
                        "cron expression has no upcoming run, job retired"
                    );
                }
                Err(e @ SchedulerError::WakeOverflow(_)) => {
                    error!(job = %self.jobs[wake.job].name, error = %e, "job retired");
                }
                Err(e) => {
                    error!(job = %self.jobs[wake.job].name, error = %e, "cannot reschedule job");
                    return Err(e);
                }
            }
        }

        info!("scheduler shutting down");
        Ok(())
    }

    fn enqueue(&mut self, at: Instant, job: usize) {
        self.seq += 1;
        self.queue.push(Reverse(Wake {
            at,
            seq: self.seq,
            job,
        }));
    }
}

/// Execute one run of `job`, containing any error or panic.
async fn run_job(job: &ScheduledJob) {
    debug!(job = %job.name, "job running");
    let started = Instant::now();

    match tokio::spawn((job.action)()).await {
        Ok(Ok(())) => {
            debug!(
                job = %job.name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "job finished"
            );
        }
        Ok(Err(e)) => {
            error!(job = %job.name, error = %format!("{e:#}"), "job failed");
        }
        Err(e) if e.is_panic() => {
            error!(job = %job.name, "job panicked");
        }
        Err(e) => {
            error!(job = %job.name, error = %e, "job aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn every(secs: u64) -> Trigger {
        Trigger::Interval(Duration::from_secs(secs))
    }

    /// Action that records the instant of each run relative to `start`.
    fn recording(start: Instant, runs: Arc<Mutex<Vec<Duration>>>) -> JobAction {
        job_action(move || {
            let runs = runs.clone();
            async move {
                runs.lock().unwrap().push(start.elapsed());
                Ok(())
            }
        })
    }

    fn counting(count: Arc<AtomicUsize>) -> JobAction {
        job_action(move || {
            let count = count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    async fn run_for(scheduler: Scheduler, secs: u64) {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(rx));
        tokio::time::sleep(Duration::from_secs(secs)).await;
        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn interval_job_runs_on_cadence() {
        let start = Instant::now();
        let runs = Arc::new(Mutex::new(Vec::new()));

        let mut scheduler = Scheduler::new();
        scheduler
            .add_job("stock", every(10), recording(start, runs.clone()))
            .unwrap();
        run_for(scheduler, 35).await;

        let secs: Vec<u64> = runs.lock().unwrap().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![0, 10, 20, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn overrun_skips_missed_ticks() {
        let start = Instant::now();
        let runs = Arc::new(Mutex::new(Vec::<Duration>::new()));

        let action = {
            let runs = runs.clone();
            job_action(move || {
                let runs = runs.clone();
                async move {
                    let first = {
                        let mut runs = runs.lock().unwrap();
                        runs.push(start.elapsed());
                        runs.len() == 1
                    };
                    if first {
                        tokio::time::sleep(Duration::from_secs(25)).await;
                    }
                    Ok(())
                }
            })
        };

        let mut scheduler = Scheduler::new();
        scheduler.add_job("slow", every(10), action).unwrap();
        run_for(scheduler, 45).await;

        let secs: Vec<u64> = runs.lock().unwrap().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![0, 30, 40]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_job_does_not_affect_others() {
        let good = Arc::new(AtomicUsize::new(0));
        let bad = Arc::new(AtomicUsize::new(0));

        let failing = {
            let bad = bad.clone();
            job_action(move || {
                let bad = bad.clone();
                async move {
                    bad.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("connection refused")
                }
            })
        };

        let mut scheduler = Scheduler::new();
        scheduler.add_job("bad", every(10), failing).unwrap();
        scheduler.add_job("good", every(10), counting(good.clone())).unwrap();
        run_for(scheduler, 25).await;

        assert_eq!(bad.load(Ordering::SeqCst), 3);
        assert_eq!(good.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_job_is_rescheduled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let action = {
            let runs = runs.clone();
            job_action(move || {
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    panic!("boom")
                }
            })
        };

        let mut scheduler = Scheduler::new();
        scheduler.add_job("panics", every(10), action).unwrap();
        run_for(scheduler, 25).await;

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_run_sequentially_in_wake_order() {
        let start = Instant::now();
        let order = Arc::new(Mutex::new(Vec::new()));

        let tagged = |tag: &'static str| {
            let order = order.clone();
            job_action(move || {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push((tag, start.elapsed().as_secs()));
                    Ok(())
                }
            })
        };

        let mut scheduler = Scheduler::new();
        scheduler.add_job("fast", every(5), tagged("fast")).unwrap();
        scheduler.add_job("slow", every(15), tagged("slow")).unwrap();
        run_for(scheduler, 16).await;

        // At 15s both are due; slow was queued first.
        let order = order.lock().unwrap().clone();
        assert_eq!(
            order,
            vec![("fast", 0), ("slow", 0), ("fast", 5), ("fast", 10), ("slow", 15), ("fast", 15)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unschedulable_job_retired_others_continue() {
        let huge = Arc::new(AtomicUsize::new(0));
        let normal = Arc::new(AtomicUsize::new(0));

        let mut scheduler = Scheduler::new();
        scheduler
            .add_job("huge", Trigger::Interval(Duration::MAX), counting(huge.clone()))
            .unwrap();
        scheduler.add_job("normal", every(10), counting(normal.clone())).unwrap();
        run_for(scheduler, 25).await;

        assert_eq!(huge.load(Ordering::SeqCst), 1);
        assert_eq!(normal.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_wait() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.add_job("hourly", every(3600), counting(count.clone())).unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(rx));
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();

        let started = Instant::now();
        handle.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_scheduler_idles_until_shutdown() {
        run_for(Scheduler::new(), 5).await;
    }

    #[tokio::test]
    async fn dropped_sender_stops_loop() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        Scheduler::new().run(rx).await.unwrap();
    }

    #[test]
    fn duplicate_job_rejected() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.add_job("q", every(10), counting(count.clone())).unwrap();
        let err = scheduler.add_job("q", every(10), counting(count)).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateJob(_)));
        assert_eq!(scheduler.job_count(), 1);
    }
}
