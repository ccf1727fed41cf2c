//! sqlgauged — the sqlgauge exporter daemon.
//!
//! Loads query definitions, schedules each query on its interval or cron
//! trigger, and serves the latest reconciled results on `/metrics`.
//!
//! # Usage
//!
//! ```text
//! sqlgauged --config-file exporter.toml --mysql-server db:3306 --port 9207
//! ```

mod cli;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sqlgauge_core::{ExporterConfig, Job, QueryExecutor};
use sqlgauge_metrics::{run_query, MetricReconciler, QueryMetricCollector, Registry};
use sqlgauge_mysql::{MysqlExecutor, MysqlSettings};
use sqlgauge_scheduler::{job_action, Scheduler, Trigger};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    run(cli).await
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if cli.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("sqlgauge exporter starting");

    // ── Configuration ──────────────────────────────────────────

    let config = ExporterConfig::load(&cli.config_file, Some(&cli.config_dir))
        .context("failed to load query configuration")?;
    let jobs = config.jobs().context("invalid query configuration")?;
    if jobs.is_empty() {
        warn!(
            config_file = ?cli.config_file,
            config_dir = ?cli.config_dir,
            "no queries configured, only an empty /metrics will be served"
        );
    }

    // ── Subsystems ─────────────────────────────────────────────

    let executor = Arc::new(MysqlExecutor::connect_lazy(&MysqlSettings {
        host: cli.mysql_server.host.clone(),
        port: cli.mysql_server.port,
        user: cli.mysql_user.clone(),
        password: cli.mysql_password.clone(),
        timezone: cli.mysql_local_timezone.clone(),
    }));

    let reconciler = Arc::new(MetricReconciler::new());

    let mut registry = Registry::new();
    registry.register(Arc::new(QueryMetricCollector::new(reconciler.clone())));

    let scheduler = build_scheduler(jobs, executor.clone(), reconciler)?;
    info!(jobs = scheduler.job_count(), "scheduler initialized");

    // ── Background tasks ───────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    // ── HTTP server ────────────────────────────────────────────

    let router = sqlgauge_api::build_router(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "serving /metrics");

    let mut server_shutdown = shutdown_rx;
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    });
    let mut server_handle = tokio::spawn(async move { server.await });

    // The scheduler only returns early on a fatal trigger error.
    let outcome: anyhow::Result<()> = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            signal.context("failed to listen for ctrl-c")
        }
        scheduled = &mut scheduler_handle => {
            match scheduled {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("scheduler stopped")),
                Err(e) => Err(anyhow::Error::new(e).context("scheduler task failed")),
            }
        }
        served = &mut server_handle => {
            match served {
                Ok(result) => result.context("http server stopped"),
                Err(e) => Err(anyhow::Error::new(e).context("http server task failed")),
            }
        }
    };

    let _ = shutdown_tx.send(true);
    if !scheduler_handle.is_finished() {
        let _ = scheduler_handle.await;
    }
    if !server_handle.is_finished() {
        let _ = server_handle.await;
    }
    executor.close().await;

    if let Err(e) = &outcome {
        error!(error = %format!("{e:#}"), "exporter stopped with an error");
    } else {
        info!("sqlgauge exporter stopped");
    }
    outcome
}

/// Validate every job's trigger and register its query as a scheduled
/// action. Any invalid trigger aborts startup.
fn build_scheduler(
    jobs: Vec<Job>,
    executor: Arc<MysqlExecutor>,
    reconciler: Arc<MetricReconciler>,
) -> anyhow::Result<Scheduler> {
    let mut scheduler = Scheduler::new();

    for job in jobs {
        let trigger = Trigger::from_spec(&job.trigger)
            .with_context(|| format!("invalid trigger for query {:?}", job.name))?;
        let name = job.name.clone();
        let job = Arc::new(job);
        let executor: Arc<dyn QueryExecutor> = executor.clone();
        let reconciler = reconciler.clone();

        let action = job_action(move || {
            let job = job.clone();
            let executor = executor.clone();
            let reconciler = reconciler.clone();
            async move {
                if let Err(e) = run_query(&job, executor.as_ref(), &reconciler).await {
                    error!(
                        job = %job.name,
                        db = %job.database,
                        query = %job.statement,
                        error = %e,
                        "query failed"
                    );
                }
                Ok(())
            }
        });
        scheduler.add_job(&name, trigger, action)?;
    }

    Ok(scheduler)
}
