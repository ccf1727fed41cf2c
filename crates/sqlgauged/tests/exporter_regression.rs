//! Exporter regression tests.
//!
//! Drives configured queries through a scripted executor, the reconciler
//! and the scheduler, then scrapes `/metrics` through the router.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tokio::sync::watch;
use tower::ServiceExt;

use sqlgauge_api::build_router;
use sqlgauge_core::{BoxFuture, ExporterConfig, Job, QueryError, QueryExecutor, Row, Value};
use sqlgauge_metrics::{MetricReconciler, QueryMetricCollector, Registry, run_query};
use sqlgauge_scheduler::{Scheduler, Trigger, job_action};

const CONFIG: &str = r#"
[query.orders]
database = "shop"
statement = "SELECT status, COUNT(*) AS total FROM orders GROUP BY status"
value_columns = ["total"]
interval_secs = 10
on_error = "preserve"
on_missing = "zero"

[query.stock]
database = "warehouse"
statement = "SELECT unit, qty FROM stock"
value_columns = ["qty"]
interval_secs = 10
"#;

/// Per-statement scripted results. Each call pops the next entry; the
/// last entry repeats once the script runs out.
#[derive(Default)]
struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, Vec<Result<Vec<Row>, QueryError>>>>,
}

impl ScriptedExecutor {
    fn script(&self, statement: &str, mut results: Vec<Result<Vec<Row>, QueryError>>) {
        results.reverse();
        self.scripts
            .lock()
            .unwrap()
            .insert(statement.to_string(), results);
    }
}

impl QueryExecutor for ScriptedExecutor {
    fn fetch<'a>(
        &'a self,
        _database: &'a str,
        statement: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Row>, QueryError>> {
        let mut scripts = self.scripts.lock().unwrap();
        let next = match scripts.get_mut(statement) {
            Some(results) if results.len() > 1 => results.pop().unwrap(),
            Some(results) => match results.last().unwrap() {
                Ok(rows) => Ok(rows.clone()),
                Err(_) => Err(QueryError::Connection("still down".into())),
            },
            None => Err(QueryError::Statement(format!("unscripted: {statement}"))),
        };
        Box::pin(async move { next })
    }
}

fn jobs() -> Vec<Job> {
    let config: ExporterConfig = toml::from_str(CONFIG).unwrap();
    config.jobs().unwrap()
}

fn job(name: &str) -> Job {
    jobs().into_iter().find(|j| j.name == name).unwrap()
}

fn orders_row(status: &str, total: i64) -> Row {
    vec![
        ("status".to_string(), Value::Text(status.to_string())),
        ("total".to_string(), Value::Int(total)),
    ]
}

fn stock_row(unit: &str, qty: i64) -> Row {
    vec![
        ("unit".to_string(), Value::Text(unit.to_string())),
        ("qty".to_string(), Value::Int(qty)),
    ]
}

fn registry_for(reconciler: Arc<MetricReconciler>) -> Registry {
    let mut registry = Registry::new();
    registry.register(Arc::new(QueryMetricCollector::new(reconciler)));
    registry
}

async fn scrape(registry: Registry) -> String {
    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let resp = build_router(registry).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/plain; version=0.0.4; charset=utf-8"
    );
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn scrape_before_any_run_is_empty() {
    let reconciler = Arc::new(MetricReconciler::new());
    assert_eq!(scrape(registry_for(reconciler)).await, "");
}

#[tokio::test]
async fn stock_query_exposed_with_db_label() {
    let stock = job("stock");
    let executor = ScriptedExecutor::default();
    executor.script(&stock.statement, vec![Ok(vec![stock_row("kg", 5)])]);
    let reconciler = Arc::new(MetricReconciler::new());

    run_query(&stock, &executor, &reconciler).await.unwrap();

    let body = scrape(registry_for(reconciler)).await;
    assert_eq!(
        body,
        "# HELP stock_qty Value column 'qty' for query 'stock'.\n\
         # TYPE stock_qty gauge\n\
         stock_qty{db=\"warehouse\",unit=\"kg\"} 5\n"
    );
}

#[tokio::test]
async fn orders_scenario() {
    let orders = job("orders");
    let executor = ScriptedExecutor::default();
    executor.script(
        &orders.statement,
        vec![
            Ok(vec![orders_row("new", 3), orders_row("paid", 7)]),
            Ok(vec![orders_row("paid", 8)]),
            Err(QueryError::Connection("connection refused".into())),
        ],
    );
    let reconciler = Arc::new(MetricReconciler::new());

    // First run publishes both statuses.
    run_query(&orders, &executor, &reconciler).await.unwrap();
    let body = scrape(registry_for(reconciler.clone())).await;
    assert!(body.contains("orders_total{db=\"shop\",status=\"new\"} 3\n"));
    assert!(body.contains("orders_total{db=\"shop\",status=\"paid\"} 7\n"));

    // "new" disappears; on_missing = zero keeps it at 0.
    run_query(&orders, &executor, &reconciler).await.unwrap();
    let body = scrape(registry_for(reconciler.clone())).await;
    assert!(body.contains("orders_total{db=\"shop\",status=\"new\"} 0\n"));
    assert!(body.contains("orders_total{db=\"shop\",status=\"paid\"} 8\n"));

    // The query fails; on_error = preserve keeps the last published state.
    assert!(run_query(&orders, &executor, &reconciler).await.is_err());
    let body = scrape(registry_for(reconciler)).await;
    assert!(body.contains("orders_total{db=\"shop\",status=\"new\"} 0\n"));
    assert!(body.contains("orders_total{db=\"shop\",status=\"paid\"} 8\n"));
}

#[tokio::test]
async fn failing_stock_query_drops_its_series() {
    let stock = job("stock");
    let executor = ScriptedExecutor::default();
    executor.script(
        &stock.statement,
        vec![
            Ok(vec![stock_row("kg", 5)]),
            Err(QueryError::Statement("table missing".into())),
        ],
    );
    let reconciler = Arc::new(MetricReconciler::new());

    run_query(&stock, &executor, &reconciler).await.unwrap();
    assert!(run_query(&stock, &executor, &reconciler).await.is_err());

    let body = scrape(registry_for(reconciler)).await;
    assert!(!body.contains("stock_qty"));
}

#[tokio::test(start_paused = true)]
async fn scheduled_jobs_feed_the_scrape() {
    let executor: Arc<ScriptedExecutor> = Arc::new(ScriptedExecutor::default());
    let reconciler = Arc::new(MetricReconciler::new());

    let orders = job("orders");
    let stock = job("stock");
    executor.script(
        &orders.statement,
        vec![Ok(vec![orders_row("new", 1)]), Ok(vec![orders_row("new", 2)])],
    );
    executor.script(&stock.statement, vec![Ok(vec![stock_row("kg", 5)])]);

    let mut scheduler = Scheduler::new();
    for job in jobs() {
        let trigger = Trigger::from_spec(&job.trigger).unwrap();
        let name = job.name.clone();
        let job = Arc::new(job);
        let executor = executor.clone();
        let reconciler = reconciler.clone();
        let action = job_action(move || {
            let job = job.clone();
            let executor = executor.clone();
            let reconciler = reconciler.clone();
            async move {
                run_query(&job, executor.as_ref(), &reconciler).await?;
                Ok(())
            }
        });
        scheduler.add_job(&name, trigger, action).unwrap();
    }

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(rx));

    // First runs happen immediately, the second orders run at +10s.
    tokio::time::sleep(Duration::from_secs(15)).await;
    let body = scrape(registry_for(reconciler)).await;
    assert!(body.contains("orders_total{db=\"shop\",status=\"new\"} 2\n"));
    assert!(body.contains("stock_qty{db=\"warehouse\",unit=\"kg\"} 5\n"));

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}
