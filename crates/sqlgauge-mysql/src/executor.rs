//! Pooled MySQL executor.

use sqlx::Executor;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::{debug, info};

use sqlgauge_core::{BoxFuture, QueryError, QueryExecutor, Row};

use crate::decode::decode_row;

/// Connection settings for the MySQL server.
#[derive(Debug, Clone)]
pub struct MysqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Session time zone applied on connect. `None` keeps the server default.
    pub timezone: Option<String>,
}

impl Default for MysqlSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            timezone: None,
        }
    }
}

/// Runs job statements against a single lazily opened connection.
///
/// Jobs execute one at a time, so the pool never needs more than one
/// connection. A dropped connection is replaced on the next acquire.
pub struct MysqlExecutor {
    pool: MySqlPool,
}

impl MysqlExecutor {
    /// Build the pool without connecting. The first query opens the
    /// connection, so the exporter can start while the server is down.
    pub fn connect_lazy(settings: &MysqlSettings) -> Self {
        let mut options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .timezone(settings.timezone.clone());
        if !settings.password.is_empty() {
            options = options.password(&settings.password);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .connect_lazy_with(options);

        info!(
            host = %settings.host,
            port = settings.port,
            user = %settings.user,
            "mysql pool configured"
        );
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl QueryExecutor for MysqlExecutor {
    fn fetch<'a>(
        &'a self,
        database: &'a str,
        statement: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Row>, QueryError>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(connection_error)?;

            let use_db = use_statement(database);
            (&mut *conn)
                .execute(sqlx::raw_sql(&use_db))
                .await
                .map_err(classify)?;

            let rows = (&mut *conn)
                .fetch_all(sqlx::raw_sql(statement))
                .await
                .map_err(classify)?;

            debug!(db = %database, rows = rows.len(), "statement returned");
            Ok(rows.iter().map(decode_row).collect())
        })
    }
}

/// `USE` statement for `database` with the identifier quoted.
pub fn use_statement(database: &str) -> String {
    format!("USE {}", quote_identifier(database))
}

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Any failure to obtain a connection, including server-side rejections
/// such as access denied.
fn connection_error(e: sqlx::Error) -> QueryError {
    QueryError::Connection(e.to_string())
}

/// Errors on an open connection. Server-reported errors are statement
/// errors; everything else means the connection could not be used.
fn classify(e: sqlx::Error) -> QueryError {
    match e {
        sqlx::Error::Database(db) => QueryError::Statement(db.to_string()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::Decode(_) => QueryError::Statement(e.to_string()),
        other => QueryError::Connection(other.to_string()),
    }
}
