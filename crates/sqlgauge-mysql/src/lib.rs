//! sqlgauge-mysql — the query execution capability for MySQL servers.
//!
//! A lazily connected sqlx pool runs each statement after switching the
//! session to the job's database. Result cells are decoded into
//! [`sqlgauge_core::Value`] by column type.

pub mod decode;
pub mod executor;

pub use executor::{MysqlExecutor, MysqlSettings};
