//! Relational store backends
//!
//! Every step of the pipeline talks to the database through the [`Store`]
//! trait. Statements are autocommitted, so each call is its own short-lived
//! transaction. Parameters use `$1`-style placeholders, which both DuckDB and
//! PostgreSQL accept.
//!
//! Backends:
//! - [`DuckDbStore`]: embedded DuckDB (feature `duckdb-backend`, default)
//! - [`PostgresStore`]: PostgreSQL via `tokio-postgres` (feature `postgres-backend`)

#[cfg(feature = "duckdb-backend")]
mod duckdb_store;
#[cfg(feature = "postgres-backend")]
mod postgres_store;

#[cfg(feature = "duckdb-backend")]
pub use duckdb_store::DuckDbStore;
#[cfg(feature = "postgres-backend")]
pub use postgres_store::PostgresStore;

use crate::config::{Backend, DbConfig};
use crate::error::EtlResult;

/// A typed, nullable statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Integer(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Boolean(Option<bool>),
}

impl Cell {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Integer(v) => v.is_none(),
            Cell::Float(v) => v.is_none(),
            Cell::Text(v) => v.is_none(),
            Cell::Boolean(v) => v.is_none(),
        }
    }
}

/// Synchronous access to a relational store
pub trait Store {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Execute a single statement and return the number of affected rows
    fn execute(&self, sql: &str, params: &[Cell]) -> EtlResult<u64>;

    /// Execute one or more statements without parameters
    fn execute_batch(&self, sql: &str) -> EtlResult<()>;

    /// Run a query returning a single integer
    fn query_i64(&self, sql: &str, params: &[Cell]) -> EtlResult<i64>;

    /// Run a query returning a single nullable float
    fn query_f64(&self, sql: &str, params: &[Cell]) -> EtlResult<Option<f64>>;

    /// Check whether a table exists
    fn table_exists(&self, table: &str) -> EtlResult<bool> {
        let count = self.query_i64(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = CAST($1 AS VARCHAR)",
            &[Cell::Text(Some(table.to_string()))],
        )?;
        Ok(count > 0)
    }

    /// Count the rows of a table
    fn count_rows(&self, table: &str) -> EtlResult<i64> {
        self.query_i64(&format!("SELECT COUNT(*) FROM {table}"), &[])
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn execute(&self, sql: &str, params: &[Cell]) -> EtlResult<u64> {
        (**self).execute(sql, params)
    }

    fn execute_batch(&self, sql: &str) -> EtlResult<()> {
        (**self).execute_batch(sql)
    }

    fn query_i64(&self, sql: &str, params: &[Cell]) -> EtlResult<i64> {
        (**self).query_i64(sql, params)
    }

    fn query_f64(&self, sql: &str, params: &[Cell]) -> EtlResult<Option<f64>> {
        (**self).query_f64(sql, params)
    }

    fn table_exists(&self, table: &str) -> EtlResult<bool> {
        (**self).table_exists(table)
    }

    fn count_rows(&self, table: &str) -> EtlResult<i64> {
        (**self).count_rows(table)
    }
}

/// Open the store described by a database config
pub fn open(db: &DbConfig) -> EtlResult<Box<dyn Store>> {
    match db.backend {
        Backend::DuckDb => {
            #[cfg(feature = "duckdb-backend")]
            {
                let store = if db.database == ":memory:" {
                    DuckDbStore::memory()?
                } else {
                    DuckDbStore::open(&db.database)?
                };
                Ok(Box::new(store))
            }
            #[cfg(not(feature = "duckdb-backend"))]
            {
                Err(crate::error::EtlError::InvalidConfig(
                    "DuckDB support not enabled. Build with --features duckdb-backend".to_string(),
                ))
            }
        }
        Backend::Postgres => {
            #[cfg(feature = "postgres-backend")]
            {
                Ok(Box::new(PostgresStore::connect(&db.connection_string())?))
            }
            #[cfg(not(feature = "postgres-backend"))]
            {
                Err(crate::error::EtlError::InvalidConfig(
                    "PostgreSQL support not enabled. Build with --features postgres-backend"
                        .to_string(),
                ))
            }
        }
    }
}
