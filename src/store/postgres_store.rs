//! PostgreSQL store
//!
//! `tokio-postgres` is async; the store owns a current-thread runtime and
//! blocks on it for every call so the rest of the crate stays synchronous.
//! The connection task is spawned on the same runtime and is driven whenever
//! a call is in flight.

use tokio::runtime::Runtime;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

use super::{Cell, Store};
use crate::error::{EtlError, EtlResult};

/// PostgreSQL-backed store
pub struct PostgresStore {
    runtime: Runtime,
    client: Client,
}

impl PostgresStore {
    /// Connect to a PostgreSQL database
    pub fn connect(connection_string: &str) -> EtlResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (client, connection) = runtime
            .block_on(tokio_postgres::connect(connection_string, NoTls))
            .map_err(|e| EtlError::execution("connect", e))?;

        runtime.spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self { runtime, client })
    }
}

impl Store for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn execute(&self, sql: &str, params: &[Cell]) -> EtlResult<u64> {
        let boxed = to_params(params);
        let refs = param_refs(&boxed);
        self.runtime
            .block_on(self.client.execute(sql, &refs))
            .map_err(|e| EtlError::execution(sql, e))
    }

    fn execute_batch(&self, sql: &str) -> EtlResult<()> {
        self.runtime
            .block_on(self.client.batch_execute(sql))
            .map_err(|e| EtlError::execution(sql, e))
    }

    fn query_i64(&self, sql: &str, params: &[Cell]) -> EtlResult<i64> {
        let boxed = to_params(params);
        let refs = param_refs(&boxed);
        let row = self
            .runtime
            .block_on(self.client.query_one(sql, &refs))
            .map_err(|e| EtlError::execution(sql, e))?;
        row.try_get::<_, i64>(0)
            .map_err(|e| EtlError::execution(sql, e))
    }

    fn query_f64(&self, sql: &str, params: &[Cell]) -> EtlResult<Option<f64>> {
        let boxed = to_params(params);
        let refs = param_refs(&boxed);
        let row = self
            .runtime
            .block_on(self.client.query_one(sql, &refs))
            .map_err(|e| EtlError::execution(sql, e))?;
        row.try_get::<_, Option<f64>>(0)
            .map_err(|e| EtlError::execution(sql, e))
    }
}

fn to_params(params: &[Cell]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    params
        .iter()
        .map(|cell| -> Box<dyn ToSql + Sync + Send> {
            match cell {
                Cell::Integer(v) => Box::new(*v),
                Cell::Float(v) => Box::new(*v),
                Cell::Text(v) => Box::new(v.clone()),
                Cell::Boolean(v) => Box::new(*v),
            }
        })
        .collect()
}

fn param_refs(boxed: &[Box<dyn ToSql + Sync + Send>]) -> Vec<&(dyn ToSql + Sync)> {
    boxed
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}
