//! Embedded DuckDB store

use super::{Cell, Store};
use crate::error::{EtlError, EtlResult};

/// DuckDB-backed store
pub struct DuckDbStore {
    conn: duckdb::Connection,
}

impl DuckDbStore {
    /// Open or create a database at the given path
    pub fn open(path: &str) -> EtlResult<Self> {
        let conn = duckdb::Connection::open(path).map_err(|e| EtlError::execution("open", e))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn memory() -> EtlResult<Self> {
        let conn = duckdb::Connection::open_in_memory()
            .map_err(|e| EtlError::execution("open :memory:", e))?;
        Ok(Self { conn })
    }

    /// Execute a query and return results as JSON
    pub fn query(&self, sql: &str) -> EtlResult<Vec<serde_json::Value>> {
        let map_err = |e| EtlError::execution(sql, e);
        let mut stmt = self.conn.prepare(sql).map_err(map_err)?;
        let mut rows = stmt.query([]).map_err(map_err)?;

        let column_count = rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let column_names: Vec<String> = (0..column_count)
            .map(|i| {
                rows.as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut results = Vec::new();

        while let Some(row) = rows.next().map_err(map_err)? {
            let mut obj = serde_json::Map::new();
            for (i, name) in column_names.iter().enumerate() {
                let value: duckdb::types::Value = row.get(i).map_err(map_err)?;
                obj.insert(name.clone(), to_json(value));
            }
            results.push(serde_json::Value::Object(obj));
        }

        Ok(results)
    }
}

impl Store for DuckDbStore {
    fn backend(&self) -> &'static str {
        "duckdb"
    }

    fn execute(&self, sql: &str, params: &[Cell]) -> EtlResult<u64> {
        let values: Vec<duckdb::types::Value> = params.iter().map(to_value).collect();
        let affected = self
            .conn
            .execute(sql, duckdb::params_from_iter(values.iter()))
            .map_err(|e| EtlError::execution(sql, e))?;
        Ok(affected as u64)
    }

    fn execute_batch(&self, sql: &str) -> EtlResult<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| EtlError::execution(sql, e))
    }

    fn query_i64(&self, sql: &str, params: &[Cell]) -> EtlResult<i64> {
        let values: Vec<duckdb::types::Value> = params.iter().map(to_value).collect();
        self.conn
            .query_row(sql, duckdb::params_from_iter(values.iter()), |row| {
                row.get::<_, i64>(0)
            })
            .map_err(|e| EtlError::execution(sql, e))
    }

    fn query_f64(&self, sql: &str, params: &[Cell]) -> EtlResult<Option<f64>> {
        let values: Vec<duckdb::types::Value> = params.iter().map(to_value).collect();
        self.conn
            .query_row(sql, duckdb::params_from_iter(values.iter()), |row| {
                row.get::<_, Option<f64>>(0)
            })
            .map_err(|e| EtlError::execution(sql, e))
    }
}

fn to_value(cell: &Cell) -> duckdb::types::Value {
    use duckdb::types::Value;

    match cell {
        Cell::Integer(Some(n)) => Value::BigInt(*n),
        Cell::Float(Some(f)) => Value::Double(*f),
        Cell::Text(Some(s)) => Value::Text(s.clone()),
        Cell::Boolean(Some(b)) => Value::Boolean(*b),
        _ => Value::Null,
    }
}

fn to_json(value: duckdb::types::Value) -> serde_json::Value {
    use duckdb::types::Value;

    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::TinyInt(n) => serde_json::Value::Number(n.into()),
        Value::SmallInt(n) => serde_json::Value::Number(n.into()),
        Value::Int(n) => serde_json::Value::Number(n.into()),
        Value::BigInt(n) => serde_json::Value::Number(n.into()),
        Value::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Double(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s),
        other => serde_json::Value::String(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_with_params() {
        let store = DuckDbStore::memory().unwrap();
        store
            .execute_batch("CREATE TABLE t (id BIGINT PRIMARY KEY, score DOUBLE PRECISION, label VARCHAR)")
            .unwrap();

        let inserted = store
            .execute(
                "INSERT INTO t (id, score, label) VALUES ($1, $2, $3)",
                &[
                    Cell::Integer(Some(1)),
                    Cell::Float(None),
                    Cell::Text(Some("first".to_string())),
                ],
            )
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.count_rows("t").unwrap(), 1);

        let rows = store.query("SELECT id, score, label FROM t").unwrap();
        assert_eq!(rows[0]["id"], 1);
        assert!(rows[0]["score"].is_null());
        assert_eq!(rows[0]["label"], "first");
    }

    #[test]
    fn test_table_exists() {
        let store = DuckDbStore::memory().unwrap();
        assert!(!store.table_exists("customers").unwrap());

        store.execute_batch("CREATE TABLE customers (customer_id BIGINT)").unwrap();
        assert!(store.table_exists("customers").unwrap());
    }

    #[test]
    fn test_query_f64_null_average() {
        let store = DuckDbStore::memory().unwrap();
        store.execute_batch("CREATE TABLE r (rating DOUBLE PRECISION)").unwrap();

        let avg = store.query_f64("SELECT AVG(rating) FROM r", &[]).unwrap();
        assert_eq!(avg, None);

        store
            .execute("INSERT INTO r VALUES ($1)", &[Cell::Float(Some(4.5))])
            .unwrap();
        let avg = store.query_f64("SELECT AVG(rating) FROM r", &[]).unwrap();
        assert_eq!(avg, Some(4.5));
    }

    #[test]
    fn test_execution_error_names_statement() {
        let store = DuckDbStore::memory().unwrap();
        let err = store.execute("UPDATE missing SET x = 1", &[]).unwrap_err();
        assert!(matches!(err, EtlError::Execution { .. }));
        assert!(err.to_string().contains("UPDATE missing"));
    }
}
