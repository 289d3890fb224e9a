//! Row-by-row upsert of extracted records into the staging table

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{EtlError, EtlResult, error_chain};
use crate::extract::{ExtractedTable, RawRecord};
use crate::mapping::ColumnMapping;
use crate::schema::TableSchema;
use crate::store::{Cell, Store};

/// Statistics from a staging load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadStats {
    /// Number of data rows read from the input
    pub rows_seen: usize,
    /// Number of rows written to staging
    pub rows_loaded: usize,
    /// Number of rows rejected
    pub rows_rejected: usize,
    /// Rejection messages (limited to first 100)
    pub errors: Vec<String>,
    /// Duration of the load
    #[serde(skip)]
    pub duration: Duration,
}

impl LoadStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rejected row (messages limited to 100)
    pub fn add_error(&mut self, error: String) {
        self.rows_rejected += 1;
        if self.errors.len() < 100 {
            self.errors.push(error);
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

/// Build the upsert statement for a staging schema
///
/// Every schema column is bound in declaration order. On a primary-key
/// conflict all non-key columns take the incoming values.
pub fn upsert_sql(schema: &TableSchema, primary_keys: &[String]) -> String {
    let columns: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();

    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !primary_keys.iter().any(|k| k == *c))
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
        schema.name,
        columns.join(", "),
        placeholders.join(", "),
        primary_keys.join(", "),
        action
    )
}

/// Loader that renames, coerces and upserts rows into a staging table
pub struct StagingLoader<'a> {
    schema: &'a TableSchema,
    mapping: &'a ColumnMapping,
    key_positions: Vec<usize>,
    sql: String,
}

impl<'a> StagingLoader<'a> {
    /// Create a loader, validating the primary key against the schema
    pub fn new(
        schema: &'a TableSchema,
        mapping: &'a ColumnMapping,
        primary_keys: &[String],
    ) -> EtlResult<Self> {
        if primary_keys.is_empty() {
            return Err(EtlError::InvalidConfig(
                "primary key must name at least one column".to_string(),
            ));
        }

        let key_positions = primary_keys
            .iter()
            .map(|key| {
                schema.position(key).ok_or_else(|| {
                    EtlError::InvalidConfig(format!(
                        "primary key column {key} is not a column of {}",
                        schema.name
                    ))
                })
            })
            .collect::<EtlResult<Vec<_>>>()?;

        Ok(Self {
            schema,
            mapping,
            key_positions,
            sql: upsert_sql(schema, primary_keys),
        })
    }

    /// Upsert every row, skipping the ones that fail
    pub fn load(&self, store: &dyn Store, table: &ExtractedTable) -> LoadStats {
        let start = Instant::now();
        let mut stats = LoadStats::new();

        debug!(
            table = %self.schema.name,
            rows = table.len(),
            backend = store.backend(),
            "Loading rows into staging"
        );

        for record in &table.rows {
            stats.rows_seen += 1;

            let result = self
                .row_cells(&table.headers, record)
                .and_then(|cells| store.execute(&self.sql, &cells));

            match result {
                Ok(_) => stats.rows_loaded += 1,
                Err(e) => {
                    let cause = error_chain(&e);
                    error!(line = record.line, cause = %cause, "Failed to load row");
                    stats.add_error(format!("line {}: {}", record.line, cause));
                }
            }
        }

        stats.duration = start.elapsed();
        info!(
            table = %self.schema.name,
            rows_loaded = stats.rows_loaded,
            rows_rejected = stats.rows_rejected,
            duration = %stats.duration_string(),
            "Staging load complete"
        );

        stats
    }

    /// Statement parameters for one row, in schema column order
    fn row_cells(&self, headers: &[String], record: &RawRecord) -> EtlResult<Vec<Cell>> {
        let mut cells: Vec<Cell> = self
            .schema
            .columns
            .iter()
            .map(|c| c.column_type.null())
            .collect();

        for external in headers {
            let internal = self.mapping.try_resolve(external)?;
            let position = self.schema.position(internal).ok_or_else(|| {
                EtlError::Mapping(format!(
                    "{external} (mapped to {internal}, which is not a column of {})",
                    self.schema.name
                ))
            })?;
            let raw = record.get(external).unwrap_or_default();
            cells[position] = self.schema.columns[position]
                .column_type
                .coerce(internal, raw)?;
        }

        for &position in &self.key_positions {
            if cells[position].is_null() {
                return Err(EtlError::ConstraintViolation(format!(
                    "primary key column {} is null",
                    self.schema.columns[position].name
                )));
            }
        }

        Ok(cells)
    }
}

/// Upsert extracted rows into the staging table
///
/// Rows are written one statement at a time. A row that cannot be mapped,
/// coerced or written is logged and skipped. Only invalid arguments fail the
/// whole call.
pub fn load_to_staging(
    store: &dyn Store,
    table: &ExtractedTable,
    schema: &TableSchema,
    mapping: &ColumnMapping,
    primary_keys: &[String],
) -> EtlResult<LoadStats> {
    let loader = StagingLoader::new(schema, mapping, primary_keys)?;
    Ok(loader.load(store, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType};

    fn people_schema() -> TableSchema {
        TableSchema::new(
            "people",
            vec![
                ColumnDef::new("id", ColumnType::Integer).primary_key(),
                ColumnDef::new("name", ColumnType::Text),
                ColumnDef::new("score", ColumnType::Float),
            ],
        )
        .unwrap()
    }

    fn keys() -> Vec<String> {
        vec!["id".to_string()]
    }

    #[test]
    fn test_upsert_sql() {
        let sql = upsert_sql(&people_schema(), &keys());
        assert_eq!(
            sql,
            "INSERT INTO people (id, name, score) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, score = EXCLUDED.score"
        );
    }

    #[test]
    fn test_upsert_sql_all_key_columns() {
        let schema = TableSchema::new(
            "tags",
            vec![ColumnDef::new("tag", ColumnType::Text).primary_key()],
        )
        .unwrap();
        let sql = upsert_sql(&schema, &["tag".to_string()]);
        assert!(sql.ends_with("ON CONFLICT (tag) DO NOTHING"));
    }

    #[test]
    fn test_loader_rejects_unknown_key() {
        let schema = people_schema();
        let mapping = ColumnMapping::default();

        let err = StagingLoader::new(&schema, &mapping, &["email".to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, EtlError::InvalidConfig(_)));
        assert!(StagingLoader::new(&schema, &mapping, &[]).is_err());
    }

    #[test]
    fn test_load_stats_error_cap() {
        let mut stats = LoadStats::new();
        for i in 0..150 {
            stats.add_error(format!("line {i}: bad"));
        }
        assert_eq!(stats.rows_rejected, 150);
        assert_eq!(stats.errors.len(), 100);
    }

    #[test]
    fn test_load_stats_duration_formatting() {
        let mut stats = LoadStats::new();
        stats.duration = Duration::from_secs(90);
        assert_eq!(stats.duration_string(), "1m 30s");
    }

    #[cfg(feature = "duckdb-backend")]
    mod with_store {
        use super::*;
        use crate::schema::ensure_table;
        use crate::store::DuckDbStore;
        use std::collections::HashMap;

        fn record(line: u64, pairs: &[(&str, &str)]) -> RawRecord {
            RawRecord {
                line,
                values: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>(),
            }
        }

        fn table(rows: Vec<RawRecord>) -> ExtractedTable {
            ExtractedTable {
                headers: vec!["ID".to_string(), "Name".to_string(), "Score".to_string()],
                rows,
            }
        }

        fn mapping() -> ColumnMapping {
            [("ID", "id"), ("Name", "name"), ("Score", "score")]
                .into_iter()
                .collect()
        }

        fn setup() -> (DuckDbStore, TableSchema) {
            let store = DuckDbStore::memory().unwrap();
            let schema = people_schema();
            ensure_table(&store, &schema).unwrap();
            (store, schema)
        }

        #[test]
        fn test_load_is_idempotent() {
            let (store, schema) = setup();
            let rows = table(vec![
                record(2, &[("ID", "1"), ("Name", "Ada"), ("Score", "4.0")]),
                record(3, &[("ID", "2"), ("Name", "Grace"), ("Score", "")]),
            ]);

            let first = load_to_staging(&store, &rows, &schema, &mapping(), &keys()).unwrap();
            let second = load_to_staging(&store, &rows, &schema, &mapping(), &keys()).unwrap();

            assert_eq!(first.rows_loaded, 2);
            assert_eq!(second.rows_loaded, 2);
            assert_eq!(store.count_rows("people").unwrap(), 2);

            let snapshot = store.query("SELECT * FROM people ORDER BY id").unwrap();
            assert_eq!(snapshot[0]["name"], "Ada");
            assert!(snapshot[1]["score"].is_null());
        }

        #[test]
        fn test_upsert_overwrites_non_key_columns() {
            let (store, schema) = setup();
            let initial = table(vec![
                record(2, &[("ID", "1"), ("Name", "Ada"), ("Score", "4.0")]),
                record(3, &[("ID", "2"), ("Name", "Grace"), ("Score", "5.0")]),
            ]);
            load_to_staging(&store, &initial, &schema, &mapping(), &keys()).unwrap();

            let update = table(vec![record(
                2,
                &[("ID", "1"), ("Name", "Ada L."), ("Score", "")],
            )]);
            load_to_staging(&store, &update, &schema, &mapping(), &keys()).unwrap();

            let rows = store.query("SELECT * FROM people ORDER BY id").unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0]["name"], "Ada L.");
            assert!(rows[0]["score"].is_null());
            assert_eq!(rows[1]["name"], "Grace");
            assert_eq!(rows[1]["score"], 5.0);
        }

        #[test]
        fn test_rejected_rows_are_skipped() {
            let (store, schema) = setup();
            let rows = table(vec![
                record(2, &[("ID", ""), ("Name", "Nobody"), ("Score", "1.0")]),
                record(3, &[("ID", "2"), ("Name", "Grace"), ("Score", "high")]),
                record(4, &[("ID", "3"), ("Name", "Edsger"), ("Score", "3.5")]),
            ]);

            let stats = load_to_staging(&store, &rows, &schema, &mapping(), &keys()).unwrap();
            assert_eq!(stats.rows_seen, 3);
            assert_eq!(stats.rows_loaded, 1);
            assert_eq!(stats.rows_rejected, 2);
            assert!(stats.errors[0].starts_with("line 2:"));
            assert!(stats.errors[0].contains("primary key"));
            assert!(stats.errors[1].contains("score"));
            assert_eq!(store.count_rows("people").unwrap(), 1);
        }

        #[test]
        fn test_unmapped_header_rejects_rows() {
            let (store, schema) = setup();
            let rows = ExtractedTable {
                headers: vec!["ID".to_string(), "Nickname".to_string()],
                rows: vec![record(2, &[("ID", "1"), ("Nickname", "A")])],
            };

            let stats = load_to_staging(&store, &rows, &schema, &mapping(), &keys()).unwrap();
            assert_eq!(stats.rows_rejected, 1);
            assert!(stats.errors[0].contains("Nickname"));
            assert_eq!(store.count_rows("people").unwrap(), 0);
        }
    }
}
