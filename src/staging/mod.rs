//! Staging layer for extracted records
//!
//! Extracted rows land in a single staging table keyed by the configured
//! primary key. Loading is an upsert, so ingesting the same or an updated
//! file again converges on one row per key with the latest values.
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_etl::extract::extract_records;
//! use retail_etl::mapping::ColumnMapping;
//! use retail_etl::schema::{TableSchema, ensure_table};
//! use retail_etl::staging::load_to_staging;
//! use retail_etl::store::DuckDbStore;
//!
//! let store = DuckDbStore::open("retail.duckdb")?;
//! let schema = TableSchema::retail_staging("staging_customer_data")?;
//! ensure_table(&store, &schema)?;
//!
//! let table = extract_records(Path::new("shopping_trends.csv"), b',')?;
//! let keys = vec!["customer_id".to_string()];
//! let stats = load_to_staging(&store, &table, &schema, &ColumnMapping::default(), &keys)?;
//! println!("Loaded {} rows in {}", stats.rows_loaded, stats.duration_string());
//! ```

mod loader;

pub use loader::{LoadStats, StagingLoader, load_to_staging, upsert_sql};
