//! Retail ETL - Extract, stage and normalize retail purchase records
//!
//! Provides:
//! - Record extraction from delimited files
//! - Idempotent upsert loading into a staging table
//! - Boolean normalization of yes/no columns
//! - One-time derivation of customers/products/purchases, with optional merge
//! - Review-rating imputation
//! - Pipeline orchestration with a configurable failure policy
//! - Store backends (DuckDB, PostgreSQL)

pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod mapping;
pub mod pipeline;
pub mod schema;
pub mod staging;
pub mod store;
pub mod transform;

// Re-export commonly used types
pub use config::{Backend, DbConfig, EtlConfig};
pub use error::{EtlError, EtlResult, error_chain};
pub use extract::{ExtractedTable, RawRecord, extract_records};
pub use mapping::ColumnMapping;
pub use pipeline::{
    FailurePolicy, PipelineConfig, PipelineError, PipelineExecutor, PipelineReport,
    PipelineStage, PipelineStatus, run_pipeline,
};
pub use schema::{ColumnDef, ColumnType, TableSchema, ensure_table};
pub use staging::{LoadStats, load_to_staging};
#[cfg(feature = "duckdb-backend")]
pub use store::DuckDbStore;
#[cfg(feature = "postgres-backend")]
pub use store::PostgresStore;
pub use store::{Cell, Store};
pub use transform::{
    ImputationStrategy, NormalizationMode, normalize_boolean_columns, normalize_schema,
    repair_review_ratings,
};
