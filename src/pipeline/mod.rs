//! ETL pipeline orchestration
//!
//! This module sequences the ETL stages against a single store:
//! - Extract records from the delimited source file
//! - Create the staging table if it does not exist
//! - Upsert the records into staging
//! - Rewrite yes/no columns as booleans
//! - Derive the customers, products and purchases tables
//! - Fill missing review ratings
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_etl::pipeline::{FailurePolicy, PipelineConfig, PipelineExecutor};
//! use retail_etl::store::DuckDbStore;
//!
//! let config = PipelineConfig::new()
//!     .with_source("data/shopping_trends.csv")
//!     .with_failure_policy(FailurePolicy::Continue);
//!
//! let mut executor = PipelineExecutor::new(config, DuckDbStore::open("retail.duckdb")?)?;
//! let report = executor.run()?;
//!
//! println!("Pipeline {} in {}", report.status, report.duration_formatted());
//! ```
//!
//! # Failure policy
//!
//! Rows that fail to load are logged and counted in
//! [`PipelineReport::rows_rejected`]; they never fail a stage. A stage that
//! fails as a whole either stops the run ([`FailurePolicy::Halt`], the
//! default) or is recorded while the remaining stages still run
//! ([`FailurePolicy::Continue`]).
//!
//! # Dry Run
//!
//! Validate inputs without writing to the store:
//!
//! ```rust,ignore
//! let config = PipelineConfig::new()
//!     .with_source("data/shopping_trends.csv")
//!     .with_dry_run(true);
//!
//! let mut executor = PipelineExecutor::new(config, store)?;
//! let report = executor.run()?; // Parses the file and checks the mapping
//! ```

mod config;
mod error;
mod executor;
mod report;

pub use config::{FailurePolicy, PipelineConfig, PipelineStage};
pub use error::{PipelineError, PipelineResult};
pub use executor::PipelineExecutor;
pub use report::{PipelineReport, PipelineStatus, StageOutput};

use crate::store::Store;

/// Run a pipeline with the given configuration and store
///
/// The store is released when the run returns.
pub fn run_pipeline<S: Store>(config: PipelineConfig, store: S) -> PipelineResult<PipelineReport> {
    let mut executor = PipelineExecutor::new(config, store)?;
    executor.run()
}

#[cfg(all(test, feature = "duckdb-backend"))]
mod tests {
    use super::*;
    use crate::store::DuckDbStore;
    use tempfile::TempDir;

    #[test]
    fn test_run_pipeline_dry_run() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("shopping_trends.csv");
        std::fs::write(&source, "Customer ID,Age\n1,30\n").unwrap();

        let config = PipelineConfig::new()
            .with_source(&source)
            .with_dry_run(true)
            .with_stages(vec![PipelineStage::Extract]);

        let report = run_pipeline(config, DuckDbStore::memory().unwrap()).unwrap();
        assert!(report.is_success());
    }
}
