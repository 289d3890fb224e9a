//! Pipeline executor for running the ETL stages

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::config::{FailurePolicy, PipelineConfig, PipelineStage};
use super::error::{PipelineError, PipelineResult};
use super::report::{PipelineReport, PipelineStatus, StageOutput};
use crate::error::error_chain;
use crate::extract::{ExtractedTable, extract_records};
use crate::schema::ensure_table;
use crate::staging::load_to_staging;
use crate::store::Store;
use crate::transform::{normalize_boolean_columns, normalize_schema, repair_review_ratings};

/// Pipeline executor that runs all stages against one store
pub struct PipelineExecutor<S: Store> {
    config: PipelineConfig,
    store: S,
    run_id: String,
    extracted: Option<ExtractedTable>,
    rows_rejected: usize,
}

impl<S: Store> PipelineExecutor<S> {
    /// Create a new pipeline executor owning the store for the whole run
    pub fn new(config: PipelineConfig, store: S) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::ConfigError)?;

        Ok(Self {
            config,
            store,
            run_id: Uuid::new_v4().to_string(),
            extracted: None,
            rows_rejected: 0,
        })
    }

    /// Get the run ID
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the executor and hand back the store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Run the pipeline
    pub fn run(&mut self) -> PipelineResult<PipelineReport> {
        let _span = info_span!(
            "pipeline_run",
            run_id = %self.run_id,
            dry_run = self.config.dry_run
        )
        .entered();

        let start = Instant::now();
        let started_at = Utc::now();
        let stages = self.config.effective_stages();

        info!(
            run_id = %self.run_id,
            backend = self.store.backend(),
            stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            dry_run = self.config.dry_run,
            "Starting pipeline"
        );

        if self.config.verbose {
            eprintln!("Pipeline run: {}", self.run_id);
            eprintln!(
                "Stages to run: {:?}",
                stages.iter().map(|s| s.name()).collect::<Vec<_>>()
            );
            if self.config.dry_run {
                eprintln!("DRY RUN MODE - no changes will be made");
            }
        }

        if self.config.dry_run {
            return self.dry_run(&stages, started_at);
        }

        self.extracted = None;
        self.rows_rejected = 0;
        let mut outputs = Vec::with_capacity(stages.len());
        let mut had_failure = false;

        for stage in &stages {
            if let Some(reason) = self.should_skip_stage(*stage) {
                debug!(stage = stage.name(), reason = %reason, "Skipping stage");
                if self.config.verbose {
                    eprintln!("Skipping stage {}: {}", stage.name(), reason);
                }
                outputs.push((*stage, StageOutput::skipped(reason)));
                continue;
            }

            let _stage_span = info_span!("pipeline_stage", stage = stage.name()).entered();
            info!(stage = stage.name(), "Starting stage");

            if self.config.verbose {
                eprintln!(
                    "[{}/{}] {}: {}",
                    stage.index(),
                    PipelineStage::all().len(),
                    stage.name(),
                    stage.description()
                );
            }

            let stage_start = Instant::now();
            match self.run_stage(*stage) {
                Ok(output) => {
                    let output = output.with_duration(stage_start.elapsed().as_millis() as u64);
                    info!(
                        stage = stage.name(),
                        duration_ms = output.duration_ms,
                        "Stage completed"
                    );
                    if self.config.verbose {
                        eprintln!(
                            "Stage {} completed in {}ms",
                            stage.name(),
                            output.duration_ms
                        );
                    }
                    outputs.push((*stage, output));
                }
                Err(e) => {
                    let cause = error_chain(&e);
                    error!(
                        stage = stage.name(),
                        policy = %self.config.on_failure,
                        cause = %cause,
                        "Stage failed"
                    );
                    eprintln!("Stage {} failed: {}", stage.name(), cause);

                    match self.config.on_failure {
                        FailurePolicy::Halt => {
                            return Err(PipelineError::stage_failure(stage.name(), e));
                        }
                        FailurePolicy::Continue => {
                            had_failure = true;
                            let output = StageOutput::failed(cause)
                                .with_duration(stage_start.elapsed().as_millis() as u64);
                            outputs.push((*stage, output));
                        }
                    }
                }
            }
        }

        let status = if had_failure {
            PipelineStatus::CompletedWithErrors
        } else {
            PipelineStatus::Completed
        };

        let duration = start.elapsed();
        info!(
            run_id = %self.run_id,
            status = %status,
            rows_rejected = self.rows_rejected,
            duration_ms = duration.as_millis() as u64,
            "Pipeline finished"
        );

        Ok(PipelineReport {
            run_id: self.run_id.clone(),
            status,
            started_at,
            outputs,
            rows_rejected: self.rows_rejected,
            duration_ms: duration.as_millis() as u64,
        })
    }

    /// Run a single stage
    fn run_stage(&mut self, stage: PipelineStage) -> PipelineResult<StageOutput> {
        match stage {
            PipelineStage::Extract => self.run_extract(),
            PipelineStage::Schema => self.run_schema(),
            PipelineStage::Load => self.run_load(),
            PipelineStage::Types => self.run_types(),
            PipelineStage::Normalize => self.run_normalize(),
            PipelineStage::Repair => self.run_repair(),
        }
    }

    /// Run the extract stage
    fn run_extract(&mut self) -> PipelineResult<StageOutput> {
        let source = self
            .config
            .source
            .as_ref()
            .ok_or_else(|| PipelineError::MissingInput("source path".to_string()))?;

        let table = extract_records(source, self.config.delimiter)?;

        let unmapped = self.config.mapping.unmapped(&table.headers);
        if !unmapped.is_empty() {
            warn!(columns = ?unmapped, "Source has unmapped columns, every row will be rejected");
        }

        if self.config.verbose {
            eprintln!(
                "  Extracted {} rows with {} columns",
                table.len(),
                table.headers.len()
            );
        }

        let output = StageOutput::success()
            .with_metadata(
                "source",
                serde_json::json!(source.display().to_string()),
            )
            .with_metadata("rows", serde_json::json!(table.len()))
            .with_metadata("columns", serde_json::json!(table.headers.len()));

        self.extracted = Some(table);
        Ok(output)
    }

    /// Run the schema stage
    fn run_schema(&self) -> PipelineResult<StageOutput> {
        let created = ensure_table(&self.store, &self.config.schema)?;
        Ok(StageOutput::success()
            .with_metadata("table", serde_json::json!(self.config.schema.name))
            .with_metadata("created", serde_json::json!(created)))
    }

    /// Run the load stage
    fn run_load(&mut self) -> PipelineResult<StageOutput> {
        let table = self
            .extracted
            .as_ref()
            .ok_or_else(|| PipelineError::MissingInput("extracted records".to_string()))?;

        let stats = load_to_staging(
            &self.store,
            table,
            &self.config.schema,
            &self.config.mapping,
            &self.config.primary_keys,
        )?;
        self.rows_rejected += stats.rows_rejected;

        if self.config.verbose {
            eprintln!(
                "  Loaded {} rows, rejected {} in {}",
                stats.rows_loaded,
                stats.rows_rejected,
                stats.duration_string()
            );
        }

        Ok(StageOutput::success()
            .with_metadata("rows_seen", serde_json::json!(stats.rows_seen))
            .with_metadata("rows_loaded", serde_json::json!(stats.rows_loaded))
            .with_metadata("rows_rejected", serde_json::json!(stats.rows_rejected))
            .with_metadata("errors", serde_json::json!(stats.errors)))
    }

    /// Run the types stage
    fn run_types(&self) -> PipelineResult<StageOutput> {
        let rows = normalize_boolean_columns(&self.store, &self.config.schema.name)?;
        Ok(StageOutput::success().with_metadata("rows_updated", serde_json::json!(rows)))
    }

    /// Run the normalize stage
    fn run_normalize(&self) -> PipelineResult<StageOutput> {
        let outcome = normalize_schema(
            &self.store,
            &self.config.schema.name,
            self.config.normalization,
        )?;
        Ok(StageOutput::success()
            .with_metadata("mode", serde_json::json!(self.config.normalization))
            .with_metadata("created", serde_json::json!(outcome.created))
            .with_metadata("merged", serde_json::json!(outcome.merged))
            .with_metadata("customers", serde_json::json!(outcome.customers))
            .with_metadata("products", serde_json::json!(outcome.products))
            .with_metadata("purchases", serde_json::json!(outcome.purchases)))
    }

    /// Run the repair stage
    fn run_repair(&self) -> PipelineResult<StageOutput> {
        let stats = repair_review_ratings(&self.store, self.config.imputation)?;
        Ok(StageOutput::success()
            .with_metadata("strategy", serde_json::json!(self.config.imputation))
            .with_metadata("filled", serde_json::json!(stats.filled))
            .with_metadata("mean", serde_json::json!(stats.mean)))
    }

    /// Check if a stage should be skipped
    fn should_skip_stage(&self, stage: PipelineStage) -> Option<String> {
        match stage {
            PipelineStage::Load => match &self.extracted {
                None => Some("No records extracted".to_string()),
                Some(table) if table.is_empty() => Some("Source file has no data rows".to_string()),
                Some(_) => None,
            },
            _ => None,
        }
    }

    /// Run in dry-run mode (validation only)
    fn dry_run(
        &self,
        stages: &[PipelineStage],
        started_at: chrono::DateTime<Utc>,
    ) -> PipelineResult<PipelineReport> {
        let mut validation_errors = Vec::new();

        for stage in stages {
            if let Err(e) = self.validate_stage(*stage) {
                validation_errors.push(format!("{}: {}", stage.name(), e));
            }
        }

        if !validation_errors.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "Validation errors:\n  {}",
                validation_errors.join("\n  ")
            )));
        }

        let outputs = stages
            .iter()
            .map(|stage| {
                let output = if stage.writes_store() {
                    StageOutput::skipped("dry run")
                } else {
                    StageOutput::success()
                };
                (*stage, output)
            })
            .collect();

        eprintln!("Dry run validation passed for all stages");

        Ok(PipelineReport {
            run_id: self.run_id.clone(),
            status: PipelineStatus::Completed,
            started_at,
            outputs,
            rows_rejected: 0,
            duration_ms: 0,
        })
    }

    /// Validate a stage's inputs without touching the store
    fn validate_stage(&self, stage: PipelineStage) -> PipelineResult<()> {
        match stage {
            PipelineStage::Extract => {
                let source = self
                    .config
                    .source
                    .as_ref()
                    .ok_or_else(|| PipelineError::MissingInput("source path".to_string()))?;
                if !source.exists() {
                    return Err(PipelineError::FileNotFound(source.clone()));
                }
                let table = extract_records(source, self.config.delimiter)?;
                let unmapped = self.config.mapping.unmapped(&table.headers);
                if !unmapped.is_empty() {
                    return Err(PipelineError::ConfigError(format!(
                        "unmapped columns: {}",
                        unmapped.join(", ")
                    )));
                }
                let unknown: Vec<&str> = table
                    .headers
                    .iter()
                    .filter_map(|h| self.config.mapping.resolve(h))
                    .filter(|internal| self.config.schema.column(internal).is_none())
                    .collect();
                if !unknown.is_empty() {
                    return Err(PipelineError::ConfigError(format!(
                        "mapped columns missing from {}: {}",
                        self.config.schema.name,
                        unknown.join(", ")
                    )));
                }
            }
            PipelineStage::Load => {
                if self.config.schema.primary_keys().is_empty() {
                    return Err(PipelineError::ConfigError(format!(
                        "{} declares no primary key",
                        self.config.schema.name
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}
