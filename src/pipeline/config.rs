//! Pipeline configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::EtlConfig;
use crate::error::EtlResult;
use crate::mapping::ColumnMapping;
use crate::schema::{DEFAULT_STAGING_TABLE, TableSchema, retail_columns};
use crate::transform::{ImputationStrategy, NormalizationMode};

/// What the executor does when a whole-table stage fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and return the stage failure
    #[default]
    Halt,
    /// Record the failure and run the remaining stages
    Continue,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Halt => write!(f, "halt"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Delimited input file
    pub source: Option<PathBuf>,
    /// Field delimiter of the input file
    pub delimiter: u8,
    /// Staging table schema
    pub schema: TableSchema,
    /// Primary-key columns used for upserts
    pub primary_keys: Vec<String>,
    /// External to internal column names
    pub mapping: ColumnMapping,
    /// Stages to run (empty = all)
    pub stages: Vec<PipelineStage>,
    /// How derived tables follow staging
    pub normalization: NormalizationMode,
    /// How missing ratings are filled
    pub imputation: ImputationStrategy,
    /// Behavior on a failed stage
    pub on_failure: FailurePolicy,
    /// Enable dry-run mode
    pub dry_run: bool,
    /// Verbose output
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: None,
            delimiter: b',',
            schema: TableSchema {
                name: DEFAULT_STAGING_TABLE.to_string(),
                columns: retail_columns(),
            },
            primary_keys: vec!["customer_id".to_string()],
            mapping: ColumnMapping::default(),
            stages: Vec::new(),
            normalization: NormalizationMode::default(),
            imputation: ImputationStrategy::default(),
            on_failure: FailurePolicy::default(),
            dry_run: false,
            verbose: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pipeline config from a loaded configuration file
    pub fn from_etl_config(config: &EtlConfig) -> EtlResult<Self> {
        let schema = TableSchema::retail_staging(&config.staging_table)?
            .with_primary_keys(&config.primary_keys)?;

        Ok(Self {
            source: Some(config.csv_file_path.clone()),
            delimiter: config.delimiter_byte(),
            schema,
            primary_keys: config.primary_keys.clone(),
            mapping: config.column_mapping.clone(),
            normalization: config.normalization,
            imputation: config.imputation,
            on_failure: config.on_step_failure,
            ..Self::default()
        })
    }

    /// Set the source file
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the staging schema
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set the primary-key columns, marking them on the staging schema
    pub fn with_primary_keys(mut self, keys: Vec<String>) -> Self {
        for column in &mut self.schema.columns {
            column.primary_key = keys.contains(&column.name);
        }
        self.primary_keys = keys;
        self
    }

    /// Set the column mapping
    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Set specific stages to run
    pub fn with_stages(mut self, stages: Vec<PipelineStage>) -> Self {
        self.stages = stages;
        self
    }

    /// Set the normalization mode
    pub fn with_normalization(mut self, mode: NormalizationMode) -> Self {
        self.normalization = mode;
        self
    }

    /// Set the imputation strategy
    pub fn with_imputation(mut self, strategy: ImputationStrategy) -> Self {
        self.imputation = strategy;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Enable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Get stages to run (all if empty), in execution order
    pub fn effective_stages(&self) -> Vec<PipelineStage> {
        PipelineStage::all()
            .into_iter()
            .filter(|s| self.should_run_stage(*s))
            .collect()
    }

    /// Check if a specific stage should run
    pub fn should_run_stage(&self, stage: PipelineStage) -> bool {
        self.stages.is_empty() || self.stages.contains(&stage)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.schema.validate()?;

        if self.should_run_stage(PipelineStage::Extract) && self.source.is_none() {
            return Err("Source path is required for extract stage".to_string());
        }

        if self.should_run_stage(PipelineStage::Load)
            && !self.should_run_stage(PipelineStage::Extract)
        {
            return Err("Load stage requires the extract stage".to_string());
        }

        if self.primary_keys.is_empty() {
            return Err("At least one primary key column is required".to_string());
        }
        if let Some(missing) = self
            .primary_keys
            .iter()
            .find(|k| self.schema.column(k).is_none())
        {
            return Err(format!(
                "Primary key column {missing} is not a column of {}",
                self.schema.name
            ));
        }

        let mut upsert_keys: Vec<&str> = self.primary_keys.iter().map(String::as_str).collect();
        let mut table_keys = self.schema.primary_keys();
        upsert_keys.sort_unstable();
        table_keys.sort_unstable();
        if upsert_keys != table_keys {
            return Err(format!(
                "Primary keys [{}] do not match the primary key of {} [{}]",
                self.primary_keys.join(", "),
                self.schema.name,
                self.schema.primary_keys().join(", ")
            ));
        }

        Ok(())
    }
}

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// Stage 1: Read the delimited source file
    Extract,
    /// Stage 2: Create the staging table if absent
    Schema,
    /// Stage 3: Upsert extracted rows into staging
    Load,
    /// Stage 4: Rewrite yes/no columns as booleans
    Types,
    /// Stage 5: Derive customers, products and purchases
    Normalize,
    /// Stage 6: Fill missing review ratings
    Repair,
}

impl PipelineStage {
    /// Get all stages in execution order
    pub fn all() -> Vec<Self> {
        vec![
            Self::Extract,
            Self::Schema,
            Self::Load,
            Self::Types,
            Self::Normalize,
            Self::Repair,
        ]
    }

    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Schema => "schema",
            Self::Load => "load",
            Self::Types => "types",
            Self::Normalize => "normalize",
            Self::Repair => "repair",
        }
    }

    /// Get stage description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Extract => "Read the delimited source file",
            Self::Schema => "Create the staging table if absent",
            Self::Load => "Upsert extracted rows into staging",
            Self::Types => "Rewrite yes/no columns as booleans",
            Self::Normalize => "Derive customers, products and purchases",
            Self::Repair => "Fill missing review ratings",
        }
    }

    /// Get stage index (1-based)
    pub fn index(&self) -> usize {
        match self {
            Self::Extract => 1,
            Self::Schema => 2,
            Self::Load => 3,
            Self::Types => 4,
            Self::Normalize => 5,
            Self::Repair => 6,
        }
    }

    /// Check if this stage writes to the store
    pub fn writes_store(&self) -> bool {
        !matches!(self, Self::Extract)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "extract" | "1" => Ok(Self::Extract),
            "schema" | "2" => Ok(Self::Schema),
            "load" | "3" => Ok(Self::Load),
            "types" | "4" => Ok(Self::Types),
            "normalize" | "5" => Ok(Self::Normalize),
            "repair" | "6" => Ok(Self::Repair),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}
