//! Configuration file types
//!
//! The ETL run is driven by a YAML file:
//!
//! ```yaml
//! csv_file_path: data/shopping_trends.csv
//! log_file_path: logs/etl_process.log
//! db_config:
//!   backend: postgres
//!   host: localhost
//!   port: 5432
//!   user: etl
//!   password: secret
//!   database: retail
//! # optional
//! staging_table: staging_customer_data
//! primary_keys: [customer_id]
//! normalization: merge
//! imputation: global_mean
//! on_step_failure: halt
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, EtlResult};
use crate::mapping::ColumnMapping;
use crate::pipeline::FailurePolicy;
use crate::schema::DEFAULT_STAGING_TABLE;
use crate::transform::{ImputationStrategy, NormalizationMode};

/// Store backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Embedded DuckDB; `database` is a file path or `:memory:`
    #[default]
    DuckDb,
    /// PostgreSQL server
    Postgres,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duckdb" => Ok(Backend::DuckDb),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            _ => Err(format!(
                "Invalid backend: {}. Expected: duckdb, postgres",
                s
            )),
        }
    }
}

/// Database connection descriptor
#[derive(Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub backend: Backend,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbConfig {
    /// Key/value connection string understood by `tokio-postgres`
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            quote_conn_value(&self.host),
            self.port,
            quote_conn_value(&self.user),
            quote_conn_value(&self.password),
            quote_conn_value(&self.database),
        )
    }

    fn validate(&self) -> Result<(), String> {
        let required = [
            ("db_config.host", &self.host),
            ("db_config.user", &self.user),
            ("db_config.database", &self.database),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{name} must not be empty"));
            }
        }
        if self.port == 0 {
            return Err("db_config.port must be non-zero".to_string());
        }
        Ok(())
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

fn quote_conn_value(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Top-level ETL configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Delimited input file
    pub csv_file_path: PathBuf,
    /// Store connection descriptor
    pub db_config: DbConfig,
    /// Append-only log file
    pub log_file_path: PathBuf,
    /// Staging table name
    #[serde(default = "default_staging_table")]
    pub staging_table: String,
    /// Primary-key columns of the staging table
    #[serde(default = "default_primary_keys")]
    pub primary_keys: Vec<String>,
    /// External to internal column names
    #[serde(default)]
    pub column_mapping: ColumnMapping,
    /// Field delimiter of the input file
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// How derived tables follow staging after creation
    #[serde(default)]
    pub normalization: NormalizationMode,
    /// How missing review ratings are filled
    #[serde(default)]
    pub imputation: ImputationStrategy,
    /// What the orchestrator does when a whole-table step fails
    #[serde(default)]
    pub on_step_failure: FailurePolicy,
}

fn default_staging_table() -> String {
    DEFAULT_STAGING_TABLE.to_string()
}

fn default_primary_keys() -> Vec<String> {
    vec!["customer_id".to_string()]
}

fn default_delimiter() -> char {
    ','
}

impl EtlConfig {
    /// Load and validate a YAML configuration file
    pub fn load(path: &Path) -> EtlResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> EtlResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| EtlError::InvalidConfig(e.to_string()))?;
        config.validate().map_err(EtlError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.csv_file_path.as_os_str().is_empty() {
            return Err("csv_file_path must not be empty".to_string());
        }
        if self.log_file_path.as_os_str().is_empty() {
            return Err("log_file_path must not be empty".to_string());
        }
        if self.primary_keys.is_empty() {
            return Err("primary_keys must name at least one column".to_string());
        }
        if !self.delimiter.is_ascii() {
            return Err(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ));
        }
        if self.column_mapping.is_empty() {
            return Err("column_mapping must not be empty".to_string());
        }
        self.db_config.validate()
    }

    /// Delimiter as the byte the CSV reader expects
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
csv_file_path: data/shopping_trends.csv
log_file_path: etl_process.log
db_config:
  host: localhost
  port: 5432
  user: etl
  password: secret
  database: retail
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = EtlConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.csv_file_path, PathBuf::from("data/shopping_trends.csv"));
        assert_eq!(config.db_config.backend, Backend::DuckDb);
        assert_eq!(config.staging_table, "staging_customer_data");
        assert_eq!(config.primary_keys, vec!["customer_id".to_string()]);
        assert_eq!(config.column_mapping.len(), 19);
        assert_eq!(config.delimiter_byte(), b',');
        assert_eq!(config.normalization, NormalizationMode::Merge);
        assert_eq!(config.imputation, ImputationStrategy::GlobalMean);
        assert_eq!(config.on_step_failure, FailurePolicy::Halt);
    }

    #[test]
    fn test_missing_required_key() {
        let yaml = r#"
csv_file_path: data.csv
db_config:
  host: localhost
  port: 5432
  user: etl
  password: secret
  database: retail
"#;
        let err = EtlConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("log_file_path"));

        let yaml = r#"
csv_file_path: data.csv
log_file_path: etl.log
db_config:
  host: localhost
  port: 5432
  user: etl
  database: retail
"#;
        let err = EtlConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_optional_overrides() {
        let yaml = r#"
csv_file_path: data.tsv
log_file_path: etl.log
delimiter: "\t"
normalization: snapshot
imputation: per_item_mean
on_step_failure: continue
column_mapping:
  Customer ID: customer_id
  Review Rating: review_rating
db_config:
  backend: postgres
  host: db.internal
  port: 6543
  user: etl
  password: secret
  database: retail
"#;
        let config = EtlConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.delimiter_byte(), b'\t');
        assert_eq!(config.db_config.backend, Backend::Postgres);
        assert_eq!(config.normalization, NormalizationMode::Snapshot);
        assert_eq!(config.imputation, ImputationStrategy::PerItemMean);
        assert_eq!(config.on_step_failure, FailurePolicy::Continue);
        assert_eq!(config.column_mapping.len(), 2);
        assert_eq!(
            config.column_mapping.resolve("Review Rating"),
            Some("review_rating")
        );
    }

    #[test]
    fn test_invalid_port() {
        let yaml = MINIMAL.replace("port: 5432", "port: 0");
        let err = EtlConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_connection_string_quotes_values() {
        let db = DbConfig {
            backend: Backend::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            user: "etl".to_string(),
            password: "it's secret".to_string(),
            database: "retail".to_string(),
        };
        assert_eq!(
            db.connection_string(),
            r"host=localhost port=5432 user=etl password='it\'s secret' dbname=retail"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = EtlConfig::from_yaml(MINIMAL).unwrap();
        let debug = format!("{:?}", config.db_config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("duckdb".parse::<Backend>().unwrap(), Backend::DuckDb);
        assert_eq!("PostgreSQL".parse::<Backend>().unwrap(), Backend::Postgres);
        assert!("mysql".parse::<Backend>().is_err());
    }
}
