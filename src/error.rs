//! Error types for extraction, staging and transform operations

use std::path::PathBuf;
use thiserror::Error;

/// Boxed backend error kept as the `#[source]` of an execution failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while moving records through the store
#[derive(Error, Debug)]
pub enum EtlError {
    /// Input file missing, unreadable or malformed
    #[error("Extraction error in {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    /// External column label with no internal name
    #[error("Unmapped column: {0}")]
    Mapping(String),

    /// Primary key missing or otherwise unusable
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Raw value that cannot be coerced into its column type
    #[error("Invalid value {value:?} for column {column}: expected {expected}")]
    InvalidValue {
        column: String,
        value: String,
        expected: &'static str,
    },

    /// DDL/DML failure reported by the store backend
    #[error("Execution error in `{context}`")]
    Execution {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store and transform operations
pub type EtlResult<T> = Result<T, EtlError>;

impl EtlError {
    /// Create an extraction error for a path
    pub fn extraction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an execution error, summarizing the statement that failed
    pub fn execution<E>(sql: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Execution {
            context: summarize_sql(sql),
            source: Box::new(source),
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            EtlError::Extraction { path, reason } => {
                format!(
                    "Cannot read input file {}\nReason: {reason}\n\n\
                    Hint: Check that csv_file_path exists and every row has the same number of columns.",
                    path.display()
                )
            }
            EtlError::Mapping(column) => {
                format!(
                    "Column '{column}' has no internal name.\n\n\
                    Hint: Add it to column_mapping in the configuration file."
                )
            }
            EtlError::InvalidConfig(msg) => {
                format!("Invalid configuration: {msg}\n\nHint: Check your configuration file.")
            }
            _ => error_chain(self),
        }
    }
}

/// Render an error and all of its sources as a single line
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Collapse whitespace and cap a statement for error context
fn summarize_sql(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > 96 {
        let head: String = collapsed.chars().take(96).collect();
        format!("{head}...")
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "connection reset");
        let err = EtlError::execution("UPDATE   purchases\n  SET review_rating = 1", io_err);

        assert_eq!(
            err.to_string(),
            "Execution error in `UPDATE purchases SET review_rating = 1`"
        );
        let chain = error_chain(&err);
        assert!(chain.ends_with("caused by: connection reset"));
    }

    #[test]
    fn test_summarize_long_sql() {
        let sql = format!("SELECT {}", "x, ".repeat(60));
        let summary = summarize_sql(&sql);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), 99);
    }

    #[test]
    fn test_user_message() {
        let err = EtlError::Mapping("Tip Amount".to_string());
        let msg = err.user_message();
        assert!(msg.contains("Tip Amount"));
        assert!(msg.contains("Hint:"));

        let err = EtlError::extraction("/data/shopping.csv", "file not found");
        assert!(err.user_message().contains("/data/shopping.csv"));
    }
}
