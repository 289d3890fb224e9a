//! Staging table schema definitions

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EtlError, EtlResult};
use crate::store::{Cell, Store};

/// Default staging table name
pub const DEFAULT_STAGING_TABLE: &str = "staging_customer_data";

/// Raw tokens read as a missing value
const NULL_TOKENS: [&str; 5] = ["na", "n/a", "nan", "null", "none"];

/// Column types supported by the staging layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
}

impl ColumnType {
    /// SQL type name, valid on DuckDB and PostgreSQL
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Text => "VARCHAR",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    /// A NULL of this type
    pub fn null(&self) -> Cell {
        match self {
            ColumnType::Integer => Cell::Integer(None),
            ColumnType::Float => Cell::Float(None),
            ColumnType::Text => Cell::Text(None),
            ColumnType::Boolean => Cell::Boolean(None),
        }
    }

    /// Coerce a raw extracted value into a typed cell
    pub fn coerce(&self, column: &str, raw: &str) -> EtlResult<Cell> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || NULL_TOKENS.contains(&trimmed.to_lowercase().as_str()) {
            return Ok(self.null());
        }

        let invalid = |expected: &'static str| EtlError::InvalidValue {
            column: column.to_string(),
            value: raw.to_string(),
            expected,
        };

        match self {
            ColumnType::Integer => {
                if let Ok(n) = trimmed.parse::<i64>() {
                    return Ok(Cell::Integer(Some(n)));
                }
                // Integral floats ("7.0") come out of spreadsheet exports.
                // i64::MAX as f64 rounds up to 2^63
                match trimmed.parse::<f64>() {
                    Ok(f)
                        if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
                    {
                        Ok(Cell::Integer(Some(f as i64)))
                    }
                    _ => Err(invalid("integer")),
                }
            }
            ColumnType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| Cell::Float(Some(f)))
                .ok_or_else(|| invalid("number")),
            ColumnType::Text => Ok(Cell::Text(Some(trimmed.to_string()))),
            ColumnType::Boolean => match trimmed.to_lowercase().as_str() {
                "yes" | "true" | "t" | "1" => Ok(Cell::Boolean(Some(true))),
                "no" | "false" | "f" | "0" => Ok(Cell::Boolean(Some(false))),
                _ => Err(invalid("boolean")),
            },
        }
    }
}

/// A column of a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnDef {
    /// Create a nullable, non-key column
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
        }
    }

    /// Mark the column as part of the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// Table name plus ordered column definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Create a schema, validating every identifier
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> EtlResult<Self> {
        let schema = Self {
            name: name.into(),
            columns,
        };
        schema.validate().map_err(EtlError::InvalidConfig)?;
        Ok(schema)
    }

    /// The staging schema of the retail shopping-trends export
    pub fn retail_staging(name: impl Into<String>) -> EtlResult<Self> {
        Self::new(name, retail_columns())
    }

    /// Replace the primary key with the given columns
    pub fn with_primary_keys(mut self, keys: &[String]) -> EtlResult<Self> {
        if keys.is_empty() {
            return Err(EtlError::InvalidConfig(
                "primary key must name at least one column".to_string(),
            ));
        }
        if let Some(missing) = keys.iter().find(|k| self.column(k).is_none()) {
            return Err(EtlError::InvalidConfig(format!(
                "primary key column {missing} is not a column of {}",
                self.name
            )));
        }
        for column in &mut self.columns {
            column.primary_key = keys.contains(&column.name);
        }
        Ok(self)
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Index of a column by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Names of the declared primary-key columns
    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Validate the table and column names
    pub fn validate(&self) -> Result<(), String> {
        validate_identifier(&self.name)?;
        if self.columns.is_empty() {
            return Err(format!("table {} has no columns", self.name));
        }
        for (i, column) in self.columns.iter().enumerate() {
            validate_identifier(&column.name)?;
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(format!(
                    "column {} is declared twice in {}",
                    column.name, self.name
                ));
            }
        }
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this schema
    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {} {}", c.name, c.column_type.sql_type()))
            .collect();

        let keys = self.primary_keys();
        if !keys.is_empty() {
            parts.push(format!("    PRIMARY KEY ({})", keys.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.name,
            parts.join(",\n")
        )
    }
}

/// Columns of the retail shopping-trends staging table
pub fn retail_columns() -> Vec<ColumnDef> {
    use ColumnType::*;

    vec![
        ColumnDef::new("customer_id", Integer).primary_key(),
        ColumnDef::new("category", Text),
        ColumnDef::new("age", Integer),
        ColumnDef::new("gender", Text),
        ColumnDef::new("location", Text),
        ColumnDef::new("color", Text),
        ColumnDef::new("size", Text),
        ColumnDef::new("season", Text),
        ColumnDef::new("item_purchased", Text),
        ColumnDef::new("purchase_amount", Float),
        ColumnDef::new("review_rating", Float),
        ColumnDef::new("subscription_status", Text),
        ColumnDef::new("payment_method", Text),
        ColumnDef::new("shipping_type", Text),
        ColumnDef::new("discount_applied", Text),
        ColumnDef::new("promo_code_used", Text),
        ColumnDef::new("previous_purchase", Text),
        ColumnDef::new("preferred_payment_method", Text),
        ColumnDef::new("frequency_of_purchase", Text),
    ]
}

/// Check that a name is a plain SQL identifier
///
/// Table and column names are interpolated into statements, so only ASCII
/// letters, digits and underscores are accepted.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!("invalid SQL identifier: {name:?}"))
    }
}

/// Create the table if it does not already exist
pub fn ensure_table(store: &dyn Store, schema: &TableSchema) -> EtlResult<bool> {
    let existed = store.table_exists(&schema.name)?;
    if existed {
        debug!(table = %schema.name, "Table already exists");
    } else {
        info!(table = %schema.name, columns = schema.columns.len(), "Creating table");
    }
    store.execute_batch(&schema.create_table_sql())?;
    Ok(!existed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retail_staging_schema() {
        let schema = TableSchema::retail_staging(DEFAULT_STAGING_TABLE).unwrap();
        assert_eq!(schema.columns.len(), 19);
        assert_eq!(schema.primary_keys(), vec!["customer_id"]);
        assert_eq!(
            schema.column("review_rating").map(|c| c.column_type),
            Some(ColumnType::Float)
        );
    }

    #[test]
    fn test_with_primary_keys() {
        let schema = TableSchema::retail_staging("staging")
            .unwrap()
            .with_primary_keys(&["customer_id".to_string(), "item_purchased".to_string()])
            .unwrap();
        assert_eq!(schema.primary_keys(), vec!["customer_id", "item_purchased"]);

        let err = TableSchema::retail_staging("staging")
            .unwrap()
            .with_primary_keys(&["order_id".to_string()])
            .unwrap_err();
        assert!(matches!(err, EtlError::InvalidConfig(_)));
        assert!(TableSchema::retail_staging("staging")
            .unwrap()
            .with_primary_keys(&[])
            .is_err());
    }

    #[test]
    fn test_create_table_sql() {
        let schema = TableSchema::new(
            "people",
            vec![
                ColumnDef::new("id", ColumnType::Integer).primary_key(),
                ColumnDef::new("score", ColumnType::Float),
            ],
        )
        .unwrap();

        assert_eq!(
            schema.create_table_sql(),
            "CREATE TABLE IF NOT EXISTS people (\n    id BIGINT,\n    score DOUBLE PRECISION,\n    PRIMARY KEY (id)\n);"
        );
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("staging_customer_data").is_ok());
        assert!(validate_identifier("_tmp1").is_ok());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("orders; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());

        let result = TableSchema::new(
            "t",
            vec![
                ColumnDef::new("a", ColumnType::Text),
                ColumnDef::new("a", ColumnType::Text),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_coerce_values() {
        assert_eq!(
            ColumnType::Integer.coerce("age", "42").unwrap(),
            Cell::Integer(Some(42))
        );
        assert_eq!(
            ColumnType::Integer.coerce("age", "7.0").unwrap(),
            Cell::Integer(Some(7))
        );
        assert_eq!(
            ColumnType::Float.coerce("purchase_amount", " 53.5 ").unwrap(),
            Cell::Float(Some(53.5))
        );
        assert_eq!(
            ColumnType::Text.coerce("gender", "Male").unwrap(),
            Cell::Text(Some("Male".to_string()))
        );
        assert_eq!(
            ColumnType::Boolean.coerce("flag", "Yes").unwrap(),
            Cell::Boolean(Some(true))
        );
    }

    #[test]
    fn test_coerce_missing_values() {
        for raw in ["", "  ", "NaN", "NA", "null", "None"] {
            assert!(ColumnType::Float.coerce("review_rating", raw).unwrap().is_null());
        }
        assert!(ColumnType::Text.coerce("color", "").unwrap().is_null());
    }

    #[test]
    fn test_coerce_invalid_values() {
        let err = ColumnType::Integer.coerce("age", "forty").unwrap_err();
        assert!(matches!(err, EtlError::InvalidValue { expected: "integer", .. }));

        assert!(ColumnType::Integer.coerce("age", "7.5").is_err());
        // Out of range integral floats are rejected, not clamped
        assert!(ColumnType::Integer.coerce("customer_id", "1e30").is_err());
        assert!(ColumnType::Integer.coerce("customer_id", "-9.3e18").is_err());
        assert!(ColumnType::Integer.coerce("customer_id", "9.3e18").is_err());
        assert_eq!(
            ColumnType::Integer.coerce("customer_id", "1e3").unwrap(),
            Cell::Integer(Some(1000))
        );
        assert!(ColumnType::Float.coerce("purchase_amount", "inf").is_err());
        assert!(ColumnType::Boolean.coerce("flag", "maybe").is_err());
    }

    #[cfg(feature = "duckdb-backend")]
    #[test]
    fn test_ensure_table_is_idempotent() {
        let store = crate::store::DuckDbStore::memory().unwrap();
        let schema = TableSchema::retail_staging(DEFAULT_STAGING_TABLE).unwrap();

        assert!(ensure_table(&store, &schema).unwrap());
        assert!(!ensure_table(&store, &schema).unwrap());
        assert!(store.table_exists(DEFAULT_STAGING_TABLE).unwrap());
        assert_eq!(store.count_rows(DEFAULT_STAGING_TABLE).unwrap(), 0);
    }
}
