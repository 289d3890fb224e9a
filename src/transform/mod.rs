//! Whole-table transforms applied after the staging load
//!
//! - [`normalize_boolean_columns`]: rewrites yes/no text into canonical booleans
//! - [`normalize_schema`]: derives customers, products and purchases from staging
//! - [`repair_review_ratings`]: fills missing review ratings
//!
//! Each transform is a handful of set-based statements and returns an error
//! instead of swallowing it; the pipeline decides whether a failure halts the
//! run.

mod normalize;
mod repair;
mod types;

use serde::{Deserialize, Serialize};

pub use normalize::{
    CUSTOMERS_TABLE, NormalizeOutcome, PRODUCTS_TABLE, PURCHASES_TABLE, normalize_schema,
};
pub use repair::{RepairStats, repair_review_ratings};
pub use types::{BOOLEAN_TEXT_COLUMNS, normalize_boolean_columns};

/// How the derived tables follow staging once they exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// Populate once at creation and never refresh
    Snapshot,
    /// Merge staging into the derived tables on every run
    #[default]
    Merge,
}

impl std::fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot => write!(f, "snapshot"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// How missing review ratings are filled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStrategy {
    /// Mean of every rated purchase
    #[default]
    GlobalMean,
    /// Mean of rated purchases of the same item, then the global mean
    PerItemMean,
}

impl std::fmt::Display for ImputationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GlobalMean => write!(f, "global_mean"),
            Self::PerItemMean => write!(f, "per_item_mean"),
        }
    }
}
