//! External to internal column-name mapping
//!
//! Source files label their columns for people ("Purchase Amount (USD)"); the
//! staging table uses snake_case names. The mapping is plain data so a new
//! source layout only needs a `column_mapping` entry in the configuration file.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::EtlError;

/// Default labels of the retail shopping-trends export
pub const DEFAULT_COLUMN_LABELS: [(&str, &str); 19] = [
    ("Customer ID", "customer_id"),
    ("Payment Method", "payment_method"),
    ("Item Purchased", "item_purchased"),
    ("Size", "size"),
    ("Preferred Payment Method", "preferred_payment_method"),
    ("Discount Applied", "discount_applied"),
    ("Color", "color"),
    ("Purchase Amount (USD)", "purchase_amount"),
    ("Gender", "gender"),
    ("Season", "season"),
    ("Shipping Type", "shipping_type"),
    ("Review Rating", "review_rating"),
    ("Age", "age"),
    ("Frequency of Purchases", "frequency_of_purchase"),
    ("Promo Code Used", "promo_code_used"),
    ("Subscription Status", "subscription_status"),
    ("Category", "category"),
    ("Location", "location"),
    ("Previous Purchases", "previous_purchase"),
];

static DEFAULT_MAPPING: Lazy<ColumnMapping> =
    Lazy::new(|| DEFAULT_COLUMN_LABELS.iter().copied().collect());

/// Rename table from external column labels to internal column names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    entries: BTreeMap<String, String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        DEFAULT_MAPPING.clone()
    }
}

impl<E: Into<String>, I: Into<String>> FromIterator<(E, I)> for ColumnMapping {
    fn from_iter<T: IntoIterator<Item = (E, I)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(external, internal)| (external.into(), internal.into()))
                .collect(),
        }
    }
}

impl ColumnMapping {
    /// Internal name for an external label, if mapped
    pub fn resolve(&self, external: &str) -> Option<&str> {
        self.entries.get(external).map(String::as_str)
    }

    /// Internal name for an external label, or a mapping error
    pub fn try_resolve(&self, external: &str) -> Result<&str, EtlError> {
        self.resolve(external)
            .ok_or_else(|| EtlError::Mapping(external.to_string()))
    }

    /// Add or replace an entry
    pub fn insert(&mut self, external: impl Into<String>, internal: impl Into<String>) {
        self.entries.insert(external.into(), internal.into());
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// External labels in `headers` that have no internal name
    pub fn unmapped<'a>(&self, headers: &'a [String]) -> Vec<&'a str> {
        headers
            .iter()
            .map(String::as_str)
            .filter(|h| self.resolve(h).is_none())
            .collect()
    }
}
