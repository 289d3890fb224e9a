//! Yes/no text to canonical boolean text
//!
//! The flag columns stay text-typed and hold `'true'` / `'false'` after a
//! pass. A pass cannot tell its own output from source text, so a source
//! value of exactly `true` is treated as already normalized and stays true.
//! Every other source value except `Yes` becomes `'false'`.

use tracing::info;

use crate::error::{EtlError, EtlResult};
use crate::schema::validate_identifier;
use crate::store::Store;

/// Staging columns holding yes/no flags
pub const BOOLEAN_TEXT_COLUMNS: [&str; 3] =
    ["subscription_status", "discount_applied", "promo_code_used"];

/// Rewrite the yes/no staging columns as `'true'` / `'false'`
///
/// Only `Yes` (or an already normalized `true`) maps to `'true'`; anything
/// else, NULL included, maps to `'false'`. The columns keep their text type,
/// so running this again leaves the table unchanged.
pub fn normalize_boolean_columns(store: &dyn Store, table: &str) -> EtlResult<u64> {
    validate_identifier(table).map_err(EtlError::InvalidConfig)?;

    let assignments: Vec<String> = BOOLEAN_TEXT_COLUMNS
        .iter()
        .map(|c| format!("{c} = CASE WHEN {c} IN ('Yes', 'true') THEN 'true' ELSE 'false' END"))
        .collect();
    let sql = format!("UPDATE {table} SET {}", assignments.join(", "));

    let updated = store.execute(&sql, &[])?;
    info!(table, rows = updated, "Normalized boolean columns");
    Ok(updated)
}
