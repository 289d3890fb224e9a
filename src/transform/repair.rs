//! Missing review-rating imputation

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ImputationStrategy;
use crate::error::EtlResult;
use crate::store::{Cell, Store};

const COUNT_MISSING: &str = "SELECT COUNT(*) FROM purchases WHERE review_rating IS NULL";
const GLOBAL_MEAN: &str =
    "SELECT AVG(review_rating) FROM purchases WHERE review_rating IS NOT NULL";
const FILL_GLOBAL: &str = "UPDATE purchases SET review_rating = $1 WHERE review_rating IS NULL";
const FILL_PER_ITEM: &str = "UPDATE purchases SET review_rating = (
        SELECT AVG(q.review_rating) FROM purchases q
        WHERE q.item_purchased = purchases.item_purchased
          AND q.review_rating IS NOT NULL
    )
    WHERE review_rating IS NULL";

/// Statistics from a repair pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairStats {
    /// Number of ratings filled in
    pub filled: u64,
    /// Mean of the ratings that were present before the pass
    pub mean: Option<f64>,
}

/// Fill every missing review rating in `purchases`
///
/// The global mean is taken over ratings that are present before the pass,
/// so filled values never feed back into it. When no rating is present at
/// all nothing is changed.
pub fn repair_review_ratings(
    store: &dyn Store,
    strategy: ImputationStrategy,
) -> EtlResult<RepairStats> {
    let missing_before = store.query_i64(COUNT_MISSING, &[])?;
    let mean = store.query_f64(GLOBAL_MEAN, &[])?;

    let Some(global) = mean else {
        if missing_before > 0 {
            warn!(missing = missing_before, "No review ratings to average, nothing filled");
        }
        return Ok(RepairStats { filled: 0, mean });
    };

    if missing_before == 0 {
        return Ok(RepairStats { filled: 0, mean });
    }

    if strategy == ImputationStrategy::PerItemMean {
        store.execute(FILL_PER_ITEM, &[])?;
    }
    store.execute(FILL_GLOBAL, &[Cell::Float(Some(global))])?;

    let missing_after = store.query_i64(COUNT_MISSING, &[])?;
    let filled = (missing_before - missing_after).max(0) as u64;

    info!(strategy = %strategy, filled, mean = global, "Repaired review ratings");
    Ok(RepairStats { filled, mean })
}
