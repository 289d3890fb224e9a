//! Derivation of the normalized customers / products / purchases tables

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::NormalizationMode;
use crate::error::{EtlError, EtlResult};
use crate::schema::validate_identifier;
use crate::store::Store;

pub const CUSTOMERS_TABLE: &str = "customers";
pub const PRODUCTS_TABLE: &str = "products";
pub const PURCHASES_TABLE: &str = "purchases";

const CREATE_CUSTOMERS: &str = "CREATE TABLE IF NOT EXISTS customers (
    customer_id BIGINT PRIMARY KEY,
    age BIGINT,
    gender VARCHAR,
    subscription_status BOOLEAN
)";

const CREATE_PRODUCTS: &str = "CREATE TABLE IF NOT EXISTS products (
    item_purchased VARCHAR,
    category VARCHAR,
    size VARCHAR,
    color VARCHAR,
    season VARCHAR
)";

const CREATE_PURCHASES: &str = "CREATE TABLE IF NOT EXISTS purchases (
    customer_id BIGINT NOT NULL,
    item_purchased VARCHAR NOT NULL,
    purchase_amount DOUBLE PRECISION,
    location VARCHAR,
    review_rating DOUBLE PRECISION,
    PRIMARY KEY (customer_id, item_purchased)
)";

/// Result of a normalization call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOutcome {
    /// Whether this call created the derived tables
    pub created: bool,
    /// Whether staging was merged into the derived tables
    pub merged: bool,
    pub customers: i64,
    pub products: i64,
    pub purchases: i64,
}

/// Derive the normalized tables from staging
///
/// The tables are created at most once per database, guarded by the
/// existence of `customers`. Creation also indexes staging's `customer_id`
/// and populates the new tables. Later calls merge staging into the tables
/// in [`NormalizationMode::Merge`] and do nothing in
/// [`NormalizationMode::Snapshot`]. A merge upserts current staging rows and
/// deletes derived rows that no longer have a staging source.
pub fn normalize_schema(
    store: &dyn Store,
    staging_table: &str,
    mode: NormalizationMode,
) -> EtlResult<NormalizeOutcome> {
    validate_identifier(staging_table).map_err(EtlError::InvalidConfig)?;

    let mut outcome = NormalizeOutcome::default();

    if store.table_exists(CUSTOMERS_TABLE)? {
        debug!(mode = %mode, "Normalized tables already exist");
        if mode == NormalizationMode::Merge {
            merge_from_staging(store, staging_table)?;
            outcome.merged = true;
        }
    } else {
        info!(staging = staging_table, "Creating normalized tables");
        store.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{staging_table}_customer_id \
             ON {staging_table} (customer_id)"
        ))?;
        for ddl in [CREATE_CUSTOMERS, CREATE_PRODUCTS, CREATE_PURCHASES] {
            store.execute_batch(ddl)?;
        }
        merge_from_staging(store, staging_table)?;
        outcome.created = true;
        outcome.merged = true;
    }

    outcome.customers = store.count_rows(CUSTOMERS_TABLE)?;
    outcome.products = store.count_rows(PRODUCTS_TABLE)?;
    outcome.purchases = store.count_rows(PURCHASES_TABLE)?;

    info!(
        created = outcome.created,
        merged = outcome.merged,
        customers = outcome.customers,
        products = outcome.products,
        purchases = outcome.purchases,
        "Normalization complete"
    );

    Ok(outcome)
}

fn merge_from_staging(store: &dyn Store, staging: &str) -> EtlResult<()> {
    let customers = store.execute(
        &format!(
            "INSERT INTO customers (customer_id, age, gender, subscription_status)
             SELECT DISTINCT customer_id, age, gender, subscription_status IN ('Yes', 'true')
             FROM {staging}
             ON CONFLICT (customer_id) DO UPDATE SET
                 age = EXCLUDED.age,
                 gender = EXCLUDED.gender,
                 subscription_status = EXCLUDED.subscription_status"
        ),
        &[],
    )?;

    let products = store.execute(
        &format!(
            "INSERT INTO products (item_purchased, category, size, color, season)
             SELECT DISTINCT s.item_purchased, s.category, s.size, s.color, s.season
             FROM {staging} s
             WHERE NOT EXISTS (
                 SELECT 1 FROM products p
                 WHERE p.item_purchased IS NOT DISTINCT FROM s.item_purchased
                   AND p.category IS NOT DISTINCT FROM s.category
                   AND p.size IS NOT DISTINCT FROM s.size
                   AND p.color IS NOT DISTINCT FROM s.color
                   AND p.season IS NOT DISTINCT FROM s.season
             )"
        ),
        &[],
    )?;

    let purchases = store.execute(
        &format!(
            "INSERT INTO purchases (customer_id, item_purchased, purchase_amount, location, review_rating)
             SELECT customer_id, item_purchased, purchase_amount, location, review_rating
             FROM {staging}
             WHERE item_purchased IS NOT NULL
             ON CONFLICT (customer_id, item_purchased) DO UPDATE SET
                 purchase_amount = EXCLUDED.purchase_amount,
                 location = EXCLUDED.location,
                 review_rating = EXCLUDED.review_rating"
        ),
        &[],
    )?;

    // Rows whose staging source changed or disappeared
    let stale_purchases = store.execute(
        &format!(
            "DELETE FROM purchases
             WHERE NOT EXISTS (
                 SELECT 1 FROM {staging} s
                 WHERE s.customer_id = purchases.customer_id
                   AND s.item_purchased = purchases.item_purchased
             )"
        ),
        &[],
    )?;

    let stale_products = store.execute(
        &format!(
            "DELETE FROM products
             WHERE NOT EXISTS (
                 SELECT 1 FROM {staging} s
                 WHERE s.item_purchased IS NOT DISTINCT FROM products.item_purchased
                   AND s.category IS NOT DISTINCT FROM products.category
                   AND s.size IS NOT DISTINCT FROM products.size
                   AND s.color IS NOT DISTINCT FROM products.color
                   AND s.season IS NOT DISTINCT FROM products.season
             )"
        ),
        &[],
    )?;

    let stale_customers = store.execute(
        &format!(
            "DELETE FROM customers
             WHERE NOT EXISTS (
                 SELECT 1 FROM {staging} s WHERE s.customer_id = customers.customer_id
             )"
        ),
        &[],
    )?;

    debug!(
        customers,
        products,
        purchases,
        stale_customers,
        stale_products,
        stale_purchases,
        "Merged staging into normalized tables"
    );
    Ok(())
}
