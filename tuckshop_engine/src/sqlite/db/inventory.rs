use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{InventoryLogEntry, LedgerReason},
    traits::StockMismatch,
};

/// Appends one row to the stock ledger. The ledger is append-only: nothing ever updates or deletes these rows,
/// with the single exception of `Reservation` entries, which [`confirm_reservations_for_order`] rewrites and
/// [`release_reservations_for_order`] deletes.
pub(crate) async fn append_entry(
    product_id: i64,
    quantity_change: i64,
    reason: LedgerReason,
    reference_id: Option<i64>,
    note: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<InventoryLogEntry, sqlx::Error> {
    let entry: InventoryLogEntry = sqlx::query_as(
        r#"
            INSERT INTO inventory_log (product_id, quantity_change, reason, reference_id, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(product_id)
    .bind(quantity_change)
    .bind(reason.to_string())
    .bind(reference_id)
    .bind(note)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Ledger entry {}: product {product_id} {quantity_change:+} ({reason})", entry.id);
    Ok(entry)
}

/// Holds `quantity` units of a product against an unpaid order. The hold is ledger-only: the cached stock counter
/// is untouched until the reservation is confirmed into a sale.
pub(crate) async fn reserve_stock(
    order_id: i64,
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<InventoryLogEntry, sqlx::Error> {
    append_entry(product_id, -quantity, LedgerReason::Reservation, Some(order_id), None, conn).await
}

/// Rewrites an order's reservation entries into sales: the deferred stock-commit point for cash orders. Returns
/// the rewritten entries. Zero matching entries is not an error; instant-pay orders never had any.
pub(crate) async fn confirm_reservations_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryLogEntry>, sqlx::Error> {
    let entries = sqlx::query_as(
        r#"
            UPDATE inventory_log SET reason = 'Sale'
            WHERE reference_id = $1 AND reason = 'Reservation'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

/// Drops an order's reservation entries without any stock movement, as when the order expires unpaid. Returns the
/// number of entries deleted.
pub(crate) async fn release_reservations_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM inventory_log WHERE reference_id = $1 AND reason = 'Reservation'")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes reservation entries older than `cutoff` whose orders have closed. A live reservation always belongs to
/// an open order, so the closed-order predicate keeps this purge from eating a hold the expiry sweep has not
/// resolved yet.
pub(crate) async fn purge_reservations_before(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            DELETE FROM inventory_log
            WHERE reason = 'Reservation'
              AND unixepoch(created_at) < unixepoch($1)
              AND reference_id IN (SELECT id FROM orders WHERE status IN ('Completed', 'Cancelled'));
        "#,
    )
    .bind(cutoff)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn history(
    product_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryLogEntry>, sqlx::Error> {
    let entries = sqlx::query_as(
        "SELECT * FROM inventory_log WHERE product_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
    )
    .bind(product_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

/// The stock level a product's ledger implies: the signed sum of its entries, reservations excluded.
pub(crate) async fn derived_stock(product_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let sum: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity_change), 0) FROM inventory_log WHERE product_id = $1 AND reason != \
         'Reservation'",
    )
    .bind(product_id)
    .fetch_one(conn)
    .await?;
    Ok(sum)
}

/// Every product whose cached stock counter disagrees with its ledger-derived value.
pub(crate) async fn stock_mismatches(conn: &mut SqliteConnection) -> Result<Vec<StockMismatch>, sqlx::Error> {
    let mismatches = sqlx::query_as(
        r#"
            SELECT
                p.id AS product_id,
                p.stock_quantity AS cached,
                COALESCE(SUM(CASE WHEN l.reason != 'Reservation' THEN l.quantity_change ELSE 0 END), 0) AS derived
            FROM products p LEFT JOIN inventory_log l ON l.product_id = p.id
            GROUP BY p.id, p.stock_quantity
            HAVING cached != derived
            ORDER BY p.id ASC;
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(mismatches)
}
