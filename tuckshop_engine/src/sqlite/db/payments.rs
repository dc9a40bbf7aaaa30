use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewPayment, Payment, SettlementStatus};

pub(crate) async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, sqlx::Error> {
    let inserted: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, amount, method, txid, phone, status, detail)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.amount.value())
    .bind(payment.method.to_string())
    .bind(payment.txid)
    .bind(payment.phone)
    .bind(payment.status.to_string())
    .bind(payment.detail)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Payment {} recorded against order {} as {}", inserted.id, inserted.order_id, inserted.status);
    Ok(inserted)
}

pub async fn fetch_payment_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payments_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

/// Applies a settlement verdict to a payment that is still pending. Returns `None` when the payment has already
/// been settled, so a verdict can never overwrite an earlier one.
pub(crate) async fn settle_payment_if_pending(
    payment_id: i64,
    status: SettlementStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET status = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(status.to_string())
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}
