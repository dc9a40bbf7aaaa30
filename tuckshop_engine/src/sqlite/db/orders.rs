use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;
use tuckshop_common::Cents;

use crate::db_types::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};

/// Inserts a new order row in its initial state: `Pending` fulfilment, `Pending` payment, no redemption code yet.
/// This is not atomic on its own. Embed this call inside a transaction and pass `&mut *tx` as the connection
/// argument; the redemption code is minted from the returned id and stored before the transaction commits.
pub(crate) async fn insert_order(
    customer_id: &str,
    payment_method: PaymentMethod,
    total: Cents,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (customer_id, total_amount, payment_method)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(customer_id)
    .bind(total.value())
    .bind(payment_method.to_string())
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order inserted for customer [{customer_id}] with total {total}");
    Ok(order)
}

pub(crate) async fn insert_order_item(
    order_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: Cents,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, sqlx::Error> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price.value())
    .fetch_one(conn)
    .await?;
    Ok(item)
}

/// Stores the signed redemption code on the order row. Called exactly once per order, inside the creation
/// transaction, as soon as the autoincrement id is known.
pub(crate) async fn set_redemption_code(
    order_id: i64,
    code: &str,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET redemption_code = $1, redemption_expires_at = $2, updated_at = CURRENT_TIMESTAMP WHERE \
         id = $3 RETURNING *",
    )
    .bind(code)
    .bind(expires_at)
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn fetch_orders_for_customer(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(customer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Moves an unpaid order to its settled state in one guarded statement. The `payment_status = 'Pending'` predicate
/// makes settlement race-proof: of two concurrent attempts, exactly one gets the row back and the other gets
/// `None`.
pub(crate) async fn settle_order_if_unpaid(
    order_id: i64,
    payment_status: PaymentStatus,
    status: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET payment_status = $1, status = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND payment_status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(payment_status.to_string())
    .bind(status.to_string())
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Completes a paid order at pickup, guarded the same way as settlement: only a paid order still in `Processing`
/// or `Ready` state matches, so a code presented twice completes the order exactly once.
pub(crate) async fn complete_order_for_pickup(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Completed', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND payment_status = 'Completed' AND status IN ('Processing', 'Ready')
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Unpaid cash orders whose redemption window lapsed before `now`. Mobile-money orders are excluded: their
/// settlement is the gateway's verdict or an operator decision, never the clock. The candidates are cancelled one
/// by one afterwards, each under its own settlement guard, so reading them here without a lock is safe.
pub(crate) async fn fetch_expired_unpaid(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE payment_status = 'Pending' AND status = 'Pending'
              AND payment_method = 'Cash'
              AND redemption_expires_at IS NOT NULL
              AND unixepoch(redemption_expires_at) < unixepoch($1)
            ORDER BY id ASC;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
