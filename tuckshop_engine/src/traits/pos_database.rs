use chrono::{DateTime, Utc};
use thiserror::Error;
use tuckshop_common::Cents;

use crate::{
    db_types::{NewOrder, Order, OrderStatus, Payment, PaymentMethod, SettlementStatus},
    helpers::RedemptionCodes,
    traits::{
        data_objects::{NewOrderResult, SettledPayment, StockCorrection, StockMismatch},
        InventoryError,
        InventoryManagement,
        OrderManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the point-of-sale engine.
///
/// Each method here is one complete business flow, executed as a single atomic transaction:
/// * Order creation, including stock commitment and redemption-code minting
/// * Payment settlement for both the instant and the deferred method
/// * Order pickup against a verified redemption code
/// * The expiry and reconciliation sweeps
#[allow(async_fn_in_trait)]
pub trait PosDatabase: Clone + InventoryManagement + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Takes a new order, and in a single atomic transaction:
    /// * validates every line item against the live catalogue and prices the order from the stored product prices,
    /// * commits stock for every item: a deduction for instant-pay orders, a reservation for deferred-pay orders.
    ///   If any single item has insufficient stock the whole transaction rolls back and nothing is recorded.
    /// * inserts the order and its items,
    /// * mints the signed redemption code for the new order id and stores it on the order row.
    ///
    /// Returns the stored order, its items and the post-transaction stock levels of the products involved.
    async fn create_order(&self, order: NewOrder, codes: &RedemptionCodes) -> Result<NewOrderResult, PosDatabaseError>;

    /// Records a mobile-money charge that the gateway has accepted but not yet settled. The order must be an unpaid
    /// mobile-money order. Returns the stored payment row, in `Pending` settlement state.
    async fn insert_mobile_payment(&self, order_id: i64, txid: String, phone: String)
        -> Result<Payment, PosDatabaseError>;

    /// Applies a gateway verdict to a pending mobile-money payment, in a single atomic transaction.
    ///
    /// * `Completed`: the payment row is settled, and the order moves to `Processing` with payment status
    ///   `Completed`. Stock was already deducted at order time, so none moves here.
    /// * `Failed`: the payment row is failed, and the order is cancelled with payment status `Failed`. Stock is
    ///   **not** restored automatically; the deduction stands until an operator processes a return.
    /// * `Pending`: the gateway has not decided yet. Nothing is changed and `None` is returned.
    ///
    /// Returns an error if the payment's order is no longer unpaid.
    async fn settle_mobile_payment(
        &self,
        payment_id: i64,
        verdict: SettlementStatus,
    ) -> Result<Option<SettledPayment>, PosDatabaseError>;

    /// Takes a cash payment at the counter, in a single atomic transaction:
    /// * the order must be an unpaid cash order, and `tendered` must cover its total,
    /// * every reservation held for the order is confirmed into a sale, deducting the reserved stock,
    /// * a settled payment row is written for the order total, with any change due recorded in its detail field,
    /// * the order moves to `Processing` with payment status `Completed`.
    ///
    /// Returns the updated order, the payment row and the post-transaction stock levels.
    async fn process_cash_payment(&self, order_id: i64, tendered: Cents) -> Result<SettledPayment, PosDatabaseError>;

    /// Marks a paid order as collected. The order must be paid and in `Processing` or `Ready` state; it moves to
    /// `Completed`. Signature and expiry checks on the presented code happen before this call, in the API layer.
    async fn redeem_order(&self, order_id: i64) -> Result<Order, PosDatabaseError>;

    /// Cancels every unpaid cash order whose redemption window lapsed before `now`. Mobile-money orders are left
    /// alone; they are resolved by a gateway verdict or an operator, never by the clock.
    ///
    /// Each order is handled in its own transaction: the order is cancelled with payment status `Failed`, a failed
    /// payment row is written for its total, and its reservation ledger entries are deleted. An order that settles
    /// concurrently is skipped. Returns the orders that were cancelled.
    async fn expire_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, PosDatabaseError>;

    /// Finds products whose cached stock counter has drifted below zero, clamps each back to zero and writes a
    /// compensating `Adjustment` ledger entry. Returns one correction per repaired product.
    async fn clamp_negative_stock(&self) -> Result<Vec<StockCorrection>, PosDatabaseError>;

    /// Deletes reservation ledger rows older than `cutoff` whose orders are closed. Live reservations for open
    /// orders are never touched. Returns the number of rows removed.
    async fn purge_stale_reservations(&self, cutoff: DateTime<Utc>) -> Result<u64, PosDatabaseError>;

    /// Compares every product's cached stock counter against the value derived from its ledger entries. Returns the
    /// products where the two disagree. Report-only: repairs are an operator decision.
    async fn audit_stock_cache(&self) -> Result<Vec<StockMismatch>, PosDatabaseError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PosDatabaseError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PosDatabaseError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("{0}")]
    InventoryError(#[from] InventoryError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(i64),
    #[error("Order {order_id} is a {actual} order; it cannot take a {attempted} payment")]
    WrongPaymentMethod { order_id: i64, actual: PaymentMethod, attempted: PaymentMethod },
    #[error("The payment for order {0} has already been processed")]
    AlreadyProcessed(i64),
    #[error("Order {order_id} needs {required}, but only {received} was tendered")]
    InsufficientAmount { order_id: i64, received: Cents, required: Cents },
    #[error("Order {0} has not been paid for")]
    OrderNotPaid(i64),
    #[error("Order {order_id} is {status} and cannot be changed")]
    OrderClosed { order_id: i64, status: OrderStatus },
}

impl From<sqlx::Error> for PosDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        PosDatabaseError::DatabaseError(e.to_string())
    }
}
