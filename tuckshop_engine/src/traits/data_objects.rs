use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db_types::{Order, OrderItem, Payment, Product};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderResult {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// The products touched by the order, with their stock counters as they stand after the transaction.
    pub stock_after: Vec<Product>,
}

impl NewOrderResult {
    pub fn new(order: Order, items: Vec<OrderItem>, stock_after: Vec<Product>) -> Self {
        Self { order, items, stock_after }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// The signed pickup payload minted inside the creation transaction.
    ///
    /// Only call this on a result returned from `create_order`, where the code is always present.
    ///
    /// Panics if the order carries no redemption code.
    pub fn redemption_code(&self) -> &str {
        self.order.redemption_code.as_deref().expect("create_order always assigns a redemption code")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledPayment {
    pub order: Order,
    pub payment: Payment,
    /// Products whose stock moved as part of the settlement. Empty for instant-pay orders, whose stock was already
    /// deducted at order time.
    pub stock_after: Vec<Product>,
}

impl SettledPayment {
    pub fn new(order: Order, payment: Payment, stock_after: Vec<Product>) -> Self {
        Self { order, payment, stock_after }
    }
}

impl Display for SettledPayment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Payment {} of {} settled {} against order {}.",
            self.payment.id, self.payment.amount, self.payment.status, self.order.id
        )
    }
}

/// A product whose cached stock counter was found below zero and clamped back to zero by the reconciliation
/// sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCorrection {
    pub product_id: i64,
    /// How far below zero the counter had drifted. Always positive.
    pub deficit: i64,
}

/// A product whose cached stock counter disagrees with the ledger-derived value. Reported, never auto-repaired.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockMismatch {
    pub product_id: i64,
    pub cached: i64,
    pub derived: i64,
}

impl Display for StockMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Product {}: cached stock {} but ledger says {}.", self.product_id, self.cached, self.derived)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub corrections: Vec<StockCorrection>,
    pub purged_reservations: u64,
    pub mismatches: Vec<StockMismatch>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty() && self.purged_reservations == 0 && self.mismatches.is_empty()
    }
}

impl Display for ReconciliationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} negative counters clamped, {} stale reservations purged, {} cache mismatches found.",
            self.corrections.len(),
            self.purged_reservations,
            self.mismatches.len()
        )
    }
}
