use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Payment, Product};

/// Fired once an order and its stock commitment have been durably recorded. Typical hooks print a pickup slip or
/// send the redemption QR to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Fired when a payment reaches a terminal settlement state, successful or not. The payment's status field says
/// which.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResolvedEvent {
    pub order: Order,
    pub payment: Payment,
}

impl PaymentResolvedEvent {
    pub fn new(order: Order, payment: Payment) -> Self {
        Self { order, payment }
    }
}

/// Fired by the expiry sweep for each order it cancels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpiredEvent {
    pub order: Order,
}

impl OrderExpiredEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Fired when a stock movement leaves a product at or below the configured threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEvent {
    pub product: Product,
    pub threshold: i64,
}

impl LowStockEvent {
    pub fn new(product: Product, threshold: i64) -> Self {
        Self { product, threshold }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    PaymentResolved(PaymentResolvedEvent),
    OrderExpired(OrderExpiredEvent),
    LowStock(LowStockEvent),
}
