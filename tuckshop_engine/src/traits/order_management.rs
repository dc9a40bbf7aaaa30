use crate::{
    db_types::{Order, OrderItem, Payment},
    traits::PosDatabaseError,
};

/// Read-only queries over orders and payments. These never open a write transaction.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, PosDatabaseError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PosDatabaseError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, PosDatabaseError>;

    /// Every payment attempt recorded against the order, oldest first.
    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PosDatabaseError>;

    /// All orders placed by the given customer, newest first.
    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, PosDatabaseError>;
}
