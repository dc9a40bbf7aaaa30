use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{NewOrder, Order, Product},
    events::{EventProducers, LowStockEvent, OrderCreatedEvent},
    helpers::RedemptionCodes,
    pos_api::{errors::OrderFlowError, order_objects::PlacedOrder},
    traits::{NewOrderResult, PosDatabase},
};

/// `OrderFlowApi` is the primary API for placing orders and redeeming pickup codes.
///
/// Placing an order commits the stock for it in the same database transaction that records the order, so a result
/// from [`Self::create_order`] means the customer's items are held for them, not merely requested.
pub struct OrderFlowApi<B> {
    db: B,
    codes: RedemptionCodes,
    low_stock_threshold: i64,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, codes: RedemptionCodes, low_stock_threshold: i64, producers: EventProducers) -> Self {
        Self { db, codes, low_stock_threshold, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: PosDatabase
{
    /// Submit a new order.
    ///
    /// The order total is computed from current catalogue prices, never from the caller. For mobile-money orders the
    /// stock counters are decremented immediately; for cash orders the stock is held as ledger reservations until the
    /// customer pays at the counter or the hold lapses. Either way the returned order carries a signed redemption
    /// code for pickup.
    ///
    /// The whole operation is atomic. If any item cannot be supplied, no order, item, payment or ledger row is
    /// written.
    pub async fn create_order(&self, order: NewOrder) -> Result<NewOrderResult, OrderFlowError> {
        if order.items.is_empty() {
            return Err(OrderFlowError::EmptyOrder);
        }
        if let Some(item) = order.items.iter().find(|i| i.quantity <= 0) {
            return Err(OrderFlowError::InvalidQuantity { product_id: item.product_id, quantity: item.quantity });
        }
        let result = self.db.create_order(order, &self.codes).await?;
        self.call_order_created_hook(&result.order).await;
        self.call_low_stock_hook(&result.stock_after).await;
        debug!(
            "🔄️📦️ Order #{} processing complete. {} items reserved for customer [{}], {} due on {}",
            result.order.id,
            result.item_count(),
            result.order.customer_id,
            result.order.total_amount,
            result.order.payment_method,
        );
        Ok(result)
    }

    /// Redeem a signed pickup code presented at the counter.
    ///
    /// The signature and expiry of `payload` are checked before the database is consulted at all, so forged or
    /// doctored codes are rejected without leaking whether the order they name exists. A valid code moves the order
    /// to `Completed` exactly once.
    pub async fn redeem_order(&self, payload: &str) -> Result<Order, OrderFlowError> {
        let claims = self.codes.verify(payload, Utc::now())?;
        trace!("🔄️🎫️ Verified redemption code for order #{}", claims.order_id);
        let order = self.db.redeem_order(claims.order_id).await?;
        debug!("🔄️🎫️ Order #{} handed over and completed", order.id);
        Ok(order)
    }

    /// Fetches an order by id, or `None` if it does not exist.
    pub async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?;
        Ok(order)
    }

    /// Fetches an order together with its line items, or `None` if it does not exist.
    pub async fn order_with_items(&self, order_id: i64) -> Result<Option<PlacedOrder>, OrderFlowError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            return Ok(None);
        };
        let items = self.db.fetch_order_items(order_id).await?;
        Ok(Some(PlacedOrder::new(order, items)))
    }

    /// Fetches all orders placed by the given customer, newest first.
    pub async fn orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, OrderFlowError> {
        let orders = self.db.fetch_orders_for_customer(customer_id).await?;
        Ok(orders)
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            debug!("🔄️📦️ Notifying order created hook subscribers");
            let event = OrderCreatedEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_low_stock_hook(&self, stock_after: &[Product]) {
        for emitter in &self.producers.low_stock_producer {
            for product in stock_after.iter().filter(|p| p.is_low_stock(self.low_stock_threshold)) {
                debug!("🔄️📉️ Product #{} is low on stock ({} left)", product.id, product.stock_quantity);
                let event = LowStockEvent::new(product.clone(), self.low_stock_threshold);
                emitter.publish_event(event).await;
            }
        }
    }
}
