use serde::{Deserialize, Serialize};
use tuckshop_common::Cents;

use crate::db_types::{Order, OrderItem};

/// An order together with its line items, as returned by [`crate::OrderFlowApi::order_with_items`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl PlacedOrder {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }

    /// The number of distinct line items on the order.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// The total number of units across all line items.
    pub fn unit_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Re-sums the line items. Always equals `order.total_amount`, since the total is computed from the same rows at
    /// creation time and items are never edited afterwards.
    pub fn line_total(&self) -> Cents {
        self.items.iter().map(|i| i.unit_price * i.quantity).sum()
    }
}
