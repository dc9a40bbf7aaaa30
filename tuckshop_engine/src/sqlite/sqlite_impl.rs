//! `SqliteDatabase` is a concrete implementation of a point-of-sale engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tuckshop_common::Cents;

use super::db::{db_url, inventory, new_pool, orders, payments, products};
use crate::{
    db_types::{
        InventoryLogEntry,
        LedgerReason,
        NewOrder,
        NewPayment,
        NewProduct,
        Order,
        OrderItem,
        OrderStatus,
        Payment,
        PaymentMethod,
        PaymentStatus,
        Product,
        ProductUpdate,
        SettlementStatus,
        StockAdjustment,
    },
    helpers::RedemptionCodes,
    traits::{
        InventoryError,
        InventoryManagement,
        NewOrderResult,
        OrderManagement,
        PosDatabase,
        PosDatabaseError,
        SettledPayment,
        StockCorrection,
        StockMismatch,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

/// Converts an order's reservation entries into sales, decrementing the cached counter for each one under the
/// same floor guard as a direct sale. Zero entries is fine; instant-pay orders never reserved anything. An order
/// that was overbooked against the shelf fails here with `InsufficientStock` and the enclosing transaction rolls
/// back.
async fn confirm_order_reservations(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Product>, PosDatabaseError> {
    let entries = inventory::confirm_reservations_for_order(order_id, &mut *conn).await?;
    let mut stock_after = Vec::with_capacity(entries.len());
    for entry in entries {
        // Reservation entries hold the quantity negated
        let quantity = -entry.quantity_change;
        match products::guarded_decrement(entry.product_id, quantity, &mut *conn).await? {
            Some(product) => stock_after.push(product),
            None => {
                let available = products::fetch_product_by_id(entry.product_id, &mut *conn)
                    .await?
                    .map(|p| p.stock_quantity)
                    .unwrap_or_default();
                return Err(InventoryError::InsufficientStock {
                    product_id: entry.product_id,
                    requested: quantity,
                    available,
                }
                .into());
            },
        }
    }
    Ok(stock_after)
}

impl PosDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(&self, order: NewOrder, codes: &RedemptionCodes) -> Result<NewOrderResult, PosDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut priced = Vec::with_capacity(order.items.len());
        let mut total = Cents::from(0);
        for item in &order.items {
            let product = products::fetch_product_by_id(item.product_id, &mut tx)
                .await?
                .ok_or(InventoryError::ProductNotFound(item.product_id))?;
            if !product.is_active {
                return Err(InventoryError::ProductInactive(product.id).into());
            }
            total = total + product.price * item.quantity;
            priced.push((*item, product));
        }
        let stored = orders::insert_order(&order.customer_id, order.payment_method, total, &mut tx).await?;
        let mut items = Vec::with_capacity(priced.len());
        for (item, product) in &priced {
            let row = orders::insert_order_item(stored.id, item.product_id, item.quantity, product.price, &mut tx)
                .await?;
            items.push(row);
            if order.payment_method.is_instant() {
                let updated = products::guarded_decrement(item.product_id, item.quantity, &mut tx).await?;
                if updated.is_none() {
                    return Err(InventoryError::InsufficientStock {
                        product_id: item.product_id,
                        requested: item.quantity,
                        available: product.stock_quantity,
                    }
                    .into());
                }
                inventory::append_entry(
                    item.product_id,
                    -item.quantity,
                    LedgerReason::Sale,
                    Some(stored.id),
                    None,
                    &mut tx,
                )
                .await?;
            } else {
                inventory::reserve_stock(stored.id, item.product_id, item.quantity, &mut tx).await?;
            }
        }
        let code = codes.issue(stored.id, order.payment_method, Utc::now());
        let stored = orders::set_redemption_code(stored.id, code.as_json().as_str(), code.expires_at(), &mut tx)
            .await?;
        let product_ids = items.iter().map(|i| i.product_id).collect::<Vec<i64>>();
        let stock_after = products::fetch_products_by_ids(&product_ids, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order {} ({}) created for customer [{}] with {} item(s), totalling {total}",
            stored.id,
            stored.payment_method,
            stored.customer_id,
            items.len()
        );
        Ok(NewOrderResult::new(stored, items, stock_after))
    }

    async fn insert_mobile_payment(
        &self,
        order_id: i64,
        txid: String,
        phone: String,
    ) -> Result<Payment, PosDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or(PosDatabaseError::OrderNotFound(order_id))?;
        if order.payment_method != PaymentMethod::MobileMoney {
            return Err(PosDatabaseError::WrongPaymentMethod {
                order_id,
                actual: order.payment_method,
                attempted: PaymentMethod::MobileMoney,
            });
        }
        if !order.payment_status.is_pending() {
            return Err(closed_or_processed(&order));
        }
        let payment = payments::insert_payment(
            NewPayment::pending_mobile(order_id, order.total_amount, txid, phone),
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn settle_mobile_payment(
        &self,
        payment_id: i64,
        verdict: SettlementStatus,
    ) -> Result<Option<SettledPayment>, PosDatabaseError> {
        use SettlementStatus::*;
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_payment_by_id(payment_id, &mut tx)
            .await?
            .ok_or(PosDatabaseError::PaymentNotFound(payment_id))?;
        if payment.status != Pending {
            return Err(PosDatabaseError::AlreadyProcessed(payment.order_id));
        }
        if verdict == Pending {
            debug!("🗃️ The gateway has not settled payment {payment_id} yet. No action to take");
            return Ok(None);
        }
        let settled = payments::settle_payment_if_pending(payment_id, verdict, &mut tx)
            .await?
            .ok_or(PosDatabaseError::AlreadyProcessed(payment.order_id))?;
        let (payment_status, order_status) = match verdict {
            Completed => (PaymentStatus::Completed, OrderStatus::Processing),
            Failed => (PaymentStatus::Failed, OrderStatus::Cancelled),
            Pending => unreachable!(),
        };
        let order = orders::settle_order_if_unpaid(payment.order_id, payment_status, order_status, &mut tx)
            .await?
            .ok_or(PosDatabaseError::AlreadyProcessed(payment.order_id))?;
        let stock_after = match verdict {
            // Normalizes the commit path. Instant-pay orders hold no reservations, so this is a no-op for them.
            Completed => confirm_order_reservations(order.id, &mut tx).await?,
            // Stock deducted at order time is not restored on failure. Reversal is a manual return.
            _ => Vec::new(),
        };
        tx.commit().await?;
        debug!("🗃️ Payment {payment_id} is now {verdict}. Order {} is {}", order.id, order.status);
        Ok(Some(SettledPayment::new(order, settled, stock_after)))
    }

    async fn process_cash_payment(&self, order_id: i64, tendered: Cents) -> Result<SettledPayment, PosDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or(PosDatabaseError::OrderNotFound(order_id))?;
        if order.payment_method != PaymentMethod::Cash {
            return Err(PosDatabaseError::WrongPaymentMethod {
                order_id,
                actual: order.payment_method,
                attempted: PaymentMethod::Cash,
            });
        }
        if !order.payment_status.is_pending() {
            return Err(closed_or_processed(&order));
        }
        if tendered < order.total_amount {
            return Err(PosDatabaseError::InsufficientAmount {
                order_id,
                received: tendered,
                required: order.total_amount,
            });
        }
        let order = orders::settle_order_if_unpaid(order_id, PaymentStatus::Completed, OrderStatus::Processing, &mut tx)
            .await?
            .ok_or(PosDatabaseError::AlreadyProcessed(order_id))?;
        let stock_after = confirm_order_reservations(order_id, &mut tx).await?;
        let change = tendered - order.total_amount;
        let detail = json!({ "tendered": tendered, "change": change }).to_string();
        let payment = payments::insert_payment(
            NewPayment::completed_cash(order_id, order.total_amount, Some(detail)),
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!("🗃️ Cash payment of {tendered} taken for order {order_id}. Change due: {change}");
        Ok(SettledPayment::new(order, payment, stock_after))
    }

    async fn redeem_order(&self, order_id: i64) -> Result<Order, PosDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or(PosDatabaseError::OrderNotFound(order_id))?;
        match orders::complete_order_for_pickup(order_id, &mut tx).await? {
            Some(completed) => {
                tx.commit().await?;
                info!("🗃️ Order {order_id} collected by customer [{}]", completed.customer_id);
                Ok(completed)
            },
            None if order.payment_status != PaymentStatus::Completed => {
                Err(PosDatabaseError::OrderNotPaid(order_id))
            },
            None => Err(PosDatabaseError::OrderClosed { order_id, status: order.status }),
        }
    }

    async fn expire_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, PosDatabaseError> {
        let candidates = {
            let mut conn = self.pool.acquire().await?;
            orders::fetch_expired_unpaid(now, &mut conn).await?
        };
        let mut expired = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.expire_order(&candidate).await {
                Ok(Some(order)) => expired.push(order),
                Ok(None) => {},
                Err(e) => warn!("🗃️ Order {} could not be expired and was skipped: {e}", candidate.id),
            }
        }
        Ok(expired)
    }

    async fn clamp_negative_stock(&self) -> Result<Vec<StockCorrection>, PosDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let negatives = products::negative_stock_products(&mut tx).await?;
        let mut corrections = Vec::with_capacity(negatives.len());
        for product in negatives {
            let deficit = -product.stock_quantity;
            products::set_stock(product.id, 0, &mut tx)
                .await?
                .ok_or(InventoryError::ProductNotFound(product.id))?;
            inventory::append_entry(
                product.id,
                deficit,
                LedgerReason::Adjustment,
                None,
                Some("Automatic correction of negative inventory".to_string()),
                &mut tx,
            )
            .await?;
            warn!("🗃️ Product {} had a stock counter of {}. Clamped to zero", product.id, product.stock_quantity);
            corrections.push(StockCorrection { product_id: product.id, deficit });
        }
        tx.commit().await?;
        Ok(corrections)
    }

    async fn purge_stale_reservations(&self, cutoff: DateTime<Utc>) -> Result<u64, PosDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let purged = inventory::purge_reservations_before(cutoff, &mut conn).await?;
        if purged > 0 {
            warn!("🗃️ Purged {purged} stale reservation entries older than {cutoff}");
        }
        Ok(purged)
    }

    async fn audit_stock_cache(&self) -> Result<Vec<StockMismatch>, PosDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let mismatches = inventory::stock_mismatches(&mut conn).await?;
        Ok(mismatches)
    }

    async fn close(&mut self) -> Result<(), PosDatabaseError> {
        self.pool.close().await;
        Ok(())
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn add_product(&self, product: NewProduct, initial_stock: i64) -> Result<Product, InventoryError> {
        if initial_stock < 0 {
            return Err(InventoryError::InvalidQuantity(initial_stock));
        }
        let mut tx = self.pool.begin().await?;
        let mut stored = products::insert_product(product, &mut tx).await?;
        if initial_stock > 0 {
            inventory::append_entry(
                stored.id,
                initial_stock,
                LedgerReason::Restock,
                None,
                Some("Initial stock".to_string()),
                &mut tx,
            )
            .await?;
            stored = products::set_stock(stored.id, initial_stock, &mut tx)
                .await?
                .ok_or(InventoryError::ProductNotFound(stored.id))?;
        }
        tx.commit().await?;
        debug!("🗃️ Product [{}] added to the catalogue with id {}", stored.name, stored.id);
        Ok(stored)
    }

    async fn update_product(&self, product_id: i64, update: ProductUpdate) -> Result<Product, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::update_product(product_id, update, &mut conn)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product_by_id(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self, active_only: bool) -> Result<Vec<Product>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let result = products::fetch_products(active_only, &mut conn).await?;
        Ok(result)
    }

    async fn current_stock(&self, product_id: i64) -> Result<i64, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product_by_id(product_id, &mut conn)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;
        Ok(product.stock_quantity)
    }

    async fn derived_stock(&self, product_id: i64) -> Result<i64, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product_by_id(product_id, &mut conn)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;
        let derived = inventory::derived_stock(product_id, &mut conn).await?;
        Ok(derived)
    }

    async fn history(&self, product_id: i64, limit: i64) -> Result<Vec<InventoryLogEntry>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product_by_id(product_id, &mut conn)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;
        let entries = inventory::history(product_id, limit, &mut conn).await?;
        Ok(entries)
    }

    async fn set_stock_level(&self, adjustment: StockAdjustment) -> Result<Product, InventoryError> {
        if adjustment.new_quantity < 0 {
            return Err(InventoryError::InvalidQuantity(adjustment.new_quantity));
        }
        let mut tx = self.pool.begin().await?;
        let product = products::fetch_product_by_id(adjustment.product_id, &mut tx)
            .await?
            .ok_or(InventoryError::ProductNotFound(adjustment.product_id))?;
        let delta = adjustment.new_quantity - product.stock_quantity;
        if delta == 0 {
            return Err(InventoryError::StockUnchanged(adjustment.product_id));
        }
        let updated = products::set_stock(adjustment.product_id, adjustment.new_quantity, &mut tx)
            .await?
            .ok_or(InventoryError::ProductNotFound(adjustment.product_id))?;
        let note = adjustment.note.or_else(|| Some("Manual stock adjustment".to_string()));
        inventory::append_entry(adjustment.product_id, delta, LedgerReason::Adjustment, None, note, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Product {} stock adjusted from {} to {} ({delta:+})",
            updated.id, product.stock_quantity, updated.stock_quantity
        );
        Ok(updated)
    }

    async fn restock(&self, product_id: i64, quantity: i64, note: Option<String>) -> Result<Product, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        let mut tx = self.pool.begin().await?;
        let updated = products::increment_stock(product_id, quantity, &mut tx)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;
        inventory::append_entry(product_id, quantity, LedgerReason::Restock, None, note, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Product {product_id} restocked with {quantity} unit(s). Now {} on hand", updated.stock_quantity);
        Ok(updated)
    }

    async fn record_write_off(
        &self,
        product_id: i64,
        quantity: i64,
        note: Option<String>,
    ) -> Result<Product, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        let mut tx = self.pool.begin().await?;
        let updated = match products::guarded_decrement(product_id, quantity, &mut tx).await? {
            Some(product) => product,
            None => {
                let available = products::fetch_product_by_id(product_id, &mut tx)
                    .await?
                    .ok_or(InventoryError::ProductNotFound(product_id))?
                    .stock_quantity;
                return Err(InventoryError::InsufficientStock { product_id, requested: quantity, available });
            },
        };
        inventory::append_entry(product_id, -quantity, LedgerReason::Expiration, None, note, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Wrote off {quantity} unit(s) of product {product_id}. Now {} on hand", updated.stock_quantity);
        Ok(updated)
    }

    async fn process_return(&self, order_id: i64, product_id: i64, quantity: i64) -> Result<Product, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        let mut tx = self.pool.begin().await?;
        let updated = products::increment_stock(product_id, quantity, &mut tx)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;
        inventory::append_entry(product_id, quantity, LedgerReason::Return, Some(order_id), None, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {quantity} unit(s) of product {product_id} returned against order {order_id}");
        Ok(updated)
    }

    async fn low_stock_products(&self, threshold: i64) -> Result<Vec<Product>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let result = products::products_below(threshold, &mut conn).await?;
        Ok(result)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, PosDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PosDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, PosDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_id(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PosDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let result = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, PosDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_orders_for_customer(customer_id, &mut conn).await?;
        Ok(result)
    }
}

/// A closed order gets the more specific error; an open-but-settled one reads as a double payment.
fn closed_or_processed(order: &Order) -> PosDatabaseError {
    if order.status.is_terminal() {
        PosDatabaseError::OrderClosed { order_id: order.id, status: order.status }
    } else {
        PosDatabaseError::AlreadyProcessed(order.id)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cancels one lapsed order under the settlement guard. `None` means the order was paid for while the sweep
    /// was running, which is not an error.
    async fn expire_order(&self, candidate: &Order) -> Result<Option<Order>, PosDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order =
            match orders::settle_order_if_unpaid(candidate.id, PaymentStatus::Failed, OrderStatus::Cancelled, &mut tx)
                .await?
            {
                Some(order) => order,
                None => {
                    debug!("🗃️ Order {} was settled while the expiry sweep was running. Skipping", candidate.id);
                    return Ok(None);
                },
            };
        payments::insert_payment(
            NewPayment::failed(
                order.id,
                order.total_amount,
                order.payment_method,
                Some("Redemption window lapsed before payment".to_string()),
            ),
            &mut tx,
        )
        .await?;
        let released = inventory::release_reservations_for_order(order.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} cancelled: unpaid at expiry. {released} reservation(s) released", order.id);
        Ok(Some(order))
    }
}
