//! Unified API for the product catalogue and the stock ledger.

use std::fmt::Debug;

use log::trace;

use crate::{
    db_types::{InventoryLogEntry, NewProduct, Product, ProductUpdate, StockAdjustment},
    traits::{InventoryError, InventoryManagement},
};

/// The `InventoryApi` provides a unified API for the product catalogue and the stock ledger.
///
/// Every mutation here goes through the ledger: there is no way to change a stock counter without an
/// [`InventoryLogEntry`] recording who moved what and why, which is what keeps the counters auditable.
pub struct InventoryApi<B> {
    db: B,
}

impl<B: Debug> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi ({:?})", self.db)
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Adds a product to the catalogue. If `initial_stock` is positive, an opening `Restock` ledger entry is written
    /// for it.
    pub async fn add_product(&self, product: NewProduct, initial_stock: i64) -> Result<Product, InventoryError> {
        self.db.add_product(product, initial_stock).await
    }

    /// Applies a partial update to a product's catalogue fields. Stock cannot be changed this way; use
    /// [`Self::set_stock_level`] or [`Self::restock`] so that the movement is on the ledger.
    pub async fn update_product(&self, product_id: i64, update: ProductUpdate) -> Result<Product, InventoryError> {
        self.db.update_product(product_id, update).await
    }

    /// Fetches a product by id. If no product exists, `None` is returned.
    pub async fn product(&self, product_id: i64) -> Result<Option<Product>, InventoryError> {
        self.db.fetch_product(product_id).await
    }

    /// Fetches the catalogue, optionally restricted to active products.
    pub async fn products(&self, active_only: bool) -> Result<Vec<Product>, InventoryError> {
        self.db.fetch_products(active_only).await
    }

    /// The cached stock counter for a product.
    pub async fn current_stock(&self, product_id: i64) -> Result<i64, InventoryError> {
        self.db.current_stock(product_id).await
    }

    /// The stock level recomputed from the ledger, ignoring the cached counter. Useful for spot audits; the
    /// reconciliation sweep compares the two across the whole catalogue.
    pub async fn derived_stock(&self, product_id: i64) -> Result<i64, InventoryError> {
        let derived = self.db.derived_stock(product_id).await?;
        trace!("Derived stock for product #{product_id}: {derived}");
        Ok(derived)
    }

    /// The most recent ledger entries for a product, newest first.
    pub async fn history(&self, product_id: i64, limit: i64) -> Result<Vec<InventoryLogEntry>, InventoryError> {
        self.db.history(product_id, limit).await
    }

    /// Sets a product's stock to an absolute level, recording the difference as an `Adjustment` ledger entry.
    pub async fn set_stock_level(&self, adjustment: StockAdjustment) -> Result<Product, InventoryError> {
        self.db.set_stock_level(adjustment).await
    }

    /// Adds `quantity` units of received stock, with an optional delivery note.
    pub async fn restock(
        &self,
        product_id: i64,
        quantity: i64,
        note: Option<String>,
    ) -> Result<Product, InventoryError> {
        self.db.restock(product_id, quantity, note).await
    }

    /// Removes `quantity` unsellable units (spoilage, breakage, theft) from stock.
    pub async fn record_write_off(
        &self,
        product_id: i64,
        quantity: i64,
        note: Option<String>,
    ) -> Result<Product, InventoryError> {
        self.db.record_write_off(product_id, quantity, note).await
    }

    /// Returns `quantity` units sold against `order_id` to the shelf.
    pub async fn process_return(
        &self,
        order_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<Product, InventoryError> {
        self.db.process_return(order_id, product_id, quantity).await
    }

    /// All active products at or below `threshold` units of stock.
    pub async fn low_stock_products(&self, threshold: i64) -> Result<Vec<Product>, InventoryError> {
        self.db.low_stock_products(threshold).await
    }
}
