use thiserror::Error;

use crate::db_types::{InventoryLogEntry, NewProduct, Product, ProductUpdate, StockAdjustment};

/// Behaviour for managing the product catalogue and the append-only stock ledger.
///
/// Every stock movement here is a ledger append plus a cache update, performed in one transaction. There is no
/// method that writes the cached counter without a ledger entry to back it.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Adds a product to the catalogue. When `initial_stock` is positive, a `Restock` ledger entry is written in
    /// the same transaction so that the new counter is already backed by the ledger.
    async fn add_product(&self, product: NewProduct, initial_stock: i64) -> Result<Product, InventoryError>;

    /// Applies a partial update to a product's catalogue fields. Stock cannot be edited this way.
    async fn update_product(&self, product_id: i64, update: ProductUpdate) -> Result<Product, InventoryError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, InventoryError>;

    /// The catalogue, ordered by name. With `active_only`, delisted products are omitted.
    async fn fetch_products(&self, active_only: bool) -> Result<Vec<Product>, InventoryError>;

    /// The cached stock counter for a product.
    async fn current_stock(&self, product_id: i64) -> Result<i64, InventoryError>;

    /// The stock counter as derived from the ledger: the signed sum of the product's non-reservation entries.
    /// At any quiescent point this equals [`current_stock`](Self::current_stock); the reconciliation sweep reports
    /// when it does not.
    async fn derived_stock(&self, product_id: i64) -> Result<i64, InventoryError>;

    /// The most recent ledger entries for a product, newest first, up to `limit`.
    async fn history(&self, product_id: i64, limit: i64) -> Result<Vec<InventoryLogEntry>, InventoryError>;

    /// Sets a product's stock to an absolute value, as after a physical stock-take. The difference against the
    /// current counter is recorded as an `Adjustment` ledger entry; setting the counter to its current value is
    /// rejected as a no-op.
    async fn set_stock_level(&self, adjustment: StockAdjustment) -> Result<Product, InventoryError>;

    /// Records a delivery of `quantity` units as a `Restock` ledger entry.
    async fn restock(&self, product_id: i64, quantity: i64, note: Option<String>) -> Result<Product, InventoryError>;

    /// Writes off `quantity` units of unsaleable stock as an `Expiration` ledger entry. Fails if fewer than
    /// `quantity` units are on hand.
    async fn record_write_off(
        &self,
        product_id: i64,
        quantity: i64,
        note: Option<String>,
    ) -> Result<Product, InventoryError>;

    /// Returns `quantity` units sold against `order_id` to the shelf, as a `Return` ledger entry referencing the
    /// order.
    async fn process_return(&self, order_id: i64, product_id: i64, quantity: i64) -> Result<Product, InventoryError>;

    /// Active products whose stock counter is at or below `threshold`, lowest first.
    async fn low_stock_products(&self, threshold: i64) -> Result<Vec<Product>, InventoryError>;
}

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {0} has been delisted and cannot be sold")]
    ProductInactive(i64),
    #[error("Insufficient stock of product {product_id}: {requested} requested, {available} available")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("A product with barcode {0} already exists")]
    BarcodeExists(String),
    #[error("The requested product change would result in a no-op.")]
    ProductUpdateNoOp,
    #[error("Product {0}'s stock is already at the requested level")]
    StockUnchanged(i64),
    #[error("A stock movement of {0} units is not recordable")]
    InvalidQuantity(i64),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::DatabaseError(e.to_string())
    }
}
