use log::{debug, trace};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewProduct, Product, ProductUpdate},
    traits::InventoryError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, InventoryError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO products (name, description, price, barcode)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.description)
    .bind(product.price.value())
    .bind(product.barcode.clone())
    .fetch_one(conn)
    .await;
    match result {
        Ok(product) => Ok(product),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(InventoryError::BarcodeExists(product.barcode.unwrap_or_default()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_product_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

/// Fetches the named products in id order. Missing ids are silently absent from the result.
pub async fn fetch_products_by_ids(ids: &[i64], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let id_clause = ids.iter().map(|id| id.to_string()).collect::<Vec<String>>().join(",");
    let products = sqlx::query_as(
        format!("SELECT * FROM products WHERE id IN ({id_clause}) ORDER BY id ASC").as_str(),
    )
    .fetch_all(conn)
    .await?;
    Ok(products)
}

pub async fn fetch_products(active_only: bool, conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    let sql = if active_only {
        "SELECT * FROM products WHERE is_active = 1 ORDER BY name ASC"
    } else {
        "SELECT * FROM products ORDER BY name ASC"
    };
    let products = sqlx::query_as(sql).fetch_all(conn).await?;
    Ok(products)
}

pub(crate) async fn update_product(
    id: i64,
    update: ProductUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, InventoryError> {
    if update.is_empty() {
        debug!("📝️ No fields to update for product {id}. Update request skipped.");
        return Err(InventoryError::ProductUpdateNoOp);
    }
    let mut builder = QueryBuilder::new("UPDATE products SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(name) = update.name {
        set_clause.push("name = ");
        set_clause.push_bind_unseparated(name);
    }
    if let Some(description) = update.description {
        set_clause.push("description = ");
        set_clause.push_bind_unseparated(description);
    }
    if let Some(price) = update.price {
        set_clause.push("price = ");
        set_clause.push_bind_unseparated(price.value());
    }
    if let Some(barcode) = update.barcode {
        set_clause.push("barcode = ");
        set_clause.push_bind_unseparated(barcode);
    }
    if let Some(is_active) = update.is_active {
        set_clause.push("is_active = ");
        set_clause.push_bind_unseparated(is_active);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let res = builder.build().fetch_optional(conn).await?.map(|row: SqliteRow| Product::from_row(&row)).transpose()?;
    Ok(res)
}

/// Decrements a product's stock counter, guarded so the counter can never pass below zero.
///
/// The `stock_quantity >= $1` predicate makes the check-and-decrement a single statement, so two concurrent sales
/// of the last unit cannot both succeed. Returns `None` when the guard rejects the decrement; the caller decides
/// whether that means a missing product or insufficient stock.
pub(crate) async fn guarded_decrement(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as(
        r#"
            UPDATE products SET stock_quantity = stock_quantity - $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND stock_quantity >= $1
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

pub(crate) async fn increment_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as(
        "UPDATE products SET stock_quantity = stock_quantity + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 \
         RETURNING *",
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

pub(crate) async fn set_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as(
        "UPDATE products SET stock_quantity = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

pub(crate) async fn products_below(threshold: i64, conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    let products = sqlx::query_as(
        "SELECT * FROM products WHERE is_active = 1 AND stock_quantity <= $1 ORDER BY stock_quantity ASC, id ASC",
    )
    .bind(threshold)
    .fetch_all(conn)
    .await?;
    Ok(products)
}

/// Products whose cached counter has drifted below zero. Only reachable through out-of-band writes, but the
/// reconciliation sweep still patrols for it.
pub(crate) async fn negative_stock_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    let products =
        sqlx::query_as("SELECT * FROM products WHERE stock_quantity < 0 ORDER BY id ASC").fetch_all(conn).await?;
    Ok(products)
}
