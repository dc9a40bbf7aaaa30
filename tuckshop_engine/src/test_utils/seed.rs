//! Catalogue seeding helpers so that tests do not repeat product setup boilerplate.

use chrono::Duration;
use tuckshop_common::{Cents, Secret};

use crate::{
    db_types::{NewProduct, Product},
    helpers::RedemptionCodes,
    traits::InventoryManagement,
    SqliteDatabase,
};

/// Redemption code signer with a fixed secret and the standard windows, so that codes issued in one part of a test
/// can be verified in another.
pub fn test_codes() -> RedemptionCodes {
    let secret = Secret::new("a test signing secret".to_string());
    RedemptionCodes::new(secret, Duration::minutes(15), Duration::hours(4))
}

pub async fn seed_product(db: &SqliteDatabase, name: &str, price: Cents, stock: i64) -> Product {
    db.add_product(NewProduct::new(name, price), stock).await.expect("Error seeding product")
}

/// Seeds the usual three-product tuckshop: chips at $1.50 x20, cola at $1.00 x50 and chocolate at $2.25 x8.
pub async fn seed_catalogue(db: &SqliteDatabase) -> Vec<Product> {
    let chips = seed_product(db, "Chips", Cents::from(150), 20).await;
    let cola = seed_product(db, "Cola", Cents::from(100), 50).await;
    let chocolate = seed_product(db, "Chocolate", Cents::from(225), 8).await;
    vec![chips, cola, chocolate]
}
