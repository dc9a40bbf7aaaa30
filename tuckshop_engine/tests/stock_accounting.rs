//! The books must stay square no matter what the day throws at the till. These tests hammer the engine with
//! bursts and randomised workloads and then let the audit pass judge the result.
use chrono::{Duration, Utc};
use log::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::{runtime::Runtime, task::JoinSet};
use tuckshop_common::Cents;
use tuckshop_engine::{
    db_types::{NewOrder, PaymentMethod},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_product, test_codes},
    },
    traits::{InventoryError, InventoryManagement, OrderManagement, PosDatabase, PosDatabaseError},
    SqliteDatabase,
};

const TILLS: u64 = 30;
const SHELF: i64 = 10;

#[test]
fn thirty_tills_cannot_sell_ten_pies_thirty_times() {
    info!("🚀️ Starting burst order test");
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let url = random_db_path();
        let mut seeder = prepare_test_env(&url).await;
        let pie = seed_product(&seeder, "Pie", Cents::from(500), SHELF).await;
        seeder.close().await.expect("Error closing seed handle");

        // a single connection so the burst serialises at the pool rather than erroring in the driver
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating database");
        let codes = test_codes();
        let mut tasks = JoinSet::new();
        for i in 0..TILLS {
            let db = db.clone();
            let codes = codes.clone();
            let product_id = pie.id;
            tasks.spawn(async move {
                let order = NewOrder::new(format!("till-{i}"), PaymentMethod::MobileMoney).with_item(product_id, 1);
                db.create_order(order, &codes).await
            });
        }
        let (mut sold, mut refused) = (0u64, 0u64);
        while let Some(result) = tasks.join_next().await {
            match result.expect("Order task panicked") {
                Ok(_) => sold += 1,
                Err(PosDatabaseError::InventoryError(InventoryError::InsufficientStock { .. })) => refused += 1,
                Err(e) => panic!("Unexpected error during the burst: {e}"),
            }
        }
        info!("🚀️ Burst complete. {sold} sold, {refused} refused");
        assert_eq!(sold, SHELF as u64);
        assert_eq!(refused, TILLS - SHELF as u64);
        assert_eq!(db.current_stock(pie.id).await.unwrap(), 0);
        assert_eq!(db.derived_stock(pie.id).await.unwrap(), 0);
        assert!(db.audit_stock_cache().await.unwrap().is_empty());
        assert!(db.clamp_negative_stock().await.unwrap().is_empty());

        let mut db = db;
        db.close().await.expect("Error closing database");
        Sqlite::drop_database(&url).await.unwrap();
    });
}

#[test]
fn a_randomised_trading_day_leaves_the_ledger_square() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let codes = test_codes();
        let mut products = Vec::new();
        for (name, price, stock) in [("Chips", 150, 30), ("Cola", 100, 40), ("Chocolate", 225, 25)] {
            products.push(seed_product(&db, name, Cents::from(price), stock).await);
        }

        let mut rng = StdRng::seed_from_u64(17);
        let mut open_cash: Vec<i64> = Vec::new();
        let mut settled: Vec<i64> = Vec::new();
        for _ in 0..60 {
            let product = &products[rng.gen_range(0..products.len())];
            match rng.gen_range(0..7u8) {
                0 | 1 => {
                    let qty = rng.gen_range(1..=3);
                    let order = NewOrder::new("walk-in", PaymentMethod::MobileMoney).with_item(product.id, qty);
                    match db.create_order(order, &codes).await {
                        Ok(_) => {},
                        Err(PosDatabaseError::InventoryError(InventoryError::InsufficientStock { .. })) => {},
                        Err(e) => panic!("Unexpected error creating order: {e}"),
                    }
                },
                2 => {
                    let qty = rng.gen_range(1..=3);
                    let order = NewOrder::new("walk-in", PaymentMethod::Cash).with_item(product.id, qty);
                    let created = db.create_order(order, &codes).await.expect("Error creating cash order");
                    open_cash.push(created.order.id);
                },
                3 => {
                    if open_cash.is_empty() {
                        continue;
                    }
                    let order_id = open_cash.swap_remove(rng.gen_range(0..open_cash.len()));
                    let order = db.fetch_order(order_id).await.unwrap().expect("Order not found");
                    match db.process_cash_payment(order_id, order.total_amount).await {
                        Ok(_) => settled.push(order_id),
                        // overbooked against the shelf; the order stays open until the sweep gets it
                        Err(PosDatabaseError::InventoryError(InventoryError::InsufficientStock { .. })) => {},
                        Err(e) => panic!("Unexpected error settling order {order_id}: {e}"),
                    }
                },
                4 => {
                    db.expire_unpaid_orders(Utc::now() + Duration::minutes(20)).await.expect("Error sweeping");
                    open_cash.clear();
                },
                5 => {
                    db.restock(product.id, rng.gen_range(1..=10), None).await.expect("Error restocking");
                },
                _ => match db.record_write_off(product.id, rng.gen_range(1..=2), Some("spoiled".into())).await {
                    Ok(_) | Err(InventoryError::InsufficientStock { .. }) => {},
                    Err(e) => panic!("Unexpected error writing off stock: {e}"),
                },
            }
        }
        // the odd customer brings something back
        for order_id in settled.iter().take(2) {
            let order = db.fetch_order(*order_id).await.unwrap().expect("Order not found");
            let items = db.fetch_order_items(*order_id).await.expect("Error fetching items");
            debug!("🚀️ Returning order {} ({})", order.id, order.total_amount);
            for item in &items {
                db.process_return(*order_id, item.product_id, item.quantity).await.expect("Error processing return");
            }
        }
        // close out the day, then let the audit judge the books
        db.expire_unpaid_orders(Utc::now() + Duration::minutes(20)).await.expect("Error sweeping");
        let mismatches = db.audit_stock_cache().await.expect("Error auditing");
        assert!(mismatches.is_empty(), "The ledger drifted from the counters: {mismatches:?}");
        for product in &products {
            let cached = db.current_stock(product.id).await.unwrap();
            assert!(cached >= 0, "Product {} went negative: {cached}", product.id);
            assert_eq!(cached, db.derived_stock(product.id).await.unwrap());
        }
        assert!(db.clamp_negative_stock().await.unwrap().is_empty());

        let mut db = db;
        db.close().await.expect("Error closing database");
        Sqlite::drop_database(&url).await.unwrap();
    });
}
