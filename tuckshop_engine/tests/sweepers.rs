use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;
use tuckshop_common::Cents;
use tuckshop_engine::{
    db_types::{LedgerReason, NewOrder, OrderStatus, PaymentMethod, PaymentStatus, SettlementStatus},
    events::EventProducers,
    sweepers::{run_reconciliation_sweep, start_expiry_sweeper},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_product, test_codes},
    },
    traits::{InventoryManagement, OrderManagement, PosDatabase},
    SqliteDatabase,
};

async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await
}

async fn tear_down(mut db: SqliteDatabase) {
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(db.url()).await.unwrap();
}

async fn place_cash_order(db: &SqliteDatabase, customer: &str, product_id: i64, qty: i64) -> i64 {
    let order = NewOrder::new(customer, PaymentMethod::Cash).with_item(product_id, qty);
    db.create_order(order, &test_codes()).await.expect("Error creating order").order.id
}

/// Simulates the passage of time by rewinding an order's stored expiry.
async fn lapse_order(db: &SqliteDatabase, order_id: i64) {
    sqlx::query("UPDATE orders SET redemption_expires_at = $1 WHERE id = $2")
        .bind(Utc::now() - Duration::minutes(1))
        .bind(order_id)
        .execute(db.pool())
        .await
        .expect("Error rewinding order expiry");
}

#[test]
fn the_expiry_sweep_reverses_abandoned_cash_orders() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let db = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 5).await;
        let order_id = place_cash_order(&db, "alice", sweets.id, 2).await;
        assert_eq!(db.current_stock(sweets.id).await.unwrap(), 5);

        let expired = db.expire_unpaid_orders(Utc::now() + Duration::minutes(20)).await.expect("Error sweeping");
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, order_id);

        let order = db.fetch_order(order_id).await.unwrap().expect("Order not found");
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        // a failed payment attempt is on record
        let payments = db.fetch_payments_for_order(order_id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, SettlementStatus::Failed);
        assert_eq!(payments[0].method, PaymentMethod::Cash);
        // the hold is gone and the counter never moved
        assert!(db.history(sweets.id, 10).await.unwrap().iter().all(|e| e.reason != LedgerReason::Reservation));
        assert_eq!(db.current_stock(sweets.id).await.unwrap(), 5);
        assert_eq!(db.derived_stock(sweets.id).await.unwrap(), 5);
        tear_down(db).await;
    });
}

#[test]
fn sweeping_twice_changes_nothing_more() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let db = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 5).await;
        let order_id = place_cash_order(&db, "bob", sweets.id, 1).await;

        let later = Utc::now() + Duration::minutes(20);
        assert_eq!(db.expire_unpaid_orders(later).await.unwrap().len(), 1);
        assert!(db.expire_unpaid_orders(later).await.unwrap().is_empty());
        // still exactly one failure on record
        assert_eq!(db.fetch_payments_for_order(order_id).await.unwrap().len(), 1);
        tear_down(db).await;
    });
}

#[test]
fn paid_orders_are_not_expired() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let db = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 5).await;
        let order_id = place_cash_order(&db, "carol", sweets.id, 2).await;
        db.process_cash_payment(order_id, Cents::from(100)).await.expect("Error paying");

        assert!(db.expire_unpaid_orders(Utc::now() + Duration::minutes(20)).await.unwrap().is_empty());
        let order = db.fetch_order(order_id).await.unwrap().expect("Order not found");
        assert_eq!(order.status, OrderStatus::Processing);
        tear_down(db).await;
    });
}

#[test]
fn mobile_money_orders_are_never_expired_by_the_clock() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let db = setup().await;
        let pies = seed_product(&db, "Pie", Cents::from(500), 6).await;
        let order = NewOrder::new("dave", PaymentMethod::MobileMoney).with_item(pies.id, 2);
        let order_id = db.create_order(order, &test_codes()).await.expect("Error creating order").order.id;
        assert_eq!(db.current_stock(pies.id).await.unwrap(), 4);

        // even well past the four-hour pickup window the sweep leaves it for the gateway or an operator
        assert!(db.expire_unpaid_orders(Utc::now() + Duration::hours(5)).await.unwrap().is_empty());
        let order = db.fetch_order(order_id).await.unwrap().expect("Order not found");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(db.current_stock(pies.id).await.unwrap(), 4);
        // the operator closes it out by hand with a failed settlement
        let payment = db.insert_mobile_payment(order_id, "MM-STATEMENT-77".into(), "0771234567".into()).await.unwrap();
        db.settle_mobile_payment(payment.id, SettlementStatus::Failed).await.expect("Error settling");
        let order = db.fetch_order(order_id).await.unwrap().expect("Order not found");
        assert_eq!(order.status, OrderStatus::Cancelled);
        tear_down(db).await;
    });
}

#[test]
fn the_sweeper_task_cancels_lapsed_orders_on_its_first_tick() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let db = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 5).await;
        let order_id = place_cash_order(&db, "eve", sweets.id, 1).await;
        lapse_order(&db, order_id).await;

        let handle = start_expiry_sweeper(db.clone(), EventProducers::default(), StdDuration::from_secs(3600));
        tokio::time::sleep(StdDuration::from_millis(250)).await;
        handle.abort();

        let order = db.fetch_order(order_id).await.unwrap().expect("Order not found");
        assert_eq!(order.status, OrderStatus::Cancelled);
        tear_down(db).await;
    });
}

#[test]
fn reconciliation_clamps_oversold_counters_and_squares_the_ledger() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let db = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 5).await;
        // what an unguarded till would have done: two sales totalling 8 against 5 on the shelf
        for qty in [-5i64, -3] {
            sqlx::query("INSERT INTO inventory_log (product_id, quantity_change, reason) VALUES ($1, $2, 'Sale')")
                .bind(sweets.id)
                .bind(qty)
                .execute(db.pool())
                .await
                .unwrap();
        }
        sqlx::query("UPDATE products SET stock_quantity = -3 WHERE id = $1")
            .bind(sweets.id)
            .execute(db.pool())
            .await
            .unwrap();

        let report = run_reconciliation_sweep(&db, Duration::hours(24)).await;
        assert_eq!(report.corrections.len(), 1);
        assert_eq!(report.corrections[0].deficit, 3);
        assert_eq!(db.current_stock(sweets.id).await.unwrap(), 0);
        let entry = &db.history(sweets.id, 1).await.unwrap()[0];
        assert_eq!(entry.reason, LedgerReason::Adjustment);
        assert_eq!(entry.quantity_change, 3);
        // the adjustment squares the ledger, so the audit pass has nothing to say
        assert!(report.mismatches.is_empty());
        assert_eq!(db.derived_stock(sweets.id).await.unwrap(), 0);
        tear_down(db).await;
    });
}

#[test]
fn reconciliation_purges_stale_holds_but_never_live_ones() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let db = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 10).await;
        let live = place_cash_order(&db, "frank", sweets.id, 2).await;
        let dead = place_cash_order(&db, "grace", sweets.id, 3).await;
        // order closed but its hold was never cleaned up, say a crash between the two writes
        sqlx::query("UPDATE orders SET status = 'Cancelled', payment_status = 'Failed' WHERE id = $1")
            .bind(dead)
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("UPDATE inventory_log SET created_at = $1 WHERE reference_id IN ($2, $3)")
            .bind(Utc::now() - Duration::days(2))
            .bind(live)
            .bind(dead)
            .execute(db.pool())
            .await
            .unwrap();

        let report = run_reconciliation_sweep(&db, Duration::hours(24)).await;
        assert_eq!(report.purged_reservations, 1);
        let history = db.history(sweets.id, 10).await.unwrap();
        // the live order's hold is old too, but its order is still open
        assert!(history.iter().any(|e| e.reason == LedgerReason::Reservation && e.reference_id == Some(live)));
        assert!(history.iter().all(|e| e.reference_id != Some(dead)));
        tear_down(db).await;
    });
}

#[test]
fn reconciliation_reports_drift_without_rewriting_the_counter() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let db = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 20).await;
        sqlx::query("UPDATE products SET stock_quantity = 99 WHERE id = $1")
            .bind(sweets.id)
            .execute(db.pool())
            .await
            .unwrap();

        let report = run_reconciliation_sweep(&db, Duration::hours(24)).await;
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].cached, 99);
        assert_eq!(report.mismatches[0].derived, 20);
        assert!(!report.is_clean());
        // deliberately not fixed
        assert_eq!(db.current_stock(sweets.id).await.unwrap(), 99);
        tear_down(db).await;
    });
}
