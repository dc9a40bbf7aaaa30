use chrono::{Duration, Utc};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;
use tuckshop_common::{Cents, Secret};
use tuckshop_engine::{
    db_types::{LedgerReason, NewOrder, OrderStatus, PaymentMethod, PaymentStatus, ProductUpdate},
    events::EventProducers,
    helpers::{RedemptionCodeError, RedemptionCodes},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_catalogue, seed_product, test_codes},
    },
    traits::{InventoryError, InventoryManagement, PosDatabase, PosDatabaseError},
    OrderFlowApi,
    OrderFlowError,
    SqliteDatabase,
};

async fn setup() -> (SqliteDatabase, OrderFlowApi<SqliteDatabase>) {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    let api = OrderFlowApi::new(db.clone(), test_codes(), 5, EventProducers::default());
    (db, api)
}

async fn tear_down(mut db: SqliteDatabase) {
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(db.url()).await.unwrap();
}

#[test]
fn mobile_money_order_deducts_stock_immediately() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let products = seed_catalogue(&db).await;
        let (chips, cola) = (&products[0], &products[1]);

        let order = NewOrder::new("alice", PaymentMethod::MobileMoney)
            .with_item(chips.id, 3)
            .with_item(cola.id, 2);
        let result = api.create_order(order).await.expect("Error creating order");

        assert_eq!(result.order.total_amount, Cents::from(3 * 150 + 2 * 100));
        assert_eq!(result.order.status, OrderStatus::Pending);
        assert_eq!(result.order.payment_status, PaymentStatus::Pending);
        assert_eq!(result.item_count(), 2);
        assert_eq!(db.current_stock(chips.id).await.unwrap(), 17);
        assert_eq!(db.current_stock(cola.id).await.unwrap(), 48);
        // the sale is on the ledger, so cache and ledger agree
        assert_eq!(db.derived_stock(chips.id).await.unwrap(), 17);
        assert_eq!(db.derived_stock(cola.id).await.unwrap(), 48);
        let entry = &db.history(chips.id, 1).await.unwrap()[0];
        assert_eq!(entry.reason, LedgerReason::Sale);
        assert_eq!(entry.quantity_change, -3);
        assert_eq!(entry.reference_id, Some(result.order.id));

        let expires = result.order.redemption_expires_at.expect("No expiry on order");
        let window = expires - Utc::now();
        assert!(window > Duration::minutes(230) && window <= Duration::hours(4), "mobile window was {window}");
        tear_down(db).await;
    });
}

#[test]
fn a_second_order_over_the_same_stock_is_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let last_one = seed_product(&db, "Last pie", Cents::from(300), 1).await;

        let order = NewOrder::new("alice", PaymentMethod::MobileMoney).with_item(last_one.id, 1);
        api.create_order(order).await.expect("Error creating order");
        assert_eq!(db.current_stock(last_one.id).await.unwrap(), 0);

        let order = NewOrder::new("bob", PaymentMethod::MobileMoney).with_item(last_one.id, 1);
        let err = api.create_order(order).await.expect_err("Order should not have been accepted");
        assert!(matches!(
            err,
            OrderFlowError::DatabaseError(PosDatabaseError::InventoryError(InventoryError::InsufficientStock {
                requested: 1,
                available: 0,
                ..
            }))
        ));
        assert_eq!(db.current_stock(last_one.id).await.unwrap(), 0);
        tear_down(db).await;
    });
}

#[test]
fn cash_order_reserves_without_touching_the_counter() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 5).await;

        let order = NewOrder::new("carol", PaymentMethod::Cash).with_item(sweets.id, 2);
        let result = api.create_order(order).await.expect("Error creating order");

        assert_eq!(db.current_stock(sweets.id).await.unwrap(), 5);
        let entry = &db.history(sweets.id, 1).await.unwrap()[0];
        assert_eq!(entry.reason, LedgerReason::Reservation);
        assert_eq!(entry.quantity_change, -2);
        assert_eq!(entry.reference_id, Some(result.order.id));
        // the derived value skips reservations, so it still matches the cache
        assert_eq!(db.derived_stock(sweets.id).await.unwrap(), 5);

        let expires = result.order.redemption_expires_at.expect("No expiry on order");
        let window = expires - Utc::now();
        assert!(window > Duration::minutes(13) && window <= Duration::minutes(15), "cash window was {window}");
        tear_down(db).await;
    });
}

#[test]
fn order_totals_come_from_the_catalogue() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let products = seed_catalogue(&db).await;
        let chocolate = &products[2];

        let order = NewOrder::new("dave", PaymentMethod::MobileMoney).with_item(chocolate.id, 3);
        let result = api.create_order(order).await.expect("Error creating order");
        assert_eq!(result.order.total_amount, Cents::from(675));
        assert_eq!(result.items[0].unit_price, Cents::from(225));

        let placed = api.order_with_items(result.order.id).await.unwrap().expect("Order not found");
        assert_eq!(placed.line_total(), placed.order.total_amount);
        assert_eq!(placed.unit_count(), 3);
        tear_down(db).await;
    });
}

#[test]
fn degenerate_orders_are_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let products = seed_catalogue(&db).await;
        let chips = &products[0];

        let err = api.create_order(NewOrder::new("eve", PaymentMethod::Cash)).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::EmptyOrder));

        let order = NewOrder::new("eve", PaymentMethod::Cash).with_item(chips.id, 0);
        let err = api.create_order(order).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::InvalidQuantity { quantity: 0, .. }));

        let order = NewOrder::new("eve", PaymentMethod::Cash).with_item(chips.id, -2);
        let err = api.create_order(order).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::InvalidQuantity { quantity: -2, .. }));

        assert!(api.orders_for_customer("eve").await.unwrap().is_empty());
        tear_down(db).await;
    });
}

#[test]
fn an_unknown_product_aborts_the_whole_order() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let products = seed_catalogue(&db).await;
        let cola = &products[1];

        let order = NewOrder::new("frank", PaymentMethod::MobileMoney).with_item(cola.id, 2).with_item(999, 1);
        let err = api.create_order(order).await.unwrap_err();
        assert!(matches!(
            err,
            OrderFlowError::DatabaseError(PosDatabaseError::InventoryError(InventoryError::ProductNotFound(999)))
        ));
        // nothing was committed
        assert_eq!(db.current_stock(cola.id).await.unwrap(), 50);
        assert!(db.history(cola.id, 10).await.unwrap().is_empty());
        assert!(api.orders_for_customer("frank").await.unwrap().is_empty());
        tear_down(db).await;
    });
}

#[test]
fn inactive_products_cannot_be_ordered() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let products = seed_catalogue(&db).await;
        let chips = &products[0];
        let update = ProductUpdate::default().with_active(false);
        db.update_product(chips.id, update).await.expect("Error deactivating product");

        let order = NewOrder::new("grace", PaymentMethod::Cash).with_item(chips.id, 1);
        let err = api.create_order(order).await.unwrap_err();
        assert!(matches!(
            err,
            OrderFlowError::DatabaseError(PosDatabaseError::InventoryError(InventoryError::ProductInactive(_)))
        ));
        tear_down(db).await;
    });
}

#[test]
fn insufficient_stock_rolls_back_every_item() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let products = seed_catalogue(&db).await;
        let (chips, cola) = (&products[0], &products[1]);

        // cola would succeed on its own; the chips line sinks the order
        let order = NewOrder::new("heidi", PaymentMethod::MobileMoney).with_item(cola.id, 2).with_item(chips.id, 25);
        let err = api.create_order(order).await.unwrap_err();
        assert!(matches!(
            err,
            OrderFlowError::DatabaseError(PosDatabaseError::InventoryError(InventoryError::InsufficientStock {
                requested: 25,
                available: 20,
                ..
            }))
        ));
        assert_eq!(db.current_stock(cola.id).await.unwrap(), 50);
        assert_eq!(db.current_stock(chips.id).await.unwrap(), 20);
        assert!(db.history(cola.id, 10).await.unwrap().is_empty());
        tear_down(db).await;
    });
}

#[test]
fn a_paid_order_redeems_exactly_once() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 5).await;

        let order = NewOrder::new("ivan", PaymentMethod::Cash).with_item(sweets.id, 2);
        let result = api.create_order(order).await.expect("Error creating order");
        let payload = result.redemption_code().to_string();

        // can't pick up goods that haven't been paid for
        let err = api.redeem_order(&payload).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::DatabaseError(PosDatabaseError::OrderNotPaid(_))));

        db.process_cash_payment(result.order.id, Cents::from(100)).await.expect("Error paying order");
        let collected = api.redeem_order(&payload).await.expect("Error redeeming order");
        assert_eq!(collected.status, OrderStatus::Completed);

        // the same code a second time finds the order closed
        let err = api.redeem_order(&payload).await.unwrap_err();
        assert!(matches!(
            err,
            OrderFlowError::DatabaseError(PosDatabaseError::OrderClosed { status: OrderStatus::Completed, .. })
        ));
        tear_down(db).await;
    });
}

#[test]
fn forged_and_stale_codes_are_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (db, api) = setup().await;
        let sweets = seed_product(&db, "Sweets", Cents::from(50), 5).await;
        let order = NewOrder::new("judy", PaymentMethod::Cash).with_item(sweets.id, 1);
        let result = api.create_order(order).await.expect("Error creating order");
        db.process_cash_payment(result.order.id, Cents::from(50)).await.expect("Error paying order");

        // a code signed with somebody else's key is rejected without detail
        let forger = RedemptionCodes::new(
            Secret::new("not the shop's secret!!".to_string()),
            Duration::minutes(15),
            Duration::hours(4),
        );
        let forged = forger.issue(result.order.id, PaymentMethod::Cash, Utc::now()).as_json();
        let err = api.redeem_order(&forged).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::RedemptionCode(RedemptionCodeError::Invalid)));

        // a genuine but lapsed code names the order it was for
        let stale =
            test_codes().issue_with_expiry(result.order.id, PaymentMethod::Cash, Utc::now() - Duration::minutes(1));
        let err = api.redeem_order(&stale.as_json()).await.unwrap_err();
        match err {
            OrderFlowError::RedemptionCode(RedemptionCodeError::Expired { order_id, .. }) => {
                assert_eq!(order_id, result.order.id)
            },
            other => panic!("Expected an expired-code error, got {other}"),
        }

        // neither attempt completed the order
        let order = api.fetch_order(result.order.id).await.unwrap().expect("Order not found");
        assert_eq!(order.status, OrderStatus::Processing);
        tear_down(db).await;
    });
}
