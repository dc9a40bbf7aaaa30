use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;
use tuckshop_common::Cents;
use tuckshop_engine::{
    db_types::{LedgerReason, NewOrder, OrderStatus, PaymentMethod, PaymentStatus, SettlementStatus},
    events::EventProducers,
    test_utils::{
        gateway::TestGateway,
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_catalogue, seed_product, test_codes},
    },
    traits::{InventoryError, InventoryManagement, OrderManagement, PosDatabase, PosDatabaseError},
    PaymentFlowError,
    PaymentsApi,
    SqliteDatabase,
};

struct TestRig {
    db: SqliteDatabase,
    gateway: TestGateway,
    api: PaymentsApi<SqliteDatabase, TestGateway>,
}

async fn setup() -> TestRig {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    let gateway = TestGateway::new();
    let api = PaymentsApi::new(db.clone(), gateway.clone(), 5, EventProducers::default());
    TestRig { db, gateway, api }
}

async fn tear_down(mut db: SqliteDatabase) {
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(db.url()).await.unwrap();
}

async fn place_order(db: &SqliteDatabase, customer: &str, method: PaymentMethod, product_id: i64, qty: i64) -> i64 {
    let order = NewOrder::new(customer, method).with_item(product_id, qty);
    let result = db.create_order(order, &test_codes()).await.expect("Error creating order");
    result.order.id
}

#[test]
fn mobile_money_settles_in_two_phases() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let rig = setup().await;
        let products = seed_catalogue(&rig.db).await;
        let chips = &products[0];
        let order_id = place_order(&rig.db, "alice", PaymentMethod::MobileMoney, chips.id, 3).await;
        assert_eq!(rig.db.current_stock(chips.id).await.unwrap(), 17);

        let payment = rig.api.initiate_mobile_payment(order_id, "0771234567").await.expect("Error initiating");
        assert_eq!(payment.amount, Cents::from(450));
        assert_eq!(payment.status, SettlementStatus::Pending);
        let charges = rig.gateway.charges();
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].amount, Cents::from(450));
        assert_eq!(charges[0].phone, "0771234567");
        assert_eq!(charges[0].reference, format!("TUCK_{order_id}"));

        let settled =
            rig.api.verify_mobile_payment(payment.id).await.expect("Error verifying").expect("Still pending");
        assert_eq!(settled.payment.status, SettlementStatus::Completed);
        assert_eq!(settled.order.status, OrderStatus::Processing);
        assert_eq!(settled.order.payment_status, PaymentStatus::Completed);
        // stock came off at order time; settlement moves nothing
        assert_eq!(rig.db.current_stock(chips.id).await.unwrap(), 17);
        assert_eq!(rig.db.derived_stock(chips.id).await.unwrap(), 17);
        tear_down(rig.db).await;
    });
}

#[test]
fn a_declined_charge_leaves_no_payment_behind() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let rig = setup().await;
        let products = seed_catalogue(&rig.db).await;
        let cola = &products[1];
        let order_id = place_order(&rig.db, "bob", PaymentMethod::MobileMoney, cola.id, 1).await;

        rig.gateway.decline_next("Insufficient wallet balance");
        let err = rig.api.initiate_mobile_payment(order_id, "0787654321").await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::GatewayError(_)));
        assert!(rig.db.fetch_payments_for_order(order_id).await.unwrap().is_empty());

        // the order survives for a retry
        let order = rig.db.fetch_order(order_id).await.unwrap().expect("Order not found");
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        rig.api.initiate_mobile_payment(order_id, "0787654321").await.expect("Retry should succeed");
        tear_down(rig.db).await;
    });
}

#[test]
fn a_failed_verdict_cancels_the_order_and_keeps_the_stock_deduction() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let rig = setup().await;
        let products = seed_catalogue(&rig.db).await;
        let chips = &products[0];
        let order_id = place_order(&rig.db, "carol", PaymentMethod::MobileMoney, chips.id, 4).await;
        let payment = rig.api.initiate_mobile_payment(order_id, "0771112222").await.expect("Error initiating");

        let txid = payment.txid.as_deref().expect("No txid on mobile payment");
        rig.gateway.set_verdict(txid, SettlementStatus::Failed);
        let settled =
            rig.api.verify_mobile_payment(payment.id).await.expect("Error verifying").expect("Still pending");
        assert_eq!(settled.payment.status, SettlementStatus::Failed);
        assert_eq!(settled.order.status, OrderStatus::Cancelled);
        assert_eq!(settled.order.payment_status, PaymentStatus::Failed);
        // reversal is a manual return, not automatic
        assert_eq!(rig.db.current_stock(chips.id).await.unwrap(), 16);
        tear_down(rig.db).await;
    });
}

#[test]
fn a_pending_verdict_is_a_noop_until_the_gateway_decides() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let rig = setup().await;
        let products = seed_catalogue(&rig.db).await;
        let cola = &products[1];
        let order_id = place_order(&rig.db, "dave", PaymentMethod::MobileMoney, cola.id, 2).await;
        let payment = rig.api.initiate_mobile_payment(order_id, "0783334444").await.expect("Error initiating");
        let txid = payment.txid.clone().expect("No txid on mobile payment");

        rig.gateway.set_verdict(&txid, SettlementStatus::Pending);
        let outcome = rig.api.verify_mobile_payment(payment.id).await.expect("Error verifying");
        assert!(outcome.is_none());
        let order = rig.db.fetch_order(order_id).await.unwrap().expect("Order not found");
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        // the next poll finds a verdict
        rig.gateway.set_verdict(&txid, SettlementStatus::Completed);
        let settled = rig.api.verify_mobile_payment(payment.id).await.expect("Error verifying").expect("Settled");
        assert_eq!(settled.order.payment_status, PaymentStatus::Completed);

        // and polling a third time is an error, not a double settlement
        let err = rig.api.verify_mobile_payment(payment.id).await.unwrap_err();
        assert!(
            matches!(err, PaymentFlowError::DatabaseError(PosDatabaseError::AlreadyProcessed(id)) if id == order_id)
        );
        tear_down(rig.db).await;
    });
}

#[test]
fn invalid_phone_numbers_never_reach_the_gateway() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let rig = setup().await;
        let products = seed_catalogue(&rig.db).await;
        let cola = &products[1];
        let order_id = place_order(&rig.db, "eve", PaymentMethod::MobileMoney, cola.id, 1).await;

        for bad in ["0751234567", "077123456", "+263771234567", "seven"] {
            let err = rig.api.initiate_mobile_payment(order_id, bad).await.unwrap_err();
            assert!(matches!(err, PaymentFlowError::InvalidPhoneNumber(_)), "{bad} was accepted");
        }
        assert!(rig.gateway.charges().is_empty());
        tear_down(rig.db).await;
    });
}

#[test]
fn cash_settlement_converts_the_reservation_to_a_sale() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let rig = setup().await;
        let products = seed_catalogue(&rig.db).await;
        let chocolate = &products[2];
        let order_id = place_order(&rig.db, "frank", PaymentMethod::Cash, chocolate.id, 5).await;
        assert_eq!(rig.db.current_stock(chocolate.id).await.unwrap(), 8);

        let settled = rig.api.process_cash_payment(order_id, Cents::from(1200)).await.expect("Error paying");
        assert_eq!(settled.order.status, OrderStatus::Processing);
        assert_eq!(settled.order.payment_status, PaymentStatus::Completed);
        assert_eq!(settled.payment.method, PaymentMethod::Cash);
        let detail = settled.payment.detail.as_deref().expect("No detail on cash payment");
        let parsed: serde_json::Value = serde_json::from_str(detail).unwrap();
        assert_eq!(parsed["tendered"], 1200);
        assert_eq!(parsed["change"], 75);

        // 5 x $2.25 off the shelf, reservation rewritten as a sale
        assert_eq!(rig.db.current_stock(chocolate.id).await.unwrap(), 3);
        assert_eq!(rig.db.derived_stock(chocolate.id).await.unwrap(), 3);
        let history = rig.db.history(chocolate.id, 10).await.unwrap();
        assert!(history.iter().all(|e| e.reason != LedgerReason::Reservation));
        assert!(history.iter().any(|e| e.reason == LedgerReason::Sale && e.quantity_change == -5));
        tear_down(rig.db).await;
    });
}

#[test]
fn short_tenders_and_double_payments_are_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let rig = setup().await;
        let products = seed_catalogue(&rig.db).await;
        let chocolate = &products[2];
        let order_id = place_order(&rig.db, "grace", PaymentMethod::Cash, chocolate.id, 2).await;

        let err = rig.api.process_cash_payment(order_id, Cents::from(400)).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentFlowError::DatabaseError(PosDatabaseError::InsufficientAmount {
                received, required, ..
            }) if received == Cents::from(400) && required == Cents::from(450)
        ));
        // order untouched, so the customer can try again with enough money
        assert_eq!(rig.db.current_stock(chocolate.id).await.unwrap(), 8);
        rig.api.process_cash_payment(order_id, Cents::from(450)).await.expect("Error paying");

        let err = rig.api.process_cash_payment(order_id, Cents::from(450)).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::DatabaseError(PosDatabaseError::AlreadyProcessed(_))));
        tear_down(rig.db).await;
    });
}

#[test]
fn payment_methods_cannot_be_crossed() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let rig = setup().await;
        let products = seed_catalogue(&rig.db).await;
        let chips = &products[0];
        let cash_order = place_order(&rig.db, "heidi", PaymentMethod::Cash, chips.id, 1).await;
        let mobile_order = place_order(&rig.db, "heidi", PaymentMethod::MobileMoney, chips.id, 1).await;

        let err = rig.api.initiate_mobile_payment(cash_order, "0775556666").await.unwrap_err();
        assert!(matches!(
            err,
            PaymentFlowError::DatabaseError(PosDatabaseError::WrongPaymentMethod {
                actual: PaymentMethod::Cash,
                ..
            })
        ));
        let err = rig.api.process_cash_payment(mobile_order, Cents::from(500)).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentFlowError::DatabaseError(PosDatabaseError::WrongPaymentMethod {
                actual: PaymentMethod::MobileMoney,
                ..
            })
        ));
        tear_down(rig.db).await;
    });
}

#[test]
fn an_overbooked_cash_order_fails_at_the_counter() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let rig = setup().await;
        let pies = seed_product(&rig.db, "Pie", Cents::from(500), 8).await;
        // both orders are accepted: reservations don't gate on the counter
        let first = place_order(&rig.db, "ivan", PaymentMethod::Cash, pies.id, 5).await;
        let second = place_order(&rig.db, "judy", PaymentMethod::Cash, pies.id, 5).await;

        rig.api.process_cash_payment(first, Cents::from(2500)).await.expect("Error paying first order");
        assert_eq!(rig.db.current_stock(pies.id).await.unwrap(), 3);

        // only 3 left on the shelf; the second order's hold cannot be honoured
        let err = rig.api.process_cash_payment(second, Cents::from(2500)).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentFlowError::DatabaseError(PosDatabaseError::InventoryError(InventoryError::InsufficientStock {
                requested: 5,
                available: 3,
                ..
            }))
        ));
        // the failed attempt rolled back: order still open, reservation still on the ledger
        let order = rig.db.fetch_order(second).await.unwrap().expect("Order not found");
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.status, OrderStatus::Pending);
        let history = rig.db.history(pies.id, 10).await.unwrap();
        assert!(history.iter().any(|e| e.reason == LedgerReason::Reservation && e.reference_id == Some(second)));
        assert_eq!(rig.db.current_stock(pies.id).await.unwrap(), 3);
        tear_down(rig.db).await;
    });
}
