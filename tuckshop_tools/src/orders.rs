use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use tuckshop_engine::{
    db_types::{NewOrder, PaymentMethod},
    events::EventProducers,
    helpers::RedemptionCodes,
    order_objects::PlacedOrder,
    traits::OrderManagement,
    OrderFlowApi,
    PosConfig,
    SqliteDatabase,
};

use crate::formatting::{format_orders, format_placed_order};

#[derive(Debug, Subcommand)]
pub enum OrdersCommand {
    /// Place an order
    Create(CreateOrderParams),
    /// Show an order, its line items and its pickup code
    Show {
        #[arg(required = true, index = 1)]
        id: i64,
        /// Print the order as JSON instead of a table
        #[arg(short, long)]
        json: bool,
    },
    /// List a customer's orders, newest first
    #[command(name = "for-customer")]
    ForCustomer {
        #[arg(required = true, index = 1)]
        customer_id: String,
    },
    /// Redeem a pickup code presented at the counter
    Redeem {
        /// The signed payload scanned from the QR code
        #[arg(required = true, index = 1)]
        payload: String,
    },
}

#[derive(Debug, Args)]
pub struct CreateOrderParams {
    #[arg(required = true, index = 1)]
    pub customer_id: String,
    /// `cash` or `mobile`
    #[arg(short, long, default_value = "cash")]
    pub method: PaymentMethod,
    /// Line items as PRODUCT_ID:QTY pairs, e.g. `3:2 1:1`
    #[arg(required = true)]
    pub items: Vec<String>,
}

pub async fn handle_orders_command(command: OrdersCommand) {
    match command {
        OrdersCommand::Create(params) => create_order(params).await,
        OrdersCommand::Show { id, json } => show_order(id, json).await,
        OrdersCommand::ForCustomer { customer_id } => orders_for_customer(customer_id).await,
        OrdersCommand::Redeem { payload } => redeem_order(payload).await,
    }
}

async fn order_api() -> Result<OrderFlowApi<SqliteDatabase>> {
    let config = PosConfig::from_env_or_default();
    let db = SqliteDatabase::new(1).await?;
    let codes = RedemptionCodes::from_config(&config);
    Ok(OrderFlowApi::new(db, codes, config.low_stock_threshold, EventProducers::default()))
}

fn parse_items(items: &[String]) -> Result<Vec<(i64, i64)>> {
    items
        .iter()
        .map(|item| {
            let (product, qty) = item
                .split_once(':')
                .ok_or_else(|| anyhow!("'{item}' is not a PRODUCT_ID:QTY pair"))?;
            let product = product.parse::<i64>().map_err(|_| anyhow!("'{product}' is not a product id"))?;
            let qty = qty.parse::<i64>().map_err(|_| anyhow!("'{qty}' is not a quantity"))?;
            Ok((product, qty))
        })
        .collect()
}

async fn create_order(params: CreateOrderParams) {
    async fn create(params: CreateOrderParams) -> Result<String> {
        let items = parse_items(&params.items)?;
        let api = order_api().await?;
        let mut order = NewOrder::new(params.customer_id, params.method);
        for (product_id, quantity) in items {
            order = order.with_item(product_id, quantity);
        }
        let result = api.create_order(order).await?;
        let placed = PlacedOrder::new(result.order, result.items);
        format_placed_order(&placed)
    }
    match create(params).await {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Error placing order: {e}"),
    }
}

async fn show_order(id: i64, json: bool) {
    async fn show(id: i64, json: bool) -> Result<String> {
        let api = order_api().await?;
        match api.order_with_items(id).await? {
            Some(placed) if json => Ok(serde_json::to_string_pretty(&placed)?),
            Some(placed) => format_placed_order(&placed),
            None => Ok(format!("Order #{id} does not exist")),
        }
    }
    match show(id, json).await {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Error fetching order #{id}: {e}"),
    }
}

async fn orders_for_customer(customer_id: String) {
    async fn list(customer_id: &str) -> Result<String> {
        let db = SqliteDatabase::new(1).await?;
        let orders = db.fetch_orders_for_customer(customer_id).await?;
        Ok(format_orders(&orders))
    }
    match list(&customer_id).await {
        Ok(table) => println!("Orders for {customer_id}:\n{table}"),
        Err(e) => eprintln!("Error fetching orders for {customer_id}: {e}"),
    }
}

async fn redeem_order(payload: String) {
    async fn redeem(payload: &str) -> Result<String> {
        let api = order_api().await?;
        let order = api.redeem_order(payload).await?;
        Ok(format!("Order #{} handed over to {}. Status: {}", order.id, order.customer_id, order.status))
    }
    match redeem(&payload).await {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Could not redeem the presented code: {e}"),
    }
}
