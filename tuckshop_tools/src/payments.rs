use anyhow::Result;
use clap::Subcommand;
use tuckshop_common::Cents;
use tuckshop_engine::{
    db_types::SettlementStatus,
    traits::{OrderManagement, PosDatabase},
    SqliteDatabase,
};

use crate::formatting::format_payments;

#[derive(Debug, Subcommand)]
pub enum PayCommand {
    /// Take a cash payment at the counter
    Cash {
        #[arg(required = true, index = 1)]
        order_id: i64,
        /// The amount handed over, e.g. 5 or $5.00
        #[arg(required = true, index = 2)]
        tendered: Cents,
    },
    /// Apply a provider verdict to a pending mobile-money payment by hand, e.g. from a settlement statement.
    /// Verdicts are `Completed`, `Failed` or `Pending`.
    Settle {
        #[arg(required = true, index = 1)]
        payment_id: i64,
        #[arg(required = true, index = 2)]
        verdict: SettlementStatus,
    },
    /// List the payment attempts recorded against an order
    List {
        #[arg(required = true, index = 1)]
        order_id: i64,
    },
}

pub async fn handle_pay_command(command: PayCommand) {
    match command {
        PayCommand::Cash { order_id, tendered } => take_cash(order_id, tendered).await,
        PayCommand::Settle { payment_id, verdict } => settle_payment(payment_id, verdict).await,
        PayCommand::List { order_id } => list_payments(order_id).await,
    }
}

async fn take_cash(order_id: i64, tendered: Cents) {
    async fn take(order_id: i64, tendered: Cents) -> Result<String> {
        let db = SqliteDatabase::new(1).await?;
        let settled = db.process_cash_payment(order_id, tendered).await?;
        let change = tendered - settled.order.total_amount;
        Ok(format!(
            "Order #{order_id} paid: {} received, {change} change due. The order is now {}.",
            settled.payment.amount, settled.order.status
        ))
    }
    match take(order_id, tendered).await {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Error taking cash for order #{order_id}: {e}"),
    }
}

async fn settle_payment(payment_id: i64, verdict: SettlementStatus) {
    async fn settle(payment_id: i64, verdict: SettlementStatus) -> Result<String> {
        let db = SqliteDatabase::new(1).await?;
        match db.settle_mobile_payment(payment_id, verdict).await? {
            Some(settled) => Ok(format!(
                "Payment #{payment_id} is now {}. Order #{} is {} with payment status {}.",
                settled.payment.status, settled.order.id, settled.order.status, settled.order.payment_status
            )),
            None => Ok(format!("Payment #{payment_id} left as pending. Nothing was changed.")),
        }
    }
    match settle(payment_id, verdict).await {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Error settling payment #{payment_id}: {e}"),
    }
}

async fn list_payments(order_id: i64) {
    async fn list(order_id: i64) -> Result<String> {
        let db = SqliteDatabase::new(1).await?;
        let payments = db.fetch_payments_for_order(order_id).await?;
        Ok(format_payments(&payments))
    }
    match list(order_id).await {
        Ok(table) => println!("{table}"),
        Err(e) => eprintln!("Error fetching payments for order #{order_id}: {e}"),
    }
}
