use anyhow::Result;
use clap::Subcommand;
use tuckshop_engine::{
    db_types::{Product, StockAdjustment},
    traits::InventoryManagement,
    PosConfig,
    SqliteDatabase,
};

use crate::formatting::{format_history, format_products};

#[derive(Debug, Subcommand)]
pub enum StockCommand {
    /// The cached counter and the ledger-derived value for a product
    Show {
        #[arg(required = true, index = 1)]
        id: i64,
    },
    /// Record a stock delivery
    Restock {
        #[arg(required = true, index = 1)]
        id: i64,
        #[arg(required = true, index = 2)]
        quantity: i64,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Write off spoiled or missing stock
    #[command(name = "write-off")]
    WriteOff {
        #[arg(required = true, index = 1)]
        id: i64,
        #[arg(required = true, index = 2)]
        quantity: i64,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Return units sold against an order to the shelf
    Return {
        #[arg(required = true, index = 1)]
        order_id: i64,
        #[arg(required = true, index = 2)]
        product_id: i64,
        #[arg(required = true, index = 3)]
        quantity: i64,
    },
    /// Set the counter to an absolute value after a physical stock-take
    Set {
        #[arg(required = true, index = 1)]
        id: i64,
        #[arg(required = true, index = 2)]
        quantity: i64,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Recent ledger entries for a product, newest first
    History {
        #[arg(required = true, index = 1)]
        id: i64,
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
    /// Active products at or below the low-stock threshold
    Low {
        /// Overrides `TUCK_LOW_STOCK_THRESHOLD`
        #[arg(short, long)]
        threshold: Option<i64>,
    },
}

pub async fn handle_stock_command(command: StockCommand) {
    match command {
        StockCommand::Show { id } => show_stock(id).await,
        StockCommand::Restock { id, quantity, note } => restock(id, quantity, note).await,
        StockCommand::WriteOff { id, quantity, note } => write_off(id, quantity, note).await,
        StockCommand::Return { order_id, product_id, quantity } => process_return(order_id, product_id, quantity).await,
        StockCommand::Set { id, quantity, note } => set_stock(id, quantity, note).await,
        StockCommand::History { id, limit } => history(id, limit).await,
        StockCommand::Low { threshold } => low_stock(threshold).await,
    }
}

fn print_level(product: &Product) {
    println!("{} now has {} unit(s) on the shelf", product.name, product.stock_quantity);
}

async fn show_stock(id: i64) {
    async fn show(id: i64) -> Result<(i64, i64)> {
        let db = SqliteDatabase::new(1).await?;
        let cached = db.current_stock(id).await?;
        let derived = db.derived_stock(id).await?;
        Ok((cached, derived))
    }
    match show(id).await {
        Ok((cached, derived)) if cached == derived => println!("Product #{id}: {cached} unit(s) on the shelf"),
        Ok((cached, derived)) => {
            println!("Product #{id}: counter says {cached}, but the ledger says {derived}. Run `sweep reconcile`.")
        },
        Err(e) => eprintln!("Error fetching stock for product #{id}: {e}"),
    }
}

async fn restock(id: i64, quantity: i64, note: Option<String>) {
    async fn run(id: i64, quantity: i64, note: Option<String>) -> Result<Product> {
        let db = SqliteDatabase::new(1).await?;
        Ok(db.restock(id, quantity, note).await?)
    }
    match run(id, quantity, note).await {
        Ok(product) => print_level(&product),
        Err(e) => eprintln!("Error restocking product #{id}: {e}"),
    }
}

async fn write_off(id: i64, quantity: i64, note: Option<String>) {
    async fn run(id: i64, quantity: i64, note: Option<String>) -> Result<Product> {
        let db = SqliteDatabase::new(1).await?;
        Ok(db.record_write_off(id, quantity, note).await?)
    }
    match run(id, quantity, note).await {
        Ok(product) => print_level(&product),
        Err(e) => eprintln!("Error writing off stock for product #{id}: {e}"),
    }
}

async fn process_return(order_id: i64, product_id: i64, quantity: i64) {
    async fn run(order_id: i64, product_id: i64, quantity: i64) -> Result<Product> {
        let db = SqliteDatabase::new(1).await?;
        Ok(db.process_return(order_id, product_id, quantity).await?)
    }
    match run(order_id, product_id, quantity).await {
        Ok(product) => print_level(&product),
        Err(e) => eprintln!("Error processing the return against order #{order_id}: {e}"),
    }
}

async fn set_stock(id: i64, quantity: i64, note: Option<String>) {
    async fn run(id: i64, quantity: i64, note: Option<String>) -> Result<Product> {
        let db = SqliteDatabase::new(1).await?;
        let mut adjustment = StockAdjustment::new(id, quantity);
        if let Some(note) = note {
            adjustment = adjustment.with_note(note);
        }
        Ok(db.set_stock_level(adjustment).await?)
    }
    match run(id, quantity, note).await {
        Ok(product) => print_level(&product),
        Err(e) => eprintln!("Error adjusting stock for product #{id}: {e}"),
    }
}

async fn history(id: i64, limit: i64) {
    async fn run(id: i64, limit: i64) -> Result<String> {
        let db = SqliteDatabase::new(1).await?;
        let entries = db.history(id, limit).await?;
        Ok(format_history(&entries))
    }
    match run(id, limit).await {
        Ok(table) => println!("{table}"),
        Err(e) => eprintln!("Error fetching history for product #{id}: {e}"),
    }
}

async fn low_stock(threshold: Option<i64>) {
    async fn run(threshold: Option<i64>) -> Result<(i64, String)> {
        let threshold = threshold.unwrap_or_else(|| PosConfig::from_env_or_default().low_stock_threshold);
        let db = SqliteDatabase::new(1).await?;
        let products = db.low_stock_products(threshold).await?;
        Ok((threshold, format_products(&products)))
    }
    match run(threshold).await {
        Ok((threshold, table)) => {
            println!("Products at or below {threshold} unit(s):");
            println!("{table}");
        },
        Err(e) => eprintln!("Error fetching low stock products: {e}"),
    }
}
