use clap::{Parser, Subcommand};

mod codes;
mod formatting;
mod orders;
mod payments;
mod products;
mod setup;
mod stock;
mod sweeps;

use crate::{
    codes::{handle_codes_command, CodesCommand},
    orders::{handle_orders_command, OrdersCommand},
    payments::{handle_pay_command, PayCommand},
    products::{handle_products_command, ProductsCommand},
    setup::{handle_setup_command, SetupCommand},
    stock::{handle_stock_command, StockCommand},
    sweeps::{handle_sweep_command, SweepCommand},
};

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Operator tools for the tuckshop point of sale")]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the product catalogue
    #[command(subcommand)]
    Products(ProductsCommand),
    /// Inspect and move stock
    #[command(subcommand)]
    Stock(StockCommand),
    /// Place, inspect and redeem orders
    #[command(subcommand)]
    Orders(OrdersCommand),
    /// Take and inspect payments
    #[command(subcommand)]
    Pay(PayCommand),
    /// Issue and check pickup codes
    #[command(subcommand)]
    Codes(CodesCommand),
    /// Run the maintenance sweeps off-schedule
    #[command(subcommand)]
    Sweep(SweepCommand),
    /// Local database setup. These commands assume that `TUCK_DATABASE_URL` is set and pointing to the location of
    /// the database.
    #[command(subcommand)]
    Setup(SetupCommand),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    log::debug!("🛠️ {cli:?}");
    match cli.command {
        Command::Products(cmd) => handle_products_command(cmd).await,
        Command::Stock(cmd) => handle_stock_command(cmd).await,
        Command::Orders(cmd) => handle_orders_command(cmd).await,
        Command::Pay(cmd) => handle_pay_command(cmd).await,
        Command::Codes(cmd) => handle_codes_command(cmd),
        Command::Sweep(cmd) => handle_sweep_command(cmd).await,
        Command::Setup(cmd) => handle_setup_command(cmd).await,
    }
}
