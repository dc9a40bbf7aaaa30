use anyhow::Result;
use clap::{Args, Subcommand};
use tuckshop_common::Cents;
use tuckshop_engine::{
    db_types::{NewProduct, ProductUpdate},
    traits::InventoryManagement,
    SqliteDatabase,
};

use crate::formatting::{format_history, format_products};

#[derive(Debug, Subcommand)]
pub enum ProductsCommand {
    /// Add a product to the catalogue
    Add(AddProductParams),
    /// List the catalogue
    List {
        /// Include delisted products
        #[arg(short, long)]
        all: bool,
    },
    /// Show one product together with its recent ledger history
    Show {
        #[arg(required = true, index = 1)]
        id: i64,
    },
    /// Update a product's catalogue fields. Stock is not edited here; use the stock commands instead.
    Update(UpdateProductParams),
}

#[derive(Debug, Args)]
pub struct AddProductParams {
    #[arg(required = true, index = 1)]
    pub name: String,
    /// The unit price, e.g. 2.50 or $2.50
    #[arg(required = true, index = 2)]
    pub price: Cents,
    /// Units already on the shelf
    #[arg(short, long, default_value_t = 0)]
    pub stock: i64,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub barcode: Option<String>,
}

#[derive(Debug, Args)]
pub struct UpdateProductParams {
    #[arg(required = true, index = 1)]
    pub id: i64,
    #[arg(short, long)]
    pub name: Option<String>,
    #[arg(short, long)]
    pub price: Option<Cents>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub barcode: Option<String>,
    /// `true` to list the product, `false` to delist it
    #[arg(short, long)]
    pub active: Option<bool>,
}

pub async fn handle_products_command(command: ProductsCommand) {
    match command {
        ProductsCommand::Add(params) => add_product(params).await,
        ProductsCommand::List { all } => list_products(all).await,
        ProductsCommand::Show { id } => show_product(id).await,
        ProductsCommand::Update(params) => update_product(params).await,
    }
}

async fn add_product(params: AddProductParams) {
    async fn add(params: AddProductParams) -> Result<()> {
        let db = SqliteDatabase::new(1).await?;
        let mut product = NewProduct::new(params.name, params.price);
        if let Some(description) = params.description {
            product = product.with_description(description);
        }
        if let Some(barcode) = params.barcode {
            product = product.with_barcode(barcode);
        }
        let product = db.add_product(product, params.stock).await?;
        println!(
            "Added product #{}: {} at {} ({} in stock)",
            product.id, product.name, product.price, product.stock_quantity
        );
        Ok(())
    }
    if let Err(e) = add(params).await {
        eprintln!("Error adding product: {e}");
    }
}

async fn list_products(all: bool) {
    async fn list(all: bool) -> Result<String> {
        let db = SqliteDatabase::new(1).await?;
        let products = db.fetch_products(!all).await?;
        Ok(format_products(&products))
    }
    match list(all).await {
        Ok(table) => println!("{table}"),
        Err(e) => eprintln!("Error listing products: {e}"),
    }
}

async fn show_product(id: i64) {
    async fn show(id: i64) -> Result<String> {
        let db = SqliteDatabase::new(1).await?;
        let product = match db.fetch_product(id).await? {
            Some(product) => product,
            None => return Ok(format!("Product #{id} does not exist")),
        };
        let history = db.history(id, 10).await?;
        let mut out = format_products(std::slice::from_ref(&product));
        out.push_str("\nRecent ledger entries:\n");
        out.push_str(&format_history(&history));
        Ok(out)
    }
    match show(id).await {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Error fetching product #{id}: {e}"),
    }
}

async fn update_product(params: UpdateProductParams) {
    async fn update(params: UpdateProductParams) -> Result<String> {
        let mut change = ProductUpdate::default();
        if let Some(name) = params.name {
            change = change.with_name(name);
        }
        if let Some(price) = params.price {
            change = change.with_price(price);
        }
        if let Some(description) = params.description {
            change = change.with_description(description);
        }
        if let Some(barcode) = params.barcode {
            change = change.with_barcode(barcode);
        }
        if let Some(active) = params.active {
            change = change.with_active(active);
        }
        let db = SqliteDatabase::new(1).await?;
        let product = db.update_product(params.id, change).await?;
        Ok(format_products(std::slice::from_ref(&product)))
    }
    let id = params.id;
    match update(params).await {
        Ok(table) => println!("{table}"),
        Err(e) => eprintln!("Error updating product #{id}: {e}"),
    }
}
