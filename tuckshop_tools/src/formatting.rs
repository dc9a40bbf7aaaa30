use std::fmt::Write;

use anyhow::Result;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Cell,
    Row,
    Table,
};
use qrcode::{render::unicode, QrCode};
use tuckshop_engine::{
    db_types::{InventoryLogEntry, Order, Payment, Product},
    order_objects::PlacedOrder,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

fn markdown_style(table: &mut Table) {
    table.set_format(markdown_format());
}

pub fn format_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "No products in the catalogue".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["ID", "Name", "Price", "Stock", "Barcode", "Active", "Description"]);
    products.iter().for_each(|product| {
        table.add_row(product_to_row(product));
    });
    markdown_style(&mut table);
    table.to_string()
}

pub fn product_to_row(product: &Product) -> Row {
    Row::new(vec![
        Cell::new(&product.id.to_string()),
        Cell::new(&product.name),
        Cell::new(&product.price.to_string()),
        Cell::new(&product.stock_quantity.to_string()),
        Cell::new(product.barcode.as_deref().unwrap_or_default()),
        Cell::new(if product.is_active { "yes" } else { "no" }),
        Cell::new(product.description.as_deref().unwrap_or_default()),
    ])
}

pub fn format_orders(orders: &[Order]) -> String {
    if orders.is_empty() {
        return "No orders".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["ID", "Customer", "Total", "Method", "Status", "Payment", "Expires", "Created At"]);
    orders.iter().for_each(|order| {
        table.add_row(order_to_row(order));
    });
    markdown_style(&mut table);
    table.to_string()
}

pub fn order_to_row(order: &Order) -> Row {
    Row::new(vec![
        Cell::new(&order.id.to_string()),
        Cell::new(&order.customer_id),
        Cell::new(&order.total_amount.to_string()),
        Cell::new(&order.payment_method.to_string()),
        Cell::new(&order.status.to_string()),
        Cell::new(&order.payment_status.to_string()),
        Cell::new(&order.redemption_expires_at.map(|t| t.to_string()).unwrap_or_default()),
        Cell::new(&order.created_at.to_string()),
    ])
}

pub fn format_payments(payments: &[Payment]) -> String {
    if payments.is_empty() {
        return "No payments recorded".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["ID", "Order", "Amount", "Method", "Status", "TX id", "Phone", "Detail", "Created At"]);
    payments.iter().for_each(|payment| {
        table.add_row(payment_to_row(payment));
    });
    markdown_style(&mut table);
    table.to_string()
}

pub fn payment_to_row(payment: &Payment) -> Row {
    Row::new(vec![
        Cell::new(&payment.id.to_string()),
        Cell::new(&payment.order_id.to_string()),
        Cell::new(&payment.amount.to_string()),
        Cell::new(&payment.method.to_string()),
        Cell::new(&payment.status.to_string()),
        Cell::new(payment.txid.as_deref().unwrap_or_default()),
        Cell::new(payment.phone.as_deref().unwrap_or_default()),
        Cell::new(payment.detail.as_deref().unwrap_or_default()),
        Cell::new(&payment.created_at.to_string()),
    ])
}

pub fn format_history(entries: &[InventoryLogEntry]) -> String {
    if entries.is_empty() {
        return "No ledger entries".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["ID", "Change", "Reason", "Order", "Note", "Recorded At"]);
    entries.iter().for_each(|entry| {
        table.add_row(entry_to_row(entry));
    });
    markdown_style(&mut table);
    table.to_string()
}

pub fn entry_to_row(entry: &InventoryLogEntry) -> Row {
    Row::new(vec![
        Cell::new(&entry.id.to_string()),
        Cell::new(&format!("{:+}", entry.quantity_change)),
        Cell::new(&entry.reason.to_string()),
        Cell::new(&entry.reference_id.map(|id| id.to_string()).unwrap_or_default()),
        Cell::new(entry.note.as_deref().unwrap_or_default()),
        Cell::new(&entry.created_at.to_string()),
    ])
}

pub fn format_placed_order(placed: &PlacedOrder) -> Result<String> {
    let mut f = String::new();
    let order = &placed.order;
    writeln!(f, "=========================================================================")?;
    writeln!(f, "Order #{} for {} ({})", order.id, order.customer_id, order.payment_method)?;
    writeln!(f, "Status: {} / payment {}", order.status, order.payment_status)?;
    writeln!(f, "Total: {}", order.total_amount)?;
    if let Some(expiry) = order.redemption_expires_at {
        writeln!(f, "Pickup code valid until: {expiry}")?;
    }
    writeln!(f, "=========================================================================")?;
    let mut table = Table::new();
    table.set_titles(row!["Product", "Qty", "Unit price", "Line total"]);
    for item in &placed.items {
        table.add_row(Row::new(vec![
            Cell::new(&item.product_id.to_string()),
            Cell::new(&item.quantity.to_string()),
            Cell::new(&item.unit_price.to_string()),
            Cell::new(&(item.unit_price * item.quantity).to_string()),
        ]));
    }
    markdown_style(&mut table);
    writeln!(f, "{table}")?;
    if let Some(payload) = &order.redemption_code {
        writeln!(f, "Pickup code:\n{payload}")?;
        writeln!(f, "{}", qr_code_string(payload))?;
    }
    Ok(f)
}

/// Renders a pickup payload as a terminal QR code. An empty string if the payload does not fit in a QR code.
pub fn qr_code_string(payload: &str) -> String {
    QrCode::new(payload)
        .map(|code| {
            code.render::<unicode::Dense1x2>()
                .dark_color(unicode::Dense1x2::Dark)
                .light_color(unicode::Dense1x2::Light)
                .quiet_zone(false)
                .build()
        })
        .unwrap_or_default()
}
