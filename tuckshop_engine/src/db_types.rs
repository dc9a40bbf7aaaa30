use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use tuckshop_common::Cents;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------    OrderStatus      ---------------------------------------------------------
/// The fulfilment state of an order. Only the payment flows, the pickup flow and the sweepers move an order between
/// these states; there is no free-form status edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// The order has been placed and is waiting for payment.
    Pending,
    /// Payment has been received and the order is being prepared.
    Processing,
    /// The order is ready for collection.
    Ready,
    /// The order has been collected. Terminal.
    Completed,
    /// The order was abandoned, or its payment failed. Terminal.
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Processing => write!(f, "Processing"),
            OrderStatus::Ready => write!(f, "Ready"),
            OrderStatus::Completed => write!(f, "Completed"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Ready" => Ok(Self::Ready),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatus::Pending
        })
    }
}

//--------------------------------------   PaymentMethod     ---------------------------------------------------------
/// The closed set of supported payment methods. The variant determines when stock is committed: instant-pay methods
/// deduct stock when the order is placed, deferred-pay methods only reserve it until the payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Paid through the mobile-money provider. Stock is deducted at order time.
    MobileMoney,
    /// Paid at the counter. Stock is only reserved until the cashier takes payment.
    Cash,
}

impl PaymentMethod {
    /// True when the method commits stock at order time rather than at payment time.
    pub fn is_instant(&self) -> bool {
        matches!(self, PaymentMethod::MobileMoney)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::MobileMoney => write!(f, "MobileMoney"),
            PaymentMethod::Cash => write!(f, "Cash"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mobilemoney" | "mobile-money" | "mobile_money" | "mobile" => Ok(Self::MobileMoney),
            "cash" => Ok(Self::Cash),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment method: {value}. But this conversion cannot fail. Defaulting to Cash");
            PaymentMethod::Cash
        })
    }
}

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
/// The payment state of an order as a whole. Individual payment attempts carry a [`SettlementStatus`]; this field
/// summarises them on the order row. It only ever moves Pending → Completed or Pending → Failed; Refunded is
/// reserved for post-settlement reversals performed by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

//-------------------------------------- SettlementStatus    ---------------------------------------------------------
/// The settlement state of a single payment attempt. The mobile-money gateway reports its verdicts in the same
/// vocabulary, which is why this enum appears both on [`Payment`] rows and in the gateway trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SettlementStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementStatus::Pending => write!(f, "Pending"),
            SettlementStatus::Completed => write!(f, "Completed"),
            SettlementStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for SettlementStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid settlement status: {s}"))),
        }
    }
}

impl From<String> for SettlementStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid settlement status: {value}. But this conversion cannot fail. Defaulting to Pending");
            SettlementStatus::Pending
        })
    }
}

//--------------------------------------    LedgerReason     ---------------------------------------------------------
/// Why a ledger entry changed a product's stock. Entries are immutable once written, with one exception:
/// `Reservation` entries may be deleted (release) or have their reason rewritten to `Sale` (confirmation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerReason {
    /// Stock left the shop against a paid order.
    Sale,
    /// New stock arrived.
    Restock,
    /// A customer returned goods.
    Return,
    /// Stock is provisionally held for an unpaid order. Does not affect the cached counter.
    Reservation,
    /// Perishables written off past their use-by date.
    Expiration,
    /// Manual correction by an operator, or an automatic clamp by the reconciliation sweeper.
    Adjustment,
}

impl LedgerReason {
    /// Reservation entries are excluded when deriving the stock counter from the ledger.
    pub fn affects_stock(&self) -> bool {
        !matches!(self, LedgerReason::Reservation)
    }
}

impl Display for LedgerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerReason::Sale => write!(f, "Sale"),
            LedgerReason::Restock => write!(f, "Restock"),
            LedgerReason::Return => write!(f, "Return"),
            LedgerReason::Reservation => write!(f, "Reservation"),
            LedgerReason::Expiration => write!(f, "Expiration"),
            LedgerReason::Adjustment => write!(f, "Adjustment"),
        }
    }
}

impl FromStr for LedgerReason {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Sale" => Ok(Self::Sale),
            "Restock" => Ok(Self::Restock),
            "Return" => Ok(Self::Return),
            "Reservation" => Ok(Self::Reservation),
            "Expiration" => Ok(Self::Expiration),
            "Adjustment" => Ok(Self::Adjustment),
            s => Err(ConversionError(format!("Invalid ledger reason: {s}"))),
        }
    }
}

impl From<String> for LedgerReason {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid ledger reason: {value}. But this conversion cannot fail. Defaulting to Adjustment");
            LedgerReason::Adjustment
        })
    }
}

//--------------------------------------       Product       ---------------------------------------------------------
/// A catalogue item. `stock_quantity` is a cached counter owned by the inventory ledger: at any quiescent point it
/// equals the signed sum of the product's non-reservation ledger entries. Nothing writes it directly except the
/// ledger functions.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Cents,
    pub stock_quantity: i64,
    pub barcode: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self, threshold: i64) -> bool {
        self.stock_quantity <= threshold
    }
}

//--------------------------------------      NewProduct     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Cents,
    pub barcode: Option<String>,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Cents) -> Self {
        Self { name: name.into(), description: None, price, barcode: None }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_barcode<S: Into<String>>(mut self, barcode: S) -> Self {
        self.barcode = Some(barcode.into());
        self
    }
}

//--------------------------------------    ProductUpdate    ---------------------------------------------------------
/// A partial update to a product's catalogue fields. The stock counter is deliberately absent: stock moves through
/// the ledger, never through a catalogue edit.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Cents>,
    pub barcode: Option<String>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() &&
            self.description.is_none() &&
            self.price.is_none() &&
            self.barcode.is_none() &&
            self.is_active.is_none()
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_price(mut self, price: Cents) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_barcode<S: Into<String>>(mut self, barcode: S) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: String,
    pub status: OrderStatus,
    /// The sum of line-item price × quantity, frozen at order time.
    pub total_amount: Cents,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// The signed pickup payload. Written exactly once, inside the creation transaction.
    pub redemption_code: Option<String>,
    pub redemption_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_unpaid(&self) -> bool {
        self.payment_status.is_pending()
    }
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// The product price at the moment the order was placed. Never re-read from the live product.
    pub unit_price: Cents,
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The customer placing the order, as an opaque identifier owned by the calling layer.
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(customer_id: S, payment_method: PaymentMethod) -> Self {
        Self { customer_id: customer_id.into(), payment_method, items: Vec::new() }
    }

    pub fn with_item(mut self, product_id: i64, quantity: i64) -> Self {
        self.items.push(NewOrderItem { product_id, quantity });
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

//--------------------------------------       Payment       ---------------------------------------------------------
/// A single payment attempt against an order. A cash order may accumulate a failed attempt and a later completed
/// one, so there is no uniqueness constraint; the order's `payment_status` is the logical guard against double
/// settlement.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub amount: Cents,
    pub method: PaymentMethod,
    /// The transaction id assigned by the mobile-money provider, where applicable.
    pub txid: Option<String>,
    pub phone: Option<String>,
    pub status: SettlementStatus,
    /// Opaque provider metadata, stored as JSON text.
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     NewPayment      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: i64,
    pub amount: Cents,
    pub method: PaymentMethod,
    pub txid: Option<String>,
    pub phone: Option<String>,
    pub status: SettlementStatus,
    pub detail: Option<String>,
}

impl NewPayment {
    /// A mobile-money charge that has been accepted by the gateway but not yet settled.
    pub fn pending_mobile(order_id: i64, amount: Cents, txid: String, phone: String) -> Self {
        Self {
            order_id,
            amount,
            method: PaymentMethod::MobileMoney,
            txid: Some(txid),
            phone: Some(phone),
            status: SettlementStatus::Pending,
            detail: None,
        }
    }

    /// A cash payment taken at the counter. Settled immediately.
    pub fn completed_cash(order_id: i64, amount: Cents, detail: Option<String>) -> Self {
        Self {
            order_id,
            amount,
            method: PaymentMethod::Cash,
            txid: None,
            phone: None,
            status: SettlementStatus::Completed,
            detail,
        }
    }

    /// The failure record written when an order's payment window lapses.
    pub fn failed(order_id: i64, amount: Cents, method: PaymentMethod, detail: Option<String>) -> Self {
        Self { order_id, amount, method, txid: None, phone: None, status: SettlementStatus::Failed, detail }
    }
}

//--------------------------------------  InventoryLogEntry  ---------------------------------------------------------
/// One row of the append-only stock ledger. The ledger is the source of truth for reconciliation; the product's
/// `stock_quantity` is merely a cache of the non-reservation sum.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryLogEntry {
    pub id: i64,
    pub product_id: i64,
    /// Signed and non-zero. Negative for stock leaving the shop.
    pub quantity_change: i64,
    pub reason: LedgerReason,
    /// The order id for sales, reservations and returns.
    pub reference_id: Option<i64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   StockAdjustment   ---------------------------------------------------------
/// A manual stock-take correction. The engine computes the delta against the live counter and records it as an
/// `Adjustment` ledger entry, so even manual edits leave an audit trail.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub product_id: i64,
    pub new_quantity: i64,
    pub note: Option<String>,
}

impl StockAdjustment {
    pub fn new(product_id: i64, new_quantity: i64) -> Self {
        Self { product_id, new_quantity, note: None }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }
}
