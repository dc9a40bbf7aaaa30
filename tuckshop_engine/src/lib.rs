//! Tuckshop Engine
//!
//! The engine keeps four mutable facts about a point-of-sale counter consistent under concurrent use: order status,
//! payment status, the per-product stock counter, and the append-only inventory ledger that the counter is derived
//! from. It does so without any shared in-process state; the transactional database is the single point of
//! synchronization, so several service instances can run against the same store.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`] and the backend traits). SQLite is the bundled backend. You
//!    should never need to access the database directly. Instead, use the public API provided by the engine. The
//!    exception is the data types used in the database. These are defined in the `db_types` module and are public.
//! 2. The engine public API ([`OrderFlowApi`], [`PaymentsApi`], [`InventoryApi`]). This provides the public-facing
//!    functionality: placing orders, settling mobile-money and cash payments, redeeming pickup codes, and auditing or
//!    correcting the stock ledger. Specific backends need to implement the traits in the [`mod@traits`] module in
//!    order to act as a backend for the engine.
//! 3. Background sweepers ([`mod@sweepers`]): the expiry sweeper reverses abandoned cash orders, and the
//!    reconciliation sweeper repairs drift between the stock counters and the ledger.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted when certain actions
//! occur within the engine. For example, when a new order is placed, an `OrderCreatedEvent` is emitted. A simple
//! actor framework is used so that you can easily hook into these events and perform custom actions, such as sending
//! notifications.
mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
mod pos_api;
pub mod sweepers;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::PosConfig;
pub use pos_api::{
    errors::{OrderFlowError, PaymentFlowError},
    inventory_api::InventoryApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    payments_api::PaymentsApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
