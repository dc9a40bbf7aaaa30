//! # Database management and control.
//!
//! This module provides the interfaces that define the interface contracts of the point-of-sale engine database
//! *backends*.
//!
//! ## The ledger and the cache
//! Every stock movement is recorded as a row in the append-only inventory ledger. The `stock_quantity` column on
//! the product row is a cache of the ledger's non-reservation sum, maintained in the same transaction as the ledger
//! write. The [`InventoryManagement`] trait exposes both views, and the reconciliation queries on
//! [`PosDatabase`] exist to detect and repair any drift between them.
//!
//! ## Traits
//! The module defines the behaviour that a database backend needs to expose in order to back the engine.
//!
//! * [`PosDatabase`] defines the highest level of behaviour: the order, payment, pickup and sweeper flows, each as
//!   a single atomic transaction.
//! * [`InventoryManagement`] covers the product catalogue and the stock ledger.
//! * [`OrderManagement`] provides read-only queries for orders and payments.
//! * [`MobileMoneyGateway`] is the one non-database trait here: the engine's view of the external payment provider.
mod data_objects;
mod gateway;
mod inventory_management;
mod order_management;
mod pos_database;

pub use data_objects::{NewOrderResult, ReconciliationReport, SettledPayment, StockCorrection, StockMismatch};
pub use gateway::{ChargeRequest, GatewayError, MobileMoneyGateway};
pub use inventory_management::{InventoryError, InventoryManagement};
pub use order_management::OrderManagement;
pub use pos_database::{PosDatabase, PosDatabaseError};
