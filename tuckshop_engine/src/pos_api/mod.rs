//! # Tuckshop engine public API
//!
//! The `pos_api` module exposes the programmatic API for the tuckshop engine.
//! The API is modular, so that clients of the API can pick and choose the functionality they want.
//! Different parts (e.g. the sales counter and the stockroom terminal) can be configured on different machines, as
//! long as they point at the same database.
//!
//! * [`order_flow_api`] is the primary API for placing orders and redeeming pickup codes.
//! * [`payments_api`] settles payments: initiating and verifying mobile-money charges, and recording cash handed over
//!   at the counter.
//! * [`inventory_api`] provides methods for managing the product catalogue and the stock ledger, including manual
//!   adjustments, restocks, write-offs and returns.
//!
//! The other submodules in this module are support types.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! For example, to create an API instance to query the stock ledger:
//!
//! ```rust,ignore
//! use tuckshop_engine::{InventoryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements InventoryManagement
//! let api = InventoryApi::new(db);
//! // use the api to access information
//! let history = api.history(product_id, 50).await?;
//! ```

pub mod errors;
pub mod inventory_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payments_api;
