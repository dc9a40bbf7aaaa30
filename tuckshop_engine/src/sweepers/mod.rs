//! Background sweepers.
//!
//! The synchronous order and payment paths leave two kinds of debris behind: unpaid cash orders whose redemption
//! window has lapsed, and drift between the cached stock counters and the ledger they are derived from. Each sweeper
//! runs as an independent periodic task against the same database the request path writes, so no instance
//! coordination is needed; the conditional updates in the storage layer make a sweep that races a live payment
//! settle harmlessly.
//!
//! * [`start_expiry_sweeper`] cancels unpaid cash orders whose redemption code has expired and releases their stock
//!   holds.
//! * [`start_reconciliation_sweeper`] clamps oversold counters, purges stale reservation entries and reports any
//!   counter that no longer matches the ledger.
//!
//! The `run_*` functions each perform a single sweep and are what the periodic tasks call; they are public so that
//! operators can trigger an off-schedule sweep from the command line.

mod expiry;
mod reconciliation;

pub use expiry::run_expiry_sweep;
#[cfg(feature = "sqlite")]
pub use expiry::start_expiry_sweeper;
pub use reconciliation::run_reconciliation_sweep;
#[cfg(feature = "sqlite")]
pub use reconciliation::start_reconciliation_sweeper;
