//! SQLite database module for the point-of-sale engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
