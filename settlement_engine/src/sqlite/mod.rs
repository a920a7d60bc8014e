//! SQLite backend for the settlement engine.
//!
//! The schema lives in `migrations/`. Merchant balances carry `CHECK (... >= 0)` constraints and finalized orders are
//! protected by a trigger, so the database itself refuses any write that would break the ledger.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
