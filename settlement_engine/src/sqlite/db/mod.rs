//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! Merchant balances are only ever written by the functions in [`ledger`].
//!
//! Statements ending in `RETURNING` are always run with `fetch_all`. SQLite only finishes a statement, and commits its
//! implicit transaction, once it has been stepped to the end. `fetch_one` and `fetch_optional` stop after the first
//! row, which leaves the write uncommitted and the database locked while the connection sits in the pool.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod gateways;
pub mod ledger;
pub mod merchants;
pub mod transactions;

const SQLITE_DB_URL: &str = "sqlite://data/settlement.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("SGS_DATABASE_URL").unwrap_or_else(|_| {
        info!("SGS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
