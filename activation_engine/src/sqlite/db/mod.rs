//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are plain functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction and pass `&mut *tx`.
//!
//! SQLite takes its writer lock lazily. Multi-statement transactions in [`super::SqliteDatabase`] therefore always
//! start with a write (usually the status compare-and-swap), so that two concurrent writers queue on the busy
//! timeout instead of both reading and then failing to upgrade.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod catalog;
pub mod effects;
pub mod ledgers;
pub mod settlements;
pub mod transactions;
pub mod webhooks;

const SQLITE_DB_URL: &str = "sqlite://data/activation_engine.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(15);

pub fn db_url() -> String {
    let result = env::var("TAE_DATABASE_URL").unwrap_or_else(|_| {
        info!("TAE_DATABASE_URL is not set. Using the default.");
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

/// True if the error is a unique-key or primary-key violation.
pub(crate) fn is_unique_violation(e: &SqlxError) -> bool {
    match e {
        SqlxError::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Renders statuses as a quoted SQL list, e.g. `'pending','flagged'`. Only ever fed from enum `Display` values.
pub(crate) fn sql_list<T: std::fmt::Display>(values: &[T]) -> String {
    values.iter().map(|v| format!("'{v}'")).collect::<Vec<String>>().join(",")
}
