//! SQLite backend for the activation engine.
//!
//! Migrations live in `migrations/` next to this module and are embedded with `sqlx::migrate!`.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
