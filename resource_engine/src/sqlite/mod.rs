//! SQLite backend for the legacy store.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
