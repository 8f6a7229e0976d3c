// Mirrorcheck Infrastructure - SQLite Adapter
// Implements: KeyValueStore (job records with per-key TTL)

mod connection;
mod kv_store;
mod migration;

pub use connection::{create_pool, database_url};
pub use kv_store::SqliteKvStore;
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
