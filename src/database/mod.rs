/*!
 * Durable storage for translation sessions.
 *
 * This module provides SQLite-based persistence behind the `KeyValueStore`
 * trait, plus an in-memory implementation for tests and ephemeral runs.
 */

pub mod schema;
pub mod connection;
pub mod store;

// Re-export main types
pub use connection::DatabaseConnection;
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
