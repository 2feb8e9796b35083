//! Tidewatch Store - durable log of contacts
//!
//! Provides the [`ContactStore`] interface with two backends:
//! - [`SqliteContactStore`]: one SQLite row per contact (sqlx)
//! - [`MemoryContactStore`]: process-local, for tests and throwaway runs
//!
//! Stores persist only valid contacts (both coordinates present) and
//! answer "latest" and "all valid" queries.

pub mod traits;
pub mod sqlite;
pub mod memory;

pub use traits::*;
pub use sqlite::*;
pub use memory::*;

/// Shared handle to any contact store
pub type SharedStore = std::sync::Arc<dyn ContactStore>;
