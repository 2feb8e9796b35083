//! Common interface for contact stores

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use tidewatch_core::{Contact, StoredContact};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Why a contact was not persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingLatitude,
    MissingLongitude,
    MissingCoordinates,
}

impl SkipReason {
    /// Reason a contact is not storable, if any
    pub fn for_contact(contact: &Contact) -> Option<Self> {
        match (contact.latitude, contact.longitude) {
            (Some(_), Some(_)) => None,
            (None, Some(_)) => Some(SkipReason::MissingLatitude),
            (Some(_), None) => Some(SkipReason::MissingLongitude),
            (None, None) => Some(SkipReason::MissingCoordinates),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::MissingLatitude => "missing latitude",
            SkipReason::MissingLongitude => "missing longitude",
            SkipReason::MissingCoordinates => "missing coordinates",
        };
        f.write_str(reason)
    }
}

/// Result of a store call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Persisted under this row id
    Stored(i64),
    /// Not persisted; the contact is not a navigable position
    Skipped(SkipReason),
}

impl StoreOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, StoreOutcome::Stored(_))
    }
}

/// Append-only log of contacts.
///
/// Only contacts with both coordinates are persisted. Each `store` is
/// atomic: readers see a contact completely or not at all.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Persist a valid contact, or report why it was skipped
    async fn store(&self, contact: &Contact) -> Result<StoreOutcome, StoreError>;

    /// Most recently committed valid contact
    async fn latest(&self) -> Result<Option<StoredContact>, StoreError>;

    /// Every valid contact in insertion order
    async fn all_valid(&self) -> Result<Vec<StoredContact>, StoreError>;

    /// Check the backing storage is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend name for logs and health output
    fn backend(&self) -> &str;
}
