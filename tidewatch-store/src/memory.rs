//! In-memory contact store
//!
//! Same semantics as the SQLite store without durability. Used by tests
//! and for throwaway servers.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use tidewatch_core::{Contact, StoredContact};

use crate::{ContactStore, SkipReason, StoreError, StoreOutcome};

/// Contacts held in process memory
#[derive(Debug, Default)]
pub struct MemoryContactStore {
    contacts: RwLock<Vec<StoredContact>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.read().is_empty()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn store(&self, contact: &Contact) -> Result<StoreOutcome, StoreError> {
        if let Some(reason) = SkipReason::for_contact(contact) {
            debug!("Skipping contact ({}): {}", reason, contact.vessel_type);
            return Ok(StoreOutcome::Skipped(reason));
        }

        let mut contacts = self.contacts.write();
        let id = contacts.len() as i64 + 1;
        contacts.push(StoredContact {
            id,
            contact: contact.clone(),
        });
        Ok(StoreOutcome::Stored(id))
    }

    async fn latest(&self) -> Result<Option<StoredContact>, StoreError> {
        Ok(self.contacts.read().last().cloned())
    }

    async fn all_valid(&self) -> Result<Vec<StoredContact>, StoreError> {
        Ok(self.contacts.read().clone())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_core::Coordinates;

    fn contact(kind: &str, position: Option<(f64, f64)>) -> Contact {
        Contact::new(kind, "2024-10-20T05:30:00Z")
            .with_position(position.map(|(lat, lon)| Coordinates::new(lat, lon)))
    }

    #[tokio::test]
    async fn test_latest_after_invalid_store() {
        let store = MemoryContactStore::new();
        store.store(&contact("c1", Some((1.0, 2.0)))).await.unwrap();
        store.store(&contact("c2", Some((3.0, 4.0)))).await.unwrap();
        let outcome = store.store(&contact("c3", None)).await.unwrap();

        assert!(!outcome.is_stored());
        assert_eq!(store.latest().await.unwrap().unwrap().contact.vessel_type, "c2");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_all_valid_in_insertion_order() {
        let store = MemoryContactStore::new();
        for name in ["a", "b", "c"] {
            store.store(&contact(name, Some((0.0, 0.0)))).await.unwrap();
        }
        let names: Vec<String> = store
            .all_valid()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.contact.vessel_type)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
