//! Ingest Service
//!
//! Drives one report through the pipeline: extract contacts, persist each
//! in order, and broadcast the ones that were stored. Per-contact failures
//! are logged and counted; they never fail the report.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use tidewatch_core::{report_fingerprint, ContactAssembler, StoredContact};
use tidewatch_intake::{decode_text, is_image_name, SharedOcr};
use tidewatch_rag::{RetrievedDocument, SharedRetriever};
use tidewatch_store::{SharedStore, StoreOutcome};

use crate::{DistributionHub, IngestError};

/// Receipt for one processed report
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestOutcome {
    /// Contacts produced by extraction
    pub extracted: usize,
    pub stored: usize,
    /// Contacts without a complete position
    pub skipped: usize,
    /// Contacts lost to store errors
    pub failed: usize,
    /// Successful subscriber deliveries
    pub delivered: usize,
    pub related_documents: Vec<RetrievedDocument>,
}

pub struct IngestService {
    assembler: ContactAssembler,
    store: SharedStore,
    hub: Arc<DistributionHub>,
    ocr: SharedOcr,
    retriever: Option<SharedRetriever>,
}

impl IngestService {
    pub fn new(
        assembler: ContactAssembler,
        store: SharedStore,
        hub: Arc<DistributionHub>,
        ocr: SharedOcr,
    ) -> Self {
        Self {
            assembler,
            store,
            hub,
            ocr,
            retriever: None,
        }
    }

    pub fn with_retriever(mut self, retriever: SharedRetriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn hub(&self) -> &Arc<DistributionHub> {
        &self.hub
    }

    /// Process report text end to end
    pub async fn ingest_text(&self, text: &str) -> IngestOutcome {
        let fingerprint = report_fingerprint(text);
        let contacts = self.assembler.extract_report(text);

        let mut outcome = IngestOutcome {
            extracted: contacts.len(),
            ..Default::default()
        };

        if let Some(retriever) = &self.retriever {
            outcome.related_documents = retriever.related(text).await;
        }

        for contact in &contacts {
            match self.store.store(contact).await {
                Ok(StoreOutcome::Stored(id)) => {
                    outcome.stored += 1;
                    debug!("Stored contact {} ({})", id, contact.vessel_type);
                    let stored = StoredContact {
                        id,
                        contact: contact.clone(),
                    };
                    outcome.delivered += self.hub.broadcast(&stored).await.delivered;
                }
                Ok(StoreOutcome::Skipped(reason)) => {
                    outcome.skipped += 1;
                    debug!("Skipped contact ({}): {}", reason, contact.vessel_type);
                }
                Err(e) => {
                    outcome.failed += 1;
                    error!("Error storing contact ({}): {}", contact.vessel_type, e);
                }
            }
        }

        info!(
            "Report {}: {} extracted, {} stored, {} skipped, {} failed, {} related",
            fingerprint,
            outcome.extracted,
            outcome.stored,
            outcome.skipped,
            outcome.failed,
            outcome.related_documents.len()
        );
        outcome
    }

    /// Process an uploaded file. Images go through OCR; everything else
    /// must be UTF-8 text.
    pub async fn ingest_upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, IngestError> {
        let text = if is_image_name(filename) {
            info!("Running {} OCR on upload {}", self.ocr.name(), filename);
            self.ocr.recognize(&bytes).await?
        } else {
            decode_text(filename, bytes)?
        };

        Ok(self.ingest_text(&text).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tidewatch_core::Contact;
    use tidewatch_intake::{IntakeError, OcrEngine};
    use tidewatch_store::{ContactStore, MemoryContactStore, StoreError};

    struct FixedOcr(Result<&'static str, &'static str>);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn recognize(&self, _image: &[u8]) -> Result<String, IntakeError> {
            self.0
                .map(str::to_string)
                .map_err(|e| IntakeError::Ocr(e.to_string()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Refuses contacts of one vessel type
    struct FailingStore {
        inner: MemoryContactStore,
        reject: &'static str,
    }

    #[async_trait]
    impl ContactStore for FailingStore {
        async fn store(&self, contact: &Contact) -> Result<StoreOutcome, StoreError> {
            if contact.vessel_type == self.reject {
                return Err(StoreError::Corrupt {
                    id: 0,
                    reason: "disk full".to_string(),
                });
            }
            self.inner.store(contact).await
        }

        async fn latest(&self) -> Result<Option<StoredContact>, StoreError> {
            self.inner.latest().await
        }

        async fn all_valid(&self) -> Result<Vec<StoredContact>, StoreError> {
            self.inner.all_valid().await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn backend(&self) -> &str {
            "failing"
        }
    }

    fn service(store: SharedStore, ocr: FixedOcr) -> IngestService {
        IngestService::new(
            ContactAssembler::default(),
            store,
            Arc::new(DistributionHub::new()),
            Arc::new(ocr),
        )
    }

    const REPORT: &str = "1. Tanker at 10°00'N, 20°00'E making 8 knots.\n2. Yacht at 11°00'N, 21°00'E.\n3. Fishing boat, position unknown.";

    #[tokio::test]
    async fn test_ingest_counts_and_broadcasts() {
        let store: SharedStore = Arc::new(MemoryContactStore::new());
        let service = service(store.clone(), FixedOcr(Ok("")));
        let (_id, mut rx) = service.hub().connect_channel(8);

        let outcome = service.ingest_text(REPORT).await;
        assert_eq!(outcome.extracted, 3);
        assert_eq!(outcome.stored, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.delivered, 2);
        assert!(outcome.related_documents.is_empty());

        let first: StoredContact = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.contact.vessel_type, "tanker");
        let second: StoredContact = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(second, store.latest().await.unwrap().unwrap());
        assert_eq!(store.all_valid().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_drops_only_that_contact() {
        let store: SharedStore = Arc::new(FailingStore {
            inner: MemoryContactStore::new(),
            reject: "tanker",
        });
        let service = service(store.clone(), FixedOcr(Ok("")));

        let outcome = service.ingest_text(REPORT).await;
        assert_eq!(outcome.extracted, 3);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.stored, 1);
        assert_eq!(outcome.skipped, 1);

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.contact.vessel_type, "yacht");
    }

    #[tokio::test]
    async fn test_empty_report_is_zero_contacts() {
        let service = service(Arc::new(MemoryContactStore::new()), FixedOcr(Ok("")));
        let outcome = service.ingest_upload("report.md", b"   ".to_vec()).await.unwrap();
        assert_eq!(outcome.extracted, 0);
    }

    #[tokio::test]
    async fn test_upload_routing() {
        let service = service(
            Arc::new(MemoryContactStore::new()),
            FixedOcr(Ok("Tanker at 10°00'N, 20°00'E.")),
        );

        let outcome = service.ingest_upload("scan.png", vec![0u8; 8]).await.unwrap();
        assert_eq!(outcome.stored, 1);

        let err = service
            .ingest_upload("report.md", vec![0xff, 0xfe])
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ocr_failure_fails_report() {
        let store: SharedStore = Arc::new(MemoryContactStore::new());
        let service = service(store.clone(), FixedOcr(Err("unreadable")));

        let err = service.ingest_upload("scan.tif", vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, IngestError::Intake(IntakeError::Ocr(_))));
        assert!(store.all_valid().await.unwrap().is_empty());
    }
}
