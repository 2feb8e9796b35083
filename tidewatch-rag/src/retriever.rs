//! Nearest-document lookup for incoming reports

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{create_embedder, EmbedderConfig, RagArtifacts, RagError, SharedEmbedder};

/// Retrieval settings
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Directory holding the index artifacts
    pub artifact_dir: PathBuf,
    /// OpenAI-compatible endpoint serving the embedding model
    pub embedding_url: Option<String>,
    /// Overrides the model recorded in `config.json`
    pub embedding_model: Option<String>,
    pub api_key: String,
    /// Documents returned per report
    pub top_k: usize,
    /// Upper bound on one embed-and-search call
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("rag"),
            embedding_url: None,
            embedding_model: None,
            api_key: EmbedderConfig::default().api_key,
            top_k: 3,
            timeout_secs: 3,
        }
    }
}

/// A document returned for a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    /// 1-based position in the result list
    pub rank: usize,
    /// Squared L2 distance to the query
    pub distance: f32,
    pub text: String,
    pub metadata: Map<String, Value>,
}

pub struct Retriever {
    artifacts: RagArtifacts,
    embedder: SharedEmbedder,
    top_k: usize,
    timeout: Duration,
}

impl Retriever {
    pub fn new(artifacts: RagArtifacts, embedder: SharedEmbedder) -> Self {
        let defaults = RetrievalConfig::default();
        Self {
            artifacts,
            embedder,
            top_k: defaults.top_k,
            timeout: Duration::from_secs(defaults.timeout_secs),
        }
    }

    /// Load artifacts and build the embedder they were indexed with
    pub fn from_config(config: &RetrievalConfig) -> Result<Self, RagError> {
        let artifacts = RagArtifacts::load(&config.artifact_dir)?;

        let model = config
            .embedding_model
            .clone()
            .unwrap_or_else(|| artifacts.config.embedding_model.clone());
        let embedder = create_embedder(EmbedderConfig {
            api_key: config.api_key.clone(),
            base_url: config.embedding_url.clone(),
            model,
        })?;

        Ok(Self::new(artifacts, embedder)
            .with_top_k(config.top_k)
            .with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn document_count(&self) -> usize {
        self.artifacts.documents.len()
    }

    /// The `k` documents nearest to `text`, closest first
    pub async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<RetrievedDocument>, RagError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(text).await?;
        let hits = self.artifacts.index.search(&query, k)?;

        let docs = hits
            .into_iter()
            .enumerate()
            .filter_map(|(i, (distance, pos))| {
                self.artifacts.documents.get(pos).map(|doc| RetrievedDocument {
                    rank: i + 1,
                    distance,
                    text: doc.text.clone(),
                    metadata: doc.metadata.clone(),
                })
            })
            .collect::<Vec<_>>();

        debug!("Retrieved {} documents via {}", docs.len(), self.embedder.model_name());
        Ok(docs)
    }

    /// Retrieval that never fails the caller: errors and timeouts are
    /// logged and yield no documents.
    pub async fn related(&self, text: &str) -> Vec<RetrievedDocument> {
        match tokio::time::timeout(self.timeout, self.retrieve(text, self.top_k)).await {
            Ok(Ok(docs)) => docs,
            Ok(Err(e)) => {
                warn!("Retrieval failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("Retrieval timed out after {:?}", self.timeout);
                Vec::new()
            }
        }
    }
}

/// Thread-safe reference to a retriever
pub type SharedRetriever = Arc<Retriever>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, Embedder, FlatL2Index, IndexConfig};
    use async_trait::async_trait;

    /// Maps text to `[len, 0]` so distances are predictable
    struct LengthEmbedder {
        dim: usize,
    }

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
            let mut v = vec![0.0; self.dim];
            v[0] = text.len() as f32;
            Ok(v)
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![0.0, 0.0])
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    fn artifacts() -> RagArtifacts {
        let doc = |text: &str| Document {
            text: text.to_string(),
            metadata: Map::from_iter([("source".to_string(), Value::from(text))]),
        };
        RagArtifacts {
            config: IndexConfig {
                embedding_model: "length".to_string(),
                embedding_dim: 2,
            },
            index: FlatL2Index::new(2, vec![vec![1.0, 0.0], vec![5.0, 0.0], vec![20.0, 0.0]])
                .unwrap(),
            documents: vec![doc("a"), doc("abcde"), doc("long")],
        }
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_distance() {
        let retriever = Retriever::new(artifacts(), Arc::new(LengthEmbedder { dim: 2 }));

        let docs = retriever.retrieve("abcd", 2).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].rank, 1);
        assert_eq!(docs[0].text, "abcde");
        assert_eq!(docs[0].distance, 1.0);
        assert_eq!(docs[1].text, "a");
        assert_eq!(docs[1].metadata["source"], "a");

        assert_eq!(retriever.retrieve("abcd", 50).await.unwrap().len(), 3);
        assert!(retriever.retrieve("abcd", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_query_error() {
        let retriever = Retriever::new(artifacts(), Arc::new(LengthEmbedder { dim: 3 }));
        assert!(matches!(
            retriever.retrieve("abc", 1).await,
            Err(RagError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(retriever.related("abc").await.is_empty());
    }

    #[tokio::test]
    async fn test_related_times_out() {
        let retriever = Retriever::new(artifacts(), Arc::new(SlowEmbedder))
            .with_timeout(Duration::from_millis(20));
        assert!(retriever.related("abc").await.is_empty());
    }

    #[test]
    fn test_from_config_requires_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = RetrievalConfig {
            artifact_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(Retriever::from_config(&config), Err(RagError::Io { .. })));
    }
}
