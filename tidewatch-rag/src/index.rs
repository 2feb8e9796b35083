//! Pre-built vector index and its document sidecar
//!
//! The index is produced offline and is read-only here. An artifact
//! directory holds:
//! - `config.json`: embedding model name and dimension
//! - `maritime.index.json`: `{ "dim": n, "vectors": [[..], ..] }`
//! - `documents.json`: documents aligned with the vectors by position

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

use crate::RagError;

pub const CONFIG_FILE: &str = "config.json";
pub const INDEX_FILE: &str = "maritime.index.json";
pub const DOCUMENTS_FILE: &str = "documents.json";

/// Build-time settings recorded next to the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub embedding_model: String,
    pub embedding_dim: usize,
}

/// A source document with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Exhaustive squared-L2 index over fixed-size vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatL2Index {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatL2Index {
    pub fn new(dim: usize, vectors: Vec<Vec<f32>>) -> Result<Self, RagError> {
        if dim == 0 {
            return Err(RagError::Config("index dimension must be positive".to_string()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(RagError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        Ok(Self { dim, vectors })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The `k` nearest vectors as `(squared distance, position)`, closest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(f32, usize)>, RagError> {
        if query.len() != self.dim {
            return Err(RagError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(pos, v)| (squared_l2(query, v), pos))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);
        Ok(scored)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Everything loaded from an artifact directory
#[derive(Debug, Clone)]
pub struct RagArtifacts {
    pub config: IndexConfig,
    pub index: FlatL2Index,
    pub documents: Vec<Document>,
}

impl RagArtifacts {
    /// Load and cross-check the artifacts. Any failure here means
    /// retrieval is unavailable for the process lifetime.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, RagError> {
        let dir = dir.as_ref();

        let config: IndexConfig = read_json(&dir.join(CONFIG_FILE))?;
        let index: FlatL2Index = read_json(&dir.join(INDEX_FILE))?;
        let documents: Vec<Document> = read_json(&dir.join(DOCUMENTS_FILE))?;

        // Deserialization bypasses `new`, so revalidate
        let index = FlatL2Index::new(index.dim, index.vectors).map_err(|e| RagError::Artifact {
            path: dir.join(INDEX_FILE),
            reason: e.to_string(),
        })?;

        if index.dim() != config.embedding_dim {
            return Err(RagError::Artifact {
                path: dir.join(CONFIG_FILE),
                reason: format!(
                    "embedding_dim {} does not match index dimension {}",
                    config.embedding_dim,
                    index.dim()
                ),
            });
        }

        if index.len() != documents.len() {
            return Err(RagError::Artifact {
                path: dir.join(DOCUMENTS_FILE),
                reason: format!(
                    "{} documents for {} index vectors",
                    documents.len(),
                    index.len()
                ),
            });
        }

        info!(
            "Loaded retrieval index: {} documents, dim {}, model {}",
            documents.len(),
            index.dim(),
            config.embedding_model
        );

        Ok(Self {
            config,
            index,
            documents,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RagError> {
    let content = std::fs::read_to_string(path).map_err(|source| RagError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| RagError::Artifact {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
