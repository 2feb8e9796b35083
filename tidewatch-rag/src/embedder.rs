//! Embedding backend abstraction
//!
//! Supports any OpenAI-compatible `/embeddings` endpoint, including local
//! servers hosting the model the index was built with.

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use std::sync::Arc;

use crate::RagError;

/// Generic text embedding trait
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a fixed-size vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible embedding backend configuration
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    /// API key (local servers usually accept anything)
    pub api_key: String,
    /// Base URL (for local servers, proxies, etc.)
    pub base_url: Option<String>,
    /// Model name
    pub model: String,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: "sk-local".to_string(),
            base_url: None,
            model: "BAAI/bge-small-en-v1.5".to_string(),
        }
    }
}

impl EmbedderConfig {
    pub fn local(base_url: &str, model: &str) -> Self {
        Self {
            base_url: Some(base_url.to_string()),
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = api_key.to_string();
        self
    }
}

/// OpenAI-compatible embedding backend
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    config: EmbedderConfig,
}

impl OpenAIEmbedder {
    pub fn new(config: EmbedderConfig) -> Result<Self, RagError> {
        if config.model.trim().is_empty() {
            return Err(RagError::Config("embedding model name is empty".to_string()));
        }

        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        let client = Client::with_config(openai_config);

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.config.model)
            .input(text.to_string())
            .build()
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or(RagError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Thread-safe reference to an embedding backend
pub type SharedEmbedder = Arc<dyn Embedder>;

/// Create a shared OpenAI-compatible embedder
pub fn create_embedder(config: EmbedderConfig) -> Result<SharedEmbedder, RagError> {
    Ok(Arc::new(OpenAIEmbedder::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_config() {
        let config = EmbedderConfig::local("http://127.0.0.1:8080/v1", "bge-small");
        assert_eq!(config.base_url.as_deref(), Some("http://127.0.0.1:8080/v1"));
        assert_eq!(config.model, "bge-small");
    }

    #[test]
    fn test_empty_model_rejected() {
        let config = EmbedderConfig::local("http://127.0.0.1:8080/v1", " ");
        assert!(matches!(OpenAIEmbedder::new(config), Err(RagError::Config(_))));
    }

    #[test]
    fn test_create_embedder() {
        let embedder = create_embedder(EmbedderConfig::default()).unwrap();
        assert_eq!(embedder.model_name(), "BAAI/bge-small-en-v1.5");
    }
}
