//! Client for a remote Tidewatch server
//!
//! Uploads reports to the processing endpoint and reads server health.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::IntakeError;

/// Push client configuration
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Server base URL (default: http://localhost:8000)
    pub server_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

const USER_AGENT: &str = concat!("tidewatch/", env!("CARGO_PKG_VERSION"));

pub struct PushClient {
    client: Client,
    base_url: String,
}

impl PushClient {
    pub fn new(config: &PushConfig) -> Result<Self, IntakeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IntakeError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Upload a markdown report as the multipart field `file`
    pub async fn upload_report(&self, filename: &str, report: String) -> Result<Value, IntakeError> {
        let part = Part::text(report)
            .file_name(filename.to_string())
            .mime_str("text/markdown")?;
        let form = Form::new().part("file", part);

        let url = self.endpoint("/process_report/");
        info!("Uploading {} to {}", filename, url);

        let response = self.client.post(&url).multipart(form).send().await?;
        Self::json_reply(response).await
    }

    /// Fetch the server's health document
    pub async fn health(&self) -> Result<Value, IntakeError> {
        let response = self.client.get(self.endpoint("/health")).send().await?;
        Self::json_reply(response).await
    }

    async fn json_reply(response: reqwest::Response) -> Result<Value, IntakeError> {
        let status = response.status();
        let body = response.text().await?;
        debug!("Server replied {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(IntakeError::Server {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|_| IntakeError::Server {
            status: status.as_u16(),
            body,
        })
    }
}
