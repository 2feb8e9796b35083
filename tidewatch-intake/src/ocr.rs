//! Image-to-text through an external OCR engine

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::IntakeError;

/// OCR engine configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Engine executable (default: tesseract)
    pub command: String,
    /// Language pack, e.g. "eng"
    pub language: Option<String>,
    /// Per-image timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            language: None,
            timeout_secs: 60,
        }
    }
}

/// Turns report images into text
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in an encoded image
    async fn recognize(&self, image: &[u8]) -> Result<String, IntakeError>;

    /// Recognize text in an image file
    async fn recognize_file(&self, path: &Path) -> Result<String, IntakeError> {
        let image = tokio::fs::read(path).await.map_err(|source| IntakeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.recognize(&image).await
    }

    /// Engine name
    fn name(&self) -> &str;
}

/// Tesseract CLI, fed through stdin and read from stdout
pub struct TesseractOcr {
    config: OcrConfig,
}

impl TesseractOcr {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("stdin").arg("stdout");
        if let Some(lang) = &self.config.language {
            cmd.arg("-l").arg(lang);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new(OcrConfig::default())
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String, IntakeError> {
        let mut child = self
            .command()
            .spawn()
            .map_err(|e| IntakeError::OcrUnavailable(format!("{}: {}", self.config.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| IntakeError::Ocr("engine stdin not captured".to_string()))?;
        let input = image.to_vec();
        // Feed concurrently so a full stdout pipe cannot stall the write
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| IntakeError::OcrTimeout(self.config.timeout_secs))?
            .map_err(|e| IntakeError::Ocr(e.to_string()))?;

        if let Ok(Err(e)) = writer.await {
            warn!("OCR engine closed its input early: {}", e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IntakeError::Ocr(format!(
                "{} exited with {}: {}",
                self.config.command,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR produced {} characters", text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Thread-safe reference to an OCR engine
pub type SharedOcr = Arc<dyn OcrEngine>;

/// Create a shared Tesseract engine
pub fn create_ocr(config: OcrConfig) -> SharedOcr {
    Arc::new(TesseractOcr::new(config))
}
