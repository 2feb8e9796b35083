//! Report loading from files, images or inline text

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{IntakeError, OcrEngine};

/// Extensions routed through OCR
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Whether a file name refers to a report image
pub fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Where a report comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSource {
    Text(String),
    TextFile(PathBuf),
    ImageFile(PathBuf),
}

impl ReportSource {
    /// An existing path is read as a file; anything else is report text
    pub fn from_input(input: &str) -> Self {
        let path = Path::new(input);
        if path.is_file() {
            if is_image_name(input) {
                ReportSource::ImageFile(path.to_path_buf())
            } else {
                ReportSource::TextFile(path.to_path_buf())
            }
        } else {
            ReportSource::Text(input.to_string())
        }
    }

    /// Label for logs and upload file names
    pub fn label(&self) -> String {
        match self {
            ReportSource::Text(_) => "report.md".to_string(),
            ReportSource::TextFile(path) | ReportSource::ImageFile(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "report.md".to_string()),
        }
    }

    /// Report text, recognizing images through `ocr`
    pub async fn load(&self, ocr: &dyn OcrEngine) -> Result<String, IntakeError> {
        match self {
            ReportSource::Text(text) => Ok(text.clone()),
            ReportSource::TextFile(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|source| IntakeError::Io {
                    path: path.clone(),
                    source,
                })?;
                debug!("Read {} bytes from {}", bytes.len(), path.display());
                decode_text(&self.label(), bytes)
            }
            ReportSource::ImageFile(path) => {
                info!("Running {} OCR on {}", ocr.name(), path.display());
                ocr.recognize_file(path).await
            }
        }
    }
}

/// Uploaded or on-disk bytes as report text
pub fn decode_text(name: &str, bytes: Vec<u8>) -> Result<String, IntakeError> {
    String::from_utf8(bytes).map_err(|_| IntakeError::NotUtf8(name.to_string()))
}
