//! Vessel vocabulary and classifier
//!
//! The vocabulary is a TOML table of categories, each an ordered list of
//! phrases. Scan order matters: among equally long matches the phrase that
//! appears first in the table wins.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

use crate::{MULTIPLE_VESSELS_TYPE, UNKNOWN_VESSEL_TYPE};

const EMBEDDED_VOCABULARY: &str = include_str!("../data/vessels.toml");

/// Errors loading a vocabulary table
#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("Failed to read vocabulary {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid vocabulary table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Vocabulary table contains no phrases")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct VocabularyFile {
    #[serde(default)]
    category: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    name: String,
    #[serde(default)]
    phrases: Vec<String>,
}

/// One vocabulary phrase with its category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VesselPhrase {
    pub phrase: String,
    pub category: String,
    needle: String,
    char_len: usize,
}

impl VesselPhrase {
    fn new(phrase: &str, category: &str) -> Self {
        let phrase = phrase.trim().to_string();
        Self {
            needle: phrase.to_lowercase(),
            char_len: phrase.chars().count(),
            phrase,
            category: category.to_string(),
        }
    }
}

/// Ordered vessel vocabulary
#[derive(Debug, Clone, Default)]
pub struct VesselVocabulary {
    phrases: Vec<VesselPhrase>,
}

impl VesselVocabulary {
    /// Parse a vocabulary table, flattening categories in file order
    pub fn from_toml_str(content: &str) -> Result<Self, VocabularyError> {
        let file: VocabularyFile = toml::from_str(content)?;

        let phrases: Vec<VesselPhrase> = file
            .category
            .iter()
            .flat_map(|cat| {
                cat.phrases
                    .iter()
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| VesselPhrase::new(p, &cat.name))
            })
            .collect();

        if phrases.is_empty() {
            return Err(VocabularyError::Empty);
        }

        Ok(Self { phrases })
    }

    /// The vocabulary compiled into the crate
    pub fn load_embedded() -> Self {
        match Self::from_toml_str(EMBEDDED_VOCABULARY) {
            Ok(vocabulary) => vocabulary,
            Err(e) => {
                error!("Embedded vessel vocabulary is invalid: {}", e);
                Self::default()
            }
        }
    }

    /// Load a replacement vocabulary from disk
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, VocabularyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| VocabularyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let vocabulary = Self::from_toml_str(&content)?;
        info!("Loaded {} vessel phrases from {}", vocabulary.len(), path.display());
        Ok(vocabulary)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn phrases(&self) -> &[VesselPhrase] {
        &self.phrases
    }

    /// Longest vocabulary phrase contained in the segment
    pub fn longest_match(&self, segment: &str) -> Option<&VesselPhrase> {
        let lowered = segment.to_lowercase();
        let mut best: Option<&VesselPhrase> = None;

        for phrase in &self.phrases {
            if !lowered.contains(&phrase.needle) {
                continue;
            }
            // Strictly longer only, so earlier entries keep ties
            if best.map_or(true, |b| phrase.char_len > b.char_len) {
                best = Some(phrase);
            }
        }

        best
    }

    /// Vessel type for a segment, or `"unknown"`.
    ///
    /// A segment mentioning both "multiple" and "vessels" is always
    /// classified as `"multiple vessels"`.
    pub fn classify(&self, segment: &str) -> String {
        let lowered = segment.to_lowercase();
        if lowered.contains("multiple") && lowered.contains("vessels") {
            return MULTIPLE_VESSELS_TYPE.to_string();
        }

        self.longest_match(segment)
            .map(|p| p.phrase.clone())
            .unwrap_or_else(|| UNKNOWN_VESSEL_TYPE.to_string())
    }
}

/// Whether a classified type names an actual vessel
pub fn is_known_vessel_type(vessel_type: &str) -> bool {
    !vessel_type.is_empty() && vessel_type != UNKNOWN_VESSEL_TYPE
}
