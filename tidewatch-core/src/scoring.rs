//! Confidence and significance scoring
//!
//! Confidence measures how complete a contact is, not how likely it is to
//! be real. Significance is driven by context keywords first and falls back
//! to confidence.

use crate::{is_known_vessel_type, ExtractedAttributes, Significance};

/// Confidence threshold below which a keyword-free contact is `uncertain`
pub const UNCERTAIN_BELOW: f64 = 0.5;

/// Per-attribute confidence weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights {
    pub coordinates: f64,
    pub speed: f64,
    pub heading: f64,
    pub known_type: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            coordinates: 0.3,
            speed: 0.2,
            heading: 0.2,
            known_type: 0.3,
        }
    }
}

impl ConfidenceWeights {
    /// Sum of the weights of present attributes, clamped to [0, 1]
    pub fn score(&self, attributes: &ExtractedAttributes, vessel_type: &str) -> f64 {
        let mut score = 0.0;
        if attributes.coordinates.is_some() {
            score += self.coordinates;
        }
        if attributes.speed.is_some() {
            score += self.speed;
        }
        if attributes.heading.is_some() {
            score += self.heading;
        }
        if is_known_vessel_type(vessel_type) {
            score += self.known_type;
        }
        score.clamp(0.0, 1.0)
    }
}

/// Context keyword detected in a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextTag {
    Illegal,
    Suspicious,
    Routine,
    Distress,
}

impl ContextTag {
    /// Scan order, which is also the order tags appear in descriptions
    pub const ALL: [ContextTag; 4] = [
        ContextTag::Illegal,
        ContextTag::Suspicious,
        ContextTag::Routine,
        ContextTag::Distress,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            ContextTag::Illegal => "illegal",
            ContextTag::Suspicious => "suspicious",
            ContextTag::Routine => "routine",
            ContextTag::Distress => "distress",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContextTag::Illegal => "illegal activity suspected",
            ContextTag::Suspicious => "suspicious behavior",
            ContextTag::Routine => "routine transit",
            ContextTag::Distress => "vessel in distress",
        }
    }
}

/// Every context keyword present in the segment (case-insensitive)
pub fn detect_context(segment: &str) -> Vec<ContextTag> {
    let lowered = segment.to_lowercase();
    ContextTag::ALL
        .into_iter()
        .filter(|tag| lowered.contains(tag.keyword()))
        .collect()
}

/// Triage a contact. Keyword rules outrank confidence, so a low-information
/// segment saying "routine" is still `Uncertain`.
pub fn classify_significance(context: &[ContextTag], confidence: f64) -> Significance {
    if context
        .iter()
        .any(|t| matches!(t, ContextTag::Illegal | ContextTag::Suspicious))
    {
        Significance::Suspicious
    } else if context.contains(&ContextTag::Distress) {
        Significance::Emergency
    } else if confidence < UNCERTAIN_BELOW {
        Significance::Uncertain
    } else {
        Significance::Routine
    }
}

/// Segment text with its context tags appended, e.g.
/// `"... [Context: suspicious behavior, vessel in distress]"`
pub fn annotate_description(segment: &str, context: &[ContextTag]) -> String {
    let trimmed = segment.trim();
    if context.is_empty() {
        return trimmed.to_string();
    }
    let labels: Vec<&str> = context.iter().map(ContextTag::label).collect();
    format!("{} [Context: {}]", trimmed, labels.join(", "))
}
