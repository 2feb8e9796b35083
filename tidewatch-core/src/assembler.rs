//! Contact assembler
//!
//! Splits a free-form report into segments and turns each non-empty
//! segment into exactly one contact. Nothing in a segment can abort the
//! batch: missing or malformed attributes simply lower the confidence.

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::{
    annotate_description, classify_significance, detect_context, extract_timestamp,
    is_structured_report, parse_structured_report, ConfidenceWeights, Contact,
    ExtractedAttributes, VesselVocabulary,
};

// "1. ", "12.  " list markers or blank lines
static SEGMENT_SPLIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\d+\.\s+|\n\s*\n)").unwrap());

/// Non-empty segments of a report, in order
pub fn split_segments(text: &str) -> Vec<&str> {
    SEGMENT_SPLIT_REGEX
        .split(text)
        .filter(|segment| !segment.trim().is_empty())
        .collect()
}

/// Current time as an ISO-8601 string
pub fn generation_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Builds contacts from report text
#[derive(Debug, Clone)]
pub struct ContactAssembler {
    vocabulary: VesselVocabulary,
    weights: ConfidenceWeights,
}

impl Default for ContactAssembler {
    fn default() -> Self {
        Self::new(VesselVocabulary::load_embedded())
    }
}

impl ContactAssembler {
    pub fn new(vocabulary: VesselVocabulary) -> Self {
        Self {
            vocabulary,
            weights: ConfidenceWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: ConfidenceWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn vocabulary(&self) -> &VesselVocabulary {
        &self.vocabulary
    }

    /// One contact per non-empty segment, preserving segment order
    pub fn assemble(&self, text: &str) -> Vec<Contact> {
        let report_timestamp = extract_timestamp(text);

        let contacts: Vec<Contact> = split_segments(text)
            .into_iter()
            .map(|segment| {
                let timestamp = extract_timestamp(segment)
                    .or_else(|| report_timestamp.clone())
                    .unwrap_or_else(generation_timestamp);
                self.assemble_segment(segment, &timestamp)
            })
            .collect();

        debug!("Assembled {} contacts from report", contacts.len());
        contacts
    }

    /// Contacts from any report: structured blocks when present, prose otherwise
    pub fn extract_report(&self, text: &str) -> Vec<Contact> {
        if is_structured_report(text) {
            parse_structured_report(text)
        } else {
            self.assemble(text)
        }
    }

    /// Run extraction, classification and scoring over a single segment
    pub fn assemble_segment(&self, segment: &str, timestamp: &str) -> Contact {
        let attributes = ExtractedAttributes::from_segment(segment);
        let vessel_type = self.vocabulary.classify(segment);
        let confidence = self.weights.score(&attributes, &vessel_type);
        let context = detect_context(segment);
        let significance = classify_significance(&context, confidence);

        Contact::new(&vessel_type, timestamp)
            .with_position(attributes.coordinates)
            .with_speed(attributes.speed)
            .with_heading(attributes.heading)
            .with_confidence(confidence)
            .with_significance(significance)
            .with_description(&annotate_description(segment, &context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Significance;

    #[test]
    fn test_reference_segment() {
        let assembler = ContactAssembler::default();
        let contacts = assembler.assemble(
            "Unidentified vessel at 12°30'N, 45°15'E moving at 10 knots towards the northeast.",
        );

        assert_eq!(contacts.len(), 1);
        let c = &contacts[0];
        assert!((c.latitude.unwrap() - 12.5).abs() < 1e-9);
        assert!((c.longitude.unwrap() - 45.25).abs() < 1e-9);
        assert_eq!(c.speed, 10.0);
        assert_eq!(c.heading, Some(45.0));
        assert_eq!(c.vessel_type, "unidentified vessel");
        assert!((c.confidence - 1.0).abs() < 1e-9);
        assert_eq!(c.significance, Significance::Routine);
    }

    #[test]
    fn test_routine_without_details_is_uncertain() {
        let assembler = ContactAssembler::default();
        let contacts = assembler.assemble("Routine patrol, no further details.");

        let c = &contacts[0];
        assert!(!c.is_valid());
        assert_eq!(c.speed, 0.0);
        assert_eq!(c.heading, None);
        assert_eq!(c.vessel_type, "unknown");
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.significance, Significance::Uncertain);
        assert_eq!(
            c.description,
            "Routine patrol, no further details. [Context: routine transit]"
        );
    }

    #[test]
    fn test_numbered_segments_keep_order() {
        let report = "1. Tanker at 10°00'N, 20°00'E.\n2. Fishing boat in distress.\n3. Suspicious small craft at 11°00's, 21°00'w";
        let contacts = ContactAssembler::default().assemble(report);

        assert_eq!(contacts.len(), 3);
        assert_eq!(contacts[0].vessel_type, "tanker");
        assert_eq!(contacts[1].significance, Significance::Emergency);
        assert_eq!(contacts[2].vessel_type, "small craft");
        assert_eq!(contacts[2].latitude, Some(-11.0));
        assert_eq!(contacts[2].significance, Significance::Suspicious);
    }

    #[test]
    fn test_blank_line_segments_and_empty_input() {
        let assembler = ContactAssembler::default();
        let report = "Yacht anchored.\n\n   \n\nCargo vessel making 12 kts.\n";
        let contacts = assembler.assemble(report);
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[1].speed, 12.0);

        assert!(assembler.assemble("   \n\n  ").is_empty());
    }

    #[test]
    fn test_timestamp_from_report_or_segment() {
        let report = "Report 2024-10-20T05:30:00Z\n\nTanker sighted.\n\nYacht at 2024-10-21T06:00:00Z";
        let contacts = ContactAssembler::default().assemble(report);
        assert_eq!(contacts[1].timestamp, "2024-10-20T05:30:00Z");
        assert_eq!(contacts[2].timestamp, "2024-10-21T06:00:00Z");
    }

    #[test]
    fn test_generated_timestamp_is_iso() {
        let contacts = ContactAssembler::default().assemble("Tanker sighted.");
        assert!(chrono::DateTime::parse_from_rfc3339(&contacts[0].timestamp).is_ok());
    }

    #[test]
    fn test_confidence_bounds_hold() {
        let report = "1. heading 90 degrees\n2. 5 knots\n3. latitude 1.0 N, longitude 2.0 E\n4. nothing";
        for contact in ContactAssembler::default().assemble(report) {
            assert!((0.0..=1.0).contains(&contact.confidence));
        }
    }

    #[test]
    fn test_extract_report_prefers_structured_blocks() {
        let assembler = ContactAssembler::default();
        let report = "Tanker at 10°00'N, 20°00'E.\n\n```json\n{\"latitude\": 1.0, \"longitude\": 2.0, \"type\": \"yacht\"}\n```";
        let contacts = assembler.extract_report(report);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].vessel_type, "yacht");

        let prose = assembler.extract_report("Tanker at 10°00'N, 20°00'E.");
        assert_eq!(prose[0].vessel_type, "tanker");
    }
}
