//! Structured markdown reports
//!
//! Upstream tools emit reports as markdown with fenced ```json blocks, one
//! contact per block. Blocks carry either a `coordinates` array of
//! `{lat, lon}` objects or flat `latitude`/`longitude` fields.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::{Contact, Coordinates, Significance};

/// Timestamp used when a structured block carries none
pub const DEFAULT_STRUCTURED_TIMESTAMP: &str = "2024-10-20T05:30:00Z";

/// Type used when a structured block names neither `type` nor `name`
pub const DEFAULT_ZONE_TYPE: &str = "Unknown Zone";

static JSON_FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json(.*?)```").unwrap());

#[derive(Debug, Deserialize)]
struct LatLon {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct StructuredBlock {
    #[serde(default)]
    coordinates: Option<Vec<LatLon>>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(rename = "type")]
    vessel_type: Option<String>,
    name: Option<String>,
    significance: Option<String>,
    speed: Option<f64>,
    timestamp: Option<String>,
    description: Option<String>,
    heading: Option<f64>,
    confidence: Option<f64>,
}

impl StructuredBlock {
    fn position(&self) -> (Option<f64>, Option<f64>) {
        match &self.coordinates {
            Some(points) => points
                .first()
                .map(|p| (p.lat, p.lon))
                .unwrap_or((None, None)),
            None => (self.latitude, self.longitude),
        }
    }

    fn into_contact(self) -> Contact {
        let (latitude, longitude) = self.position();
        let vessel_type = self
            .vessel_type
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(DEFAULT_ZONE_TYPE)
            .to_string();
        let significance = self
            .significance
            .as_deref()
            .map(Significance::from_label)
            .unwrap_or_default();

        let mut contact = Contact::new(
            &vessel_type,
            self.timestamp.as_deref().unwrap_or(DEFAULT_STRUCTURED_TIMESTAMP),
        )
        .with_speed(self.speed)
        .with_heading(self.heading)
        .with_significance(significance)
        .with_confidence(self.confidence.unwrap_or(1.0))
        .with_description(self.description.as_deref().unwrap_or(""));

        match (latitude, longitude) {
            (Some(lat), Some(lon)) => {
                contact = contact.with_position(Some(Coordinates::new(lat, lon)));
            }
            _ => {
                // Keep a lone component so the store can report which half is missing
                contact.latitude = latitude;
                contact.longitude = longitude;
            }
        }
        contact
    }
}

/// Whether the text carries at least one ```json fence
pub fn is_structured_report(text: &str) -> bool {
    JSON_FENCE_REGEX.is_match(text)
}

/// Contacts from every well-formed ```json block. Malformed blocks are
/// logged and skipped.
pub fn parse_structured_report(text: &str) -> Vec<Contact> {
    let mut contacts = Vec::new();

    for (index, caps) in JSON_FENCE_REGEX.captures_iter(text).enumerate() {
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();

        let value: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                warn!("Skipping malformed JSON block {}: {}", index + 1, e);
                continue;
            }
        };

        if !value.is_object() {
            warn!("Skipping JSON block {}: expected an object", index + 1);
            continue;
        }

        match serde_json::from_value::<StructuredBlock>(value) {
            Ok(block) => contacts.push(block.into_contact()),
            Err(e) => warn!("Skipping JSON block {} with bad fields: {}", index + 1, e),
        }
    }

    debug!("Parsed {} structured contacts", contacts.len());
    contacts
}

/// Render contacts as a structured markdown report
pub fn render_structured_report(title: &str, contacts: &[Contact]) -> String {
    let mut out = format!("# {}\n", title);
    for (i, contact) in contacts.iter().enumerate() {
        let block = serde_json::to_string_pretty(contact).unwrap_or_else(|_| "{}".to_string());
        out.push_str(&format!("\n## Contact {}\n\n```json\n{}\n```\n", i + 1, block));
    }
    out
}

/// Short content hash identifying a report in logs
pub fn report_fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}
