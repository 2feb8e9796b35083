//! Contact records extracted from maritime situation reports
//!
//! A contact is immutable once built: corrections arrive as new contacts.
//! Only contacts carrying both coordinates are "valid" and may be stored
//! as navigable positions or pushed to live observers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Triage label attached to a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Routine,
    Suspicious,
    Emergency,
    #[default]
    Uncertain,
}

impl Significance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Significance::Routine => "routine",
            Significance::Suspicious => "suspicious",
            Significance::Emergency => "emergency",
            Significance::Uncertain => "uncertain",
        }
    }

    /// Parse a free-text label, falling back to `Uncertain` for anything
    /// outside the four known values (e.g. "Not Available").
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Significance::Uncertain)
    }
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a significance label is not one of the known values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown significance: {0}")]
pub struct UnknownSignificance(pub String);

impl FromStr for Significance {
    type Err = UnknownSignificance;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "routine" => Ok(Significance::Routine),
            "suspicious" => Ok(Significance::Suspicious),
            "emergency" => Ok(Significance::Emergency),
            "uncertain" => Ok(Significance::Uncertain),
            _ => Err(UnknownSignificance(s.to_string())),
        }
    }
}

/// A decimal-degree position (south/west negative)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both components finite and inside the geographic range
    pub fn is_in_range(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One detected vessel or zone observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Knots, never negative
    pub speed: f64,
    /// Degrees in [0, 360)
    pub heading: Option<f64>,
    #[serde(rename = "type")]
    pub vessel_type: String,
    /// ISO-8601
    pub timestamp: String,
    pub significance: Significance,
    /// Completeness score (0.0 - 1.0)
    pub confidence: f64,
    pub description: String,
}

impl Contact {
    pub fn new(vessel_type: &str, timestamp: &str) -> Self {
        Self {
            latitude: None,
            longitude: None,
            speed: 0.0,
            heading: None,
            vessel_type: vessel_type.to_string(),
            timestamp: timestamp.to_string(),
            significance: Significance::default(),
            confidence: 0.0,
            description: String::new(),
        }
    }

    pub fn with_position(mut self, coordinates: Option<Coordinates>) -> Self {
        self.latitude = coordinates.map(|c| c.latitude);
        self.longitude = coordinates.map(|c| c.longitude);
        self
    }

    pub fn with_speed(mut self, speed: Option<f64>) -> Self {
        self.speed = speed.filter(|s| s.is_finite()).unwrap_or(0.0).max(0.0);
        self
    }

    pub fn with_heading(mut self, heading: Option<f64>) -> Self {
        self.heading = heading.filter(|h| h.is_finite()).map(|h| h.rem_euclid(360.0));
        self
    }

    pub fn with_significance(mut self, significance: Significance) -> Self {
        self.significance = significance;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Both latitude and longitude present
    pub fn is_valid(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// A contact as persisted by a store, tagged with its row id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredContact {
    pub id: i64,
    #[serde(flatten)]
    pub contact: Contact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_validity() {
        let contact = Contact::new("tanker", "2024-10-20T05:30:00Z");
        assert!(!contact.is_valid());

        let contact = contact.with_position(Some(Coordinates::new(12.5, 45.25)));
        assert!(contact.is_valid());
        assert_eq!(contact.latitude, Some(12.5));
        assert_eq!(contact.longitude, Some(45.25));
    }

    #[test]
    fn test_contact_wire_format() {
        let contact = Contact::new("patrol boat", "2024-10-20T05:30:00Z")
            .with_position(Some(Coordinates::new(-3.0, 7.5)))
            .with_significance(Significance::Suspicious);

        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["type"], "patrol boat");
        assert_eq!(json["significance"], "suspicious");
        assert!(json["heading"].is_null());
        assert_eq!(json["speed"], 0.0);
    }

    #[test]
    fn test_heading_and_speed_normalised() {
        let contact = Contact::new("yacht", "t")
            .with_heading(Some(450.0))
            .with_speed(Some(-4.0))
            .with_confidence(3.0);

        assert_eq!(contact.heading, Some(90.0));
        assert_eq!(contact.speed, 0.0);
        assert_eq!(contact.confidence, 1.0);
    }

    #[test]
    fn test_significance_labels() {
        assert_eq!("Emergency".parse::<Significance>(), Ok(Significance::Emergency));
        assert!("Not Available".parse::<Significance>().is_err());
        assert_eq!(Significance::from_label("Not Available"), Significance::Uncertain);
    }

    #[test]
    fn test_stored_contact_flattens_id() {
        let stored = StoredContact {
            id: 7,
            contact: Contact::new("tanker", "t"),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["type"], "tanker");
    }
}
