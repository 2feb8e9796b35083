//! Attribute extraction from free-form report segments
//!
//! Each attribute is pulled by an ordered cascade of independent matchers.
//! The first matcher returning a value wins and later matchers are not
//! consulted. A matcher that sees a malformed number returns `None`, so a
//! bad field never poisons the rest of the segment.

use chrono::{DateTime, NaiveDateTime};
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::Coordinates;

/// Attributes found in a single segment
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtractedAttributes {
    pub coordinates: Option<Coordinates>,
    /// Knots
    pub speed: Option<f64>,
    /// Degrees
    pub heading: Option<f64>,
}

impl ExtractedAttributes {
    pub fn from_segment(segment: &str) -> Self {
        Self {
            coordinates: extract_coordinates(segment),
            speed: extract_speed(segment),
            heading: extract_heading(segment),
        }
    }
}

type CoordinateMatcher = fn(&str) -> Option<Coordinates>;
type HeadingMatcher = fn(&str) -> Option<f64>;

/// Coordinate formats in precedence order
const COORDINATE_MATCHERS: &[CoordinateMatcher] = &[degree_minute_coordinates, labelled_decimal_coordinates];

/// Heading formats in precedence order
const HEADING_MATCHERS: &[HeadingMatcher] = &[
    explicit_heading,
    explicit_bearing,
    compass_heading,
    bare_degrees,
];

/// Compass wheel in 45° increments
const COMPASS_POINTS: &[(&str, f64)] = &[
    ("north", 0.0),
    ("northeast", 45.0),
    ("east", 90.0),
    ("southeast", 135.0),
    ("south", 180.0),
    ("southwest", 225.0),
    ("west", 270.0),
    ("northwest", 315.0),
];

// 12°30'N, 45°15'E
static DEGREE_MINUTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+)\s*°\s*(\d+(?:\.\d+)?)\s*['′]\s*([NS])\s*,\s*(\d+)\s*°\s*(\d+(?:\.\d+)?)\s*['′]\s*([EW])",
    )
    .unwrap()
});

// latitude 12.34 N, longitude 45.67 E
static LABELLED_DECIMAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)latitude\s*(-?\d+(?:\.\d+)?)\s*°?\s*([NS])\s*,\s*longitude\s*(-?\d+(?:\.\d+)?)\s*°?\s*([EW])",
    )
    .unwrap()
});

static SPEED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:knots?|kts?)\b").unwrap());

static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bheading\s+(\d+(?:\.\d+)?)\s*(?:degrees|°)").unwrap());

static BEARING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbearing\s+(\d+(?:\.\d+)?)\s*(?:degrees|°)").unwrap());

static DEGREES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*degrees").unwrap());

static TIMESTAMP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:\d{2})?").unwrap()
});

/// Parse an ASCII decimal, rejecting overflow to infinity
fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn capture_number(caps: &Captures<'_>, group: usize) -> Option<f64> {
    caps.get(group).and_then(|m| parse_number(m.as_str()))
}

fn hemisphere_sign(letter: &str) -> f64 {
    if letter.eq_ignore_ascii_case("s") || letter.eq_ignore_ascii_case("w") {
        -1.0
    } else {
        1.0
    }
}

fn degree_minute_component(caps: &Captures<'_>, degrees: usize, minutes: usize, hemisphere: usize) -> Option<f64> {
    let deg = capture_number(caps, degrees)?;
    let min = capture_number(caps, minutes)?;
    let sign = hemisphere_sign(caps.get(hemisphere)?.as_str());
    Some(sign * (deg + min / 60.0))
}

fn degree_minute_coordinates(text: &str) -> Option<Coordinates> {
    let caps = DEGREE_MINUTE_REGEX.captures(text)?;
    let latitude = degree_minute_component(&caps, 1, 2, 3)?;
    let longitude = degree_minute_component(&caps, 4, 5, 6)?;
    Some(Coordinates::new(latitude, longitude)).filter(Coordinates::is_in_range)
}

fn labelled_decimal_coordinates(text: &str) -> Option<Coordinates> {
    let caps = LABELLED_DECIMAL_REGEX.captures(text)?;
    let signed = |value: f64, hemisphere: &str| {
        if value < 0.0 {
            value
        } else {
            hemisphere_sign(hemisphere) * value
        }
    };
    let latitude = signed(capture_number(&caps, 1)?, caps.get(2)?.as_str());
    let longitude = signed(capture_number(&caps, 3)?, caps.get(4)?.as_str());
    Some(Coordinates::new(latitude, longitude)).filter(Coordinates::is_in_range)
}

/// Position from the first coordinate format that matches
pub fn extract_coordinates(text: &str) -> Option<Coordinates> {
    COORDINATE_MATCHERS.iter().find_map(|matcher| matcher(text))
}

/// Speed in knots from the first `<n> knots` / `<n> kts` phrase
pub fn extract_speed(text: &str) -> Option<f64> {
    let caps = SPEED_REGEX.captures(text)?;
    capture_number(&caps, 1)
}

fn explicit_heading(text: &str) -> Option<f64> {
    let caps = HEADING_REGEX.captures(text)?;
    capture_number(&caps, 1)
}

fn explicit_bearing(text: &str) -> Option<f64> {
    let caps = BEARING_REGEX.captures(text)?;
    capture_number(&caps, 1)
}

/// Earliest compass word in the text; at equal offsets the longer word
/// wins so "northeast" is not read as "north".
fn compass_heading(text: &str) -> Option<f64> {
    let lowered = text.to_lowercase();
    COMPASS_POINTS
        .iter()
        .filter_map(|(word, degrees)| lowered.find(word).map(|pos| (pos, word.len(), *degrees)))
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, _, degrees)| degrees)
}

fn bare_degrees(text: &str) -> Option<f64> {
    let caps = DEGREES_REGEX.captures(text)?;
    capture_number(&caps, 1)
}

/// Heading in degrees from the first heading format that matches
pub fn extract_heading(text: &str) -> Option<f64> {
    HEADING_MATCHERS
        .iter()
        .find_map(|matcher| matcher(text))
        .map(|degrees| degrees.rem_euclid(360.0))
}

/// First well-formed ISO-8601 date-time in the text, verbatim
pub fn extract_timestamp(text: &str) -> Option<String> {
    TIMESTAMP_REGEX
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|candidate| is_valid_timestamp(candidate))
        .map(str::to_string)
}

fn is_valid_timestamp(candidate: &str) -> bool {
    DateTime::parse_from_rfc3339(candidate).is_ok()
        || NaiveDateTime::parse_from_str(candidate, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(candidate, "%Y-%m-%dT%H:%M").is_ok()
        || with_zero_seconds(candidate).is_some_and(|full| DateTime::parse_from_rfc3339(&full).is_ok())
}

/// `2024-10-20T05:30Z` -> `2024-10-20T05:30:00Z`
fn with_zero_seconds(candidate: &str) -> Option<String> {
    let (minutes, offset) = candidate.split_at_checked(16)?;
    if offset.starts_with(':') {
        return None;
    }
    Some(format!("{}:00{}", minutes, offset))
}
