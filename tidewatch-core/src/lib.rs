//! Tidewatch Core - Contact model and report extraction pipeline
//!
//! This crate turns maritime situation reports into structured contacts:
//! - Attribute extraction (position, speed, heading) via pattern cascades
//! - Vessel classification against an ordered vocabulary table
//! - Confidence and significance scoring
//! - Segment assembly for prose reports
//! - Parsing of structured markdown reports with embedded JSON blocks

pub mod contact;
pub mod extract;
pub mod vessels;
pub mod scoring;
pub mod assembler;
pub mod report;

pub use contact::*;
pub use extract::*;
pub use vessels::*;
pub use scoring::*;
pub use assembler::*;
pub use report::*;

/// Vessel type assigned when nothing in the vocabulary matches
pub const UNKNOWN_VESSEL_TYPE: &str = "unknown";

/// Vessel type forced for segments describing several vessels
pub const MULTIPLE_VESSELS_TYPE: &str = "multiple vessels";
