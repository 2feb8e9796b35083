//! Tidewatch Runtime
//!
//! Serves the extraction pipeline:
//! - Ingest service tying extraction, storage and distribution together
//! - Live distribution hub with per-subscriber failure isolation
//! - axum HTTP routes and WebSocket subscribers with latest-contact polling

pub mod error;
pub mod hub;
pub mod ingest;
pub mod server;

pub use error::*;
pub use hub::*;
pub use ingest::*;
pub use server::*;
