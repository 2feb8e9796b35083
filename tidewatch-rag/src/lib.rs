//! Tidewatch retrieval enrichment
//!
//! Embeds report text and looks up the nearest prior documents in an
//! index built offline. Enrichment is advisory: a failed lookup never
//! blocks contact extraction.

pub mod embedder;
pub mod error;
pub mod index;
pub mod retriever;

pub use embedder::*;
pub use error::*;
pub use index::*;
pub use retriever::*;
