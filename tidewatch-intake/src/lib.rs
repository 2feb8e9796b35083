//! Tidewatch report intake
//!
//! Gets report text into the pipeline:
//! - OCR of report images through an external engine
//! - Loading reports from files or inline text
//! - Pushing rendered reports to a remote Tidewatch server

pub mod error;
pub mod loader;
pub mod ocr;
pub mod push;

pub use error::*;
pub use loader::*;
pub use ocr::*;
pub use push::*;
