//! Reference image loading
//!
//! Validates user-supplied reference images, shrinks oversized ones, and
//! encodes them for inclusion in a generation request.

pub mod processor;

pub use processor::ReferenceImageProcessor;

use std::path::PathBuf;

/// A reference image ready to embed in a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub source: PathBuf,
    pub mime_type: String,
    pub data_base64: String,
}
