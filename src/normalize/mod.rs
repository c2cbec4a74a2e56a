//! Interprets raw vendor responses: detects content-policy blocks, decodes
//! returned images to disk, and summarizes the outcome.

pub mod gemini;
pub mod imagen;

pub use gemini::normalize_gemini;
pub use imagen::normalize_imagen;

use crate::masking::ResponseKind;
use crate::models::GenerationResult;
use crate::Result;
use serde_json::Value;
use std::path::PathBuf;

/// Per-invocation naming and placement for saved artifacts.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub request_id: String,
    pub output_dir: PathBuf,
    pub json_dir: PathBuf,
    pub requested_count: u32,
    pub silent: bool,
}

impl NormalizeContext {
    fn image_path(&self, stem: &str, extension: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", stem, extension))
    }

    pub fn json_path(&self, suffix: &str) -> PathBuf {
        self.json_dir
            .join(format!("{}_{}.json", self.request_id, suffix))
    }
}

/// Dispatches to the normalizer for `kind`.
pub fn normalize(kind: ResponseKind, response: &Value, ctx: &NormalizeContext) -> Result<GenerationResult> {
    match kind {
        ResponseKind::Imagen => normalize_imagen(response, ctx),
        ResponseKind::Gemini => normalize_gemini(response, ctx),
    }
}
