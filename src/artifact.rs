//! Writes decoded images and masked JSON documents to disk.
//!
//! Filesystem errors propagate to the caller untouched; nothing here retries
//! or cleans up a partially written file.

use crate::masking::{self, ResponseKind};
use crate::Result;
use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Decode `data` from base64 before writing.
    pub is_base64: bool,
    /// Skip the confirmation log line.
    pub silent: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct JsonSaveOptions {
    pub silent: bool,
    pub indent: usize,
    /// Payload schema to mask with; detected from the document when `None`.
    pub kind: Option<ResponseKind>,
}

impl Default for JsonSaveOptions {
    fn default() -> Self {
        Self {
            silent: false,
            indent: 2,
            kind: None,
        }
    }
}

/// Writes `data` to `path`, creating missing parent directories and
/// overwriting any existing file. Returns `path`.
pub fn save_file(path: &Path, data: impl AsRef<[u8]>, options: SaveOptions) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    if options.is_base64 {
        let bytes = base64::engine::general_purpose::STANDARD.decode(data.as_ref())?;
        fs::write(path, bytes)?;
    } else {
        fs::write(path, data.as_ref())?;
    }

    if !options.silent {
        tracing::info!("Saved {}", path.display());
    }
    Ok(path.to_path_buf())
}

/// Serializes `value` as indented JSON with `indent` spaces per level.
pub fn to_indented_json<T: Serialize + ?Sized>(value: &T, indent: usize) -> Result<Vec<u8>> {
    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

/// Masks binary payloads in `value`, then writes it as indented JSON.
pub fn mask_and_save_json(value: &Value, path: &Path, options: JsonSaveOptions) -> Result<PathBuf> {
    let masked = match options.kind {
        Some(kind) => masking::mask_response(value, kind),
        None => masking::mask_binary_content(value),
    };
    let json = to_indented_json(&masked, options.indent)?;
    save_file(
        path,
        json,
        SaveOptions {
            is_base64: false,
            silent: options.silent,
        },
    )
}
