//! Replaces embedded base64 payloads in API responses with size placeholders
//! so responses can be logged and persisted without megabytes of image data.
//!
//! Which fields hold binary data is decided by the vendor schema
//! ([`ResponseKind`]), never by sniffing string contents.

use crate::json_path;
use serde_json::Value;

/// Strings at a payload path longer than this are masked.
pub const MASK_THRESHOLD: usize = 100;

/// Response schema family, chosen up front from the vendor that was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Imagen `predict`: `predictions[i].bytesBase64Encoded`.
    Imagen,
    /// Gemini `generateContent`: `candidates[i].content.parts[j].inlineData.data`.
    Gemini,
}

impl ResponseKind {
    /// Infers the schema from the top-level shape. Used only when the caller
    /// has no vendor to go on.
    pub fn detect(value: &Value) -> Option<Self> {
        if value.get("predictions").is_some_and(Value::is_array) {
            Some(ResponseKind::Imagen)
        } else if value.get("candidates").is_some_and(Value::is_array) {
            Some(ResponseKind::Gemini)
        } else {
            None
        }
    }

    fn payload_paths(self, value: &Value) -> Vec<String> {
        match self {
            ResponseKind::Imagen => array_len(value, "predictions")
                .map(|i| format!("predictions[{}].bytesBase64Encoded", i))
                .collect(),
            ResponseKind::Gemini => array_len(value, "candidates")
                .flat_map(|i| {
                    let parts = format!("candidates[{}].content.parts", i);
                    array_len(value, &parts)
                        .map(move |j| format!("{}[{}].inlineData.data", parts, j))
                        .collect::<Vec<_>>()
                })
                .collect(),
        }
    }

    /// Payload paths in the request sent to this vendor (reference images).
    fn request_payload_paths(self, value: &Value) -> Vec<String> {
        let (outer, inner, leaf) = match self {
            ResponseKind::Imagen => (
                "instances",
                "referenceImages",
                "referenceImage.bytesBase64Encoded",
            ),
            ResponseKind::Gemini => ("contents", "parts", "inlineData.data"),
        };
        array_len(value, outer)
            .flat_map(|i| {
                let items = format!("{}[{}].{}", outer, i, inner);
                array_len(value, &items)
                    .map(move |j| format!("{}[{}].{}", items, j, leaf))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

fn array_len(value: &Value, path: &str) -> std::ops::Range<usize> {
    let len = json_path::get(value, path)
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    0..len
}

/// Placeholder text for a base64 string of `encoded_len` characters.
pub fn placeholder(encoded_len: usize) -> String {
    format!("[BASE64_DATA_MASKED: ~{} KB]", encoded_len * 3 / 4 / 1024)
}

/// Returns a masked deep copy of `response` using the schema detected from
/// its shape. Shapes matching neither vendor come back unchanged.
pub fn mask_binary_content(response: &Value) -> Value {
    match ResponseKind::detect(response) {
        Some(kind) => mask_response(response, kind),
        None => response.clone(),
    }
}

/// Returns a masked deep copy of `response` using `kind`'s payload paths.
pub fn mask_response(response: &Value, kind: ResponseKind) -> Value {
    mask_paths(response, kind.payload_paths(response))
}

/// Returns a copy of a request body for `kind` with embedded reference
/// images masked.
pub fn mask_request(request: &Value, kind: ResponseKind) -> Value {
    mask_paths(request, kind.request_payload_paths(request))
}

fn mask_paths(value: &Value, paths: Vec<String>) -> Value {
    let mut masked = value.clone();
    for path in paths {
        let encoded_len = match json_path::get(&masked, &path) {
            Some(Value::String(s)) if s.len() > MASK_THRESHOLD => s.len(),
            _ => continue,
        };
        json_path::set(&mut masked, &path, Value::String(placeholder(encoded_len)));
    }
    masked
}
