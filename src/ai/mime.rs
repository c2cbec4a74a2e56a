pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, 0x50, 0x4E, 0x47, ..] => "image/png",
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => "image/webp",
        [0x47, 0x49, 0x46, 0x38, ..] => "image/gif",
        _ => {
            tracing::warn!(
                "Unrecognized image format (first 4 bytes: {:02X?}), falling back to image/png",
                &bytes[..bytes.len().min(4)]
            );
            "image/png"
        }
    }
}

/// File extension for a MIME type: its subtype (`image/jpeg` -> `jpeg`,
/// `image/svg+xml` -> `svg`), or `png` when the subtype is missing or not
/// plain ASCII alphanumerics.
pub fn extension_for_mime(mime_type: &str) -> String {
    mime_type
        .split_once('/')
        .and_then(|(_, subtype)| subtype.split([';', '+']).next())
        .map(str::trim)
        .filter(|subtype| !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("png")
        .to_ascii_lowercase()
}
