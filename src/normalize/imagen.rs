use super::NormalizeContext;
use crate::ai::mime::extension_for_mime;
use crate::artifact::{save_file, SaveOptions};
use crate::models::{FailureKind, GenerationResult};
use crate::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Marker Imagen puts in `raiFilteredReason` when nothing survived filtering.
const ALL_FILTERED_MARKER: &str = "All images were filtered out";

fn filtered_count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"filtered out (\d+) generated images").expect("static regex is valid")
    })
}

/// Number of images a partial-filter reason reports as removed, or 0 when the
/// reason does not say.
pub fn parse_filtered_count(reason: &str) -> usize {
    filtered_count_pattern()
        .captures(reason)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn filter_reason(prediction: &Value) -> Option<&str> {
    prediction.get("raiFilteredReason").and_then(Value::as_str)
}

/// Decodes and writes one image. Undecodable payloads become warnings;
/// filesystem errors propagate.
fn save_image(
    path: PathBuf,
    data: &str,
    ctx: &NormalizeContext,
    result: &mut GenerationResult,
) -> Result<()> {
    let options = SaveOptions {
        is_base64: true,
        silent: ctx.silent,
    };
    match save_file(&path, data, options) {
        Ok(saved) => {
            result.push_image(saved);
            Ok(())
        }
        Err(Error::Base64(e)) => {
            warn!("Skipping undecodable image {}: {}", path.display(), e);
            result
                .warnings
                .push(format!("Failed to decode image {}: {}", path.display(), e));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Interprets an Imagen `predict` response.
pub fn normalize_imagen(response: &Value, ctx: &NormalizeContext) -> Result<GenerationResult> {
    let mut result = GenerationResult {
        requested_count: ctx.requested_count,
        ..GenerationResult::default()
    };

    let Some(predictions) = response.get("predictions").and_then(Value::as_array) else {
        result.failure = Some(FailureKind::NoImages);
        result.error = Some("No predictions found in response".to_string());
        return Ok(result);
    };

    for reason in predictions.iter().filter_map(filter_reason) {
        if reason.contains(ALL_FILTERED_MARKER) {
            warn!("All images were filtered out: {}", reason);
            result.failure = Some(FailureKind::ContentPolicy);
            result.error =
                Some("All images were filtered out by responsible AI filters".to_string());
            result.blocked = true;
            result.rai_filtered = true;
            result.blocked_count = ctx.requested_count as usize;
            result.details.push(reason.to_string());
            return Ok(result);
        }

        let count = parse_filtered_count(reason);
        warn!("Responsible AI filter removed {} image(s): {}", count, reason);
        result.rai_filtered = true;
        result.blocked_count += count;
        result.details.push(reason.to_string());
    }

    for (prediction_index, prediction) in predictions.iter().enumerate() {
        if filter_reason(prediction).is_some() {
            continue;
        }

        if let Some(images) = prediction.get("images").and_then(Value::as_array) {
            for (image_index, image) in images.iter().enumerate() {
                let Some(data) = image.get("bytesBase64Encoded").and_then(Value::as_str) else {
                    continue;
                };
                let stem = format!("{}_{}_{}", ctx.request_id, prediction_index, image_index);
                save_image(ctx.image_path(&stem, "png"), data, ctx, &mut result)?;
            }
        } else if let Some(data) = prediction.get("bytesBase64Encoded").and_then(Value::as_str) {
            let extension = prediction
                .get("mimeType")
                .and_then(Value::as_str)
                .map_or_else(|| "png".to_string(), extension_for_mime);
            let stem = format!("{}_{}", ctx.request_id, prediction_index);
            save_image(ctx.image_path(&stem, &extension), data, ctx, &mut result)?;
        }
    }

    result.generated_count = result.images.len();

    let accounted = result.generated_count + result.blocked_count;
    let requested = ctx.requested_count as usize;
    if accounted < requested {
        let note = format!(
            "Requested {} image(s): {} generated, {} filtered, {} unaccounted for",
            requested,
            result.generated_count,
            result.blocked_count,
            requested - accounted
        );
        info!("{}", note);
        result.notes.push(note);
    }

    if result.images.is_empty() {
        if result.blocked_count > 0 {
            result.failure = Some(FailureKind::ContentPolicy);
            result.blocked = true;
            result.error = Some(format!(
                "No images were generated; {} blocked by responsible AI filters",
                result.blocked_count
            ));
        } else {
            result.failure = Some(FailureKind::NoImages);
            result.error = Some("No images were generated".to_string());
        }
        return Ok(result);
    }

    info!(
        "Generated {} image(s), {} filtered",
        result.generated_count, result.blocked_count
    );
    result.success = true;
    Ok(result)
}
