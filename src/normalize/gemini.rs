use super::NormalizeContext;
use crate::ai::mime::extension_for_mime;
use crate::artifact::{mask_and_save_json, save_file, JsonSaveOptions, SaveOptions};
use crate::masking::ResponseKind;
use crate::models::{FailureKind, GenerationResult, SavedArtifact};
use crate::{Error, Result};
use serde_json::Value;
use tracing::{info, warn};

/// `finishReason` Gemini reports when generated images tripped safety filters.
pub const SAFETY_FINISH_REASON: &str = "IMAGE_SAFETY";

/// Interprets a Gemini `generateContent` response. Only the first candidate
/// is consulted.
pub fn normalize_gemini(response: &Value, ctx: &NormalizeContext) -> Result<GenerationResult> {
    let mut result = GenerationResult {
        requested_count: ctx.requested_count,
        ..GenerationResult::default()
    };

    let response_path = mask_and_save_json(
        response,
        &ctx.json_path("response"),
        JsonSaveOptions {
            silent: ctx.silent,
            kind: Some(ResponseKind::Gemini),
            ..JsonSaveOptions::default()
        },
    )?;
    result.artifacts.push(SavedArtifact::json(response_path));

    let candidate = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first());

    if let Some(block_reason) = response
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
        .filter(|_| candidate.is_none())
    {
        warn!("Gemini blocked the prompt: {}", block_reason);
        result.failure = Some(FailureKind::ContentPolicy);
        result.error = Some(format!("Prompt blocked by safety filters ({})", block_reason));
        result.safety_block = true;
        result.details.push(block_reason.to_string());
        return Ok(result);
    }

    let finish_reason = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(Value::as_str);
    if finish_reason == Some(SAFETY_FINISH_REASON) {
        warn!("Gemini withheld generated images for safety reasons");
        result.failure = Some(FailureKind::ContentPolicy);
        result.error = Some("Image generation blocked by safety filters".to_string());
        result.safety_block = true;
        result.details.push(SAFETY_FINISH_REASON.to_string());
        return Ok(result);
    }

    result.success = true;

    let Some(parts) = candidate
        .and_then(|c| c.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
    else {
        let warning = "Response has no candidates[0].content.parts; no images extracted";
        warn!("{}", warning);
        result.warnings.push(warning.to_string());
        return Ok(result);
    };

    let mut texts = Vec::new();
    let mut counter = 0;
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            texts.push(text.to_string());
        }

        let Some(inline) = part.get("inlineData") else {
            continue;
        };
        let (Some(data), Some(mime_type)) = (
            inline.get("data").and_then(Value::as_str),
            inline.get("mimeType").and_then(Value::as_str),
        ) else {
            continue;
        };

        counter += 1;
        let stem = format!("{}_generated_{}", ctx.request_id, counter);
        let path = ctx.image_path(&stem, &extension_for_mime(mime_type));
        let options = SaveOptions {
            is_base64: true,
            silent: ctx.silent,
        };
        match save_file(&path, data, options) {
            Ok(saved) => result.push_image(saved),
            Err(Error::Base64(e)) => {
                let warning = format!("Failed to decode inline image {}: {}", counter, e);
                warn!("{}", warning);
                result.warnings.push(warning);
                break;
            }
            Err(e) => return Err(e),
        }
    }

    if !texts.is_empty() {
        result.model_text = Some(texts.join("\n"));
    }

    result.generated_count = result.images.len();
    if result.images.is_empty() {
        let warning = "No inline image data found in response";
        warn!("{}", warning);
        result.warnings.push(warning.to_string());
    } else {
        info!("Extracted {} image(s) from Gemini response", result.generated_count);
    }

    Ok(result)
}
