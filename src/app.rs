//! Application orchestration: one request, one response, normalized to disk.

use crate::ai::imagen::sample_count;
use crate::ai::{
    send_with_proxy_fallback, ApiRequest, ApiResponse, GeminiApi, HttpTransport, ImagenApi,
    ProxySettings, Transport,
};
use crate::artifact::{mask_and_save_json, JsonSaveOptions};
use crate::image::{ReferenceImage, ReferenceImageProcessor};
use crate::masking::{self, ResponseKind};
use crate::models::{Config, FailureKind, GenerateOptions, GenerationResult, SavedArtifact, Vendor};
use crate::normalize::{self, NormalizeContext};
use crate::{Error, Result};
use chrono::Local;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

const PERSON_GENERATION_GUIDANCE: &str = "Your project is not allowed to use the requested personGeneration mode. \
Retry with --person-generation allow_adult or dont_allow, or request access for allow_all.";
const ACCESS_GUIDANCE: &str =
    "Check that the API is enabled for this project and that the credentials have access to it.";
const MAX_DETAIL_CHARS: usize = 500;

/// Primary network route plus the single alternate tried after a network failure.
#[derive(Debug, Clone, Default)]
pub struct ProxyRouting {
    pub primary: ProxySettings,
    pub fallback: Option<ProxySettings>,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub transport: Box<dyn Transport>,
    pub references: ReferenceImageProcessor,
}

/// Builds vendor requests, sends them, and turns responses into
/// [`GenerationResult`]s with their artifacts on disk.
pub struct App {
    transport: Box<dyn Transport>,
    references: ReferenceImageProcessor,
    config: Config,
    routing: ProxyRouting,
}

/// `<YYYYmmdd_HHMMSS>_<8 hex chars>`; unique per invocation.
pub fn new_request_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(services: AppServices, config: Config, routing: ProxyRouting) -> Self {
        Self {
            transport: services.transport,
            references: services.references,
            config,
            routing,
        }
    }

    /// Build an app that talks to the real APIs over HTTP.
    pub fn new(config: Config, routing: ProxyRouting) -> Self {
        Self::with_services(
            AppServices {
                transport: Box::new(HttpTransport::new()),
                references: ReferenceImageProcessor::new(),
            },
            config,
            routing,
        )
    }

    async fn build_request(
        &self,
        vendor: Vendor,
        options: &GenerateOptions,
        references: &[ReferenceImage],
    ) -> Result<ApiRequest> {
        match vendor {
            Vendor::Imagen => {
                let project_id = self.config.project_id()?.to_string();
                let access_token = self.config.resolve_access_token().await?;
                ImagenApi::new(
                    project_id,
                    self.config.location.clone(),
                    self.config.imagen_model.clone(),
                    access_token,
                )
                .build_request(options, references)
            }
            Vendor::Gemini => {
                let api_key = self.config.gemini_api_key()?.to_string();
                GeminiApi::new(api_key, self.config.gemini_model.clone())
                    .build_request(options, references)
            }
        }
    }

    /// Runs one generation end to end.
    ///
    /// Only transport failures (after the single proxy fallback) and
    /// filesystem errors are returned as `Err`; every other failure is a
    /// result with `success == false`.
    pub async fn generate(&self, vendor: Vendor, options: &GenerateOptions) -> Result<GenerationResult> {
        let request_id = new_request_id();
        let requested_count = match vendor {
            Vendor::Imagen => sample_count(options.count),
            Vendor::Gemini => 1,
        };
        info!("[{}] Generating with {} ({})", request_id, vendor.as_str(), options.prompt);

        let ctx = NormalizeContext {
            request_id,
            output_dir: options.output_dir.clone(),
            json_dir: options.json_dir.clone(),
            requested_count,
            silent: false,
        };
        let finish = |mut result: GenerationResult| {
            result.requested_count = requested_count;
            result
        };

        let references = match self.references.prepare_all(&options.reference_images).await {
            Ok(references) => references,
            Err(e) => {
                error!("[{}] {}", ctx.request_id, e);
                return Ok(finish(GenerationResult::failure(
                    FailureKind::Validation,
                    e.to_string(),
                )));
            }
        };

        let request = match self.build_request(vendor, options, &references).await {
            Ok(request) => request,
            Err(e @ Error::Config(_)) => {
                error!("[{}] {}", ctx.request_id, e);
                return Ok(finish(GenerationResult::failure(
                    FailureKind::Configuration,
                    e.to_string(),
                )));
            }
            Err(e) => return Err(e),
        };

        let mut artifacts = vec![SavedArtifact::json(mask_and_save_json(
            &masking::mask_request(&request.body, vendor.response_kind()),
            &ctx.json_path("request"),
            JsonSaveOptions::default(),
        )?)];

        let outcome = send_with_proxy_fallback(
            self.transport.as_ref(),
            &request,
            &self.routing.primary,
            self.routing.fallback.as_ref(),
        )
        .await?;
        let response = outcome.response;

        let mut result = if !response.is_success() {
            self.handle_error_status(&response, &ctx, &mut artifacts)?
        } else {
            match response.json() {
                Ok(body) => self.interpret(vendor, &response, &body, options, &ctx, &mut artifacts)?,
                Err(e) => {
                    error!("[{}] Failed to parse response: {}", ctx.request_id, e);
                    GenerationResult::failure(
                        FailureKind::MalformedResponse,
                        format!("Failed to parse response: {}", e),
                    )
                    .with_detail(truncate(&response.body, MAX_DETAIL_CHARS))
                }
            }
        };

        if outcome.used_fallback {
            result.fallback_proxy = outcome.proxy.url;
        }
        artifacts.append(&mut result.artifacts);
        result.artifacts = artifacts;
        Ok(finish(result))
    }

    fn interpret(
        &self,
        vendor: Vendor,
        response: &ApiResponse,
        body: &Value,
        options: &GenerateOptions,
        ctx: &NormalizeContext,
        artifacts: &mut Vec<SavedArtifact>,
    ) -> Result<GenerationResult> {
        match vendor {
            Vendor::Imagen => {
                let path = mask_and_save_json(
                    body,
                    &ctx.json_path("response"),
                    JsonSaveOptions {
                        kind: Some(ResponseKind::Imagen),
                        ..JsonSaveOptions::default()
                    },
                )?;
                artifacts.push(SavedArtifact::json(path));
            }
            Vendor::Gemini if options.verbose => {
                let debug = json!({
                    "status": response.status,
                    "model": self.config.gemini_model,
                    "response": masking::mask_response(body, ResponseKind::Gemini),
                });
                let path =
                    mask_and_save_json(&debug, &ctx.json_path("debug"), JsonSaveOptions::default())?;
                artifacts.push(SavedArtifact::json(path));
            }
            Vendor::Gemini => {}
        }

        normalize::normalize(vendor.response_kind(), body, ctx)
    }

    fn handle_error_status(
        &self,
        response: &ApiResponse,
        ctx: &NormalizeContext,
        artifacts: &mut Vec<SavedArtifact>,
    ) -> Result<GenerationResult> {
        let parsed = response.json().ok();
        let document = parsed
            .clone()
            .unwrap_or_else(|| json!({"status": response.status, "body": response.body}));
        let path = mask_and_save_json(&document, &ctx.json_path("error"), JsonSaveOptions::default())?;
        artifacts.push(SavedArtifact::json(path));

        let message = parsed
            .as_ref()
            .and_then(|v| v.pointer("/error/message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| truncate(&response.body, MAX_DETAIL_CHARS));
        error!(
            "[{}] API request failed (status {}): {}",
            ctx.request_id, response.status, message
        );
        Ok(classify_error(response.status, &response.body, message))
    }
}

/// Maps a non-success response onto the failure taxonomy.
pub fn classify_error(status: u16, body: &str, message: String) -> GenerationResult {
    let lowered = body.to_lowercase();

    if lowered.contains("persongeneration")
        || lowered.contains("allow_all")
        || lowered.contains("allow_adult")
    {
        let mut result = GenerationResult::failure(
            FailureKind::Permission,
            format!("Requested person generation mode is not permitted (status {})", status),
        )
        .with_detail(message)
        .with_detail(PERSON_GENERATION_GUIDANCE);
        result.permission_error = true;
        return result;
    }

    if lowered.contains("responsible ai") || lowered.contains("sensitive words") {
        warn!("Prompt rejected by responsible AI filters");
        let mut result = GenerationResult::failure(
            FailureKind::ContentPolicy,
            "Prompt was blocked by responsible AI filters",
        )
        .with_detail(message);
        result.blocked = true;
        result.rai_filtered = true;
        return result;
    }

    if status == 403 {
        let mut result = GenerationResult::failure(
            FailureKind::Permission,
            format!("Permission denied (status {})", status),
        )
        .with_detail(message)
        .with_detail(ACCESS_GUIDANCE);
        result.permission_error = true;
        return result;
    }

    GenerationResult::failure(
        FailureKind::Api,
        format!("API request failed with status {}", status),
    )
    .with_detail(message)
}
