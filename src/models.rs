//! Data models and structures
//!
//! Defines the vendor selection, invocation options, configuration, and the
//! result record returned for every generation.

use crate::masking::ResponseKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_IMAGEN_MODEL: &str = "imagen-3.0-generate-002";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Which Google image API to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Vertex AI Imagen `predict` (project + bearer token).
    Imagen,
    /// Gemini `generateContent` (API key).
    Gemini,
}

impl Vendor {
    pub fn response_kind(self) -> ResponseKind {
        match self {
            Vendor::Imagen => ResponseKind::Imagen,
            Vendor::Gemini => ResponseKind::Gemini,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Vendor::Imagen => "imagen",
            Vendor::Gemini => "gemini",
        }
    }
}

/// Per-invocation generation options.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub prompt: String,
    /// Number of images requested (Imagen `sampleCount`).
    pub count: u32,
    pub aspect_ratio: Option<String>,
    pub person_generation: Option<String>,
    pub negative_prompt: Option<String>,
    pub seed: Option<u32>,
    pub reference_images: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub json_dir: PathBuf,
    pub verbose: bool,
}

impl GenerateOptions {
    pub fn new(prompt: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            prompt: prompt.into(),
            count: 1,
            aspect_ratio: None,
            person_generation: None,
            negative_prompt: None,
            seed: None,
            reference_images: Vec::new(),
            json_dir: output_dir.clone(),
            output_dir,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Json,
}

/// A file written during one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl SavedArtifact {
    pub fn image(path: PathBuf) -> Self {
        Self {
            path,
            kind: ArtifactKind::Image,
        }
    }

    pub fn json(path: PathBuf) -> Self {
        Self {
            path,
            kind: ArtifactKind::Json,
        }
    }
}

/// Classification of an unsuccessful generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Safety or responsible-AI filter blocked the prompt or output.
    ContentPolicy,
    /// The account is not entitled to a requested option.
    Permission,
    /// Any other non-success HTTP status.
    Api,
    /// The response was well formed but carried no images.
    NoImages,
    /// The response body could not be interpreted.
    MalformedResponse,
    /// A local input (reference image) failed to load.
    Validation,
    /// Credentials or project settings needed for the vendor are missing.
    Configuration,
}

/// Outcome of one generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub success: bool,
    pub images: Vec<PathBuf>,
    pub artifacts: Vec<SavedArtifact>,
    pub requested_count: u32,
    pub generated_count: usize,
    pub blocked_count: usize,
    pub blocked: bool,
    pub rai_filtered: bool,
    pub safety_block: bool,
    pub permission_error: bool,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    pub details: Vec<String>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
    pub model_text: Option<String>,
    /// Proxy that completed the request after the primary route failed.
    pub fallback_proxy: Option<String>,
}

impl GenerationResult {
    pub fn failure(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            failure: Some(kind),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Records a saved image in both the image list and the artifact list.
    pub fn push_image(&mut self, path: PathBuf) {
        self.artifacts.push(SavedArtifact::image(path.clone()));
        self.images.push(path);
    }
}

/// Environment-driven configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub project_id: Option<String>,
    pub location: String,
    pub access_token: Option<String>,
    pub imagen_model: String,
    pub gemini_model: String,
    pub proxy: Option<String>,
    pub fallback_proxy: Option<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            gemini_api_key: env_var("GEMINI_API_KEY"),
            project_id: env_var("GOOGLE_CLOUD_PROJECT"),
            location: env_var("GOOGLE_CLOUD_LOCATION")
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            access_token: env_var("GOOGLE_ACCESS_TOKEN"),
            imagen_model: env_var("IMAGEN_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGEN_MODEL.to_string()),
            gemini_model: env_var("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            proxy: env_var("HTTPS_PROXY").or_else(|| env_var("https_proxy")),
            fallback_proxy: env_var("IMAGE_GEN_FALLBACK_PROXY"),
        }
    }

    pub fn gemini_api_key(&self) -> crate::Result<&str> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| crate::Error::Config("GEMINI_API_KEY not set".to_string()))
    }

    pub fn project_id(&self) -> crate::Result<&str> {
        self.project_id
            .as_deref()
            .ok_or_else(|| crate::Error::Config("GOOGLE_CLOUD_PROJECT not set".to_string()))
    }

    /// Bearer token for Vertex AI: `GOOGLE_ACCESS_TOKEN`, else `gcloud`.
    pub async fn resolve_access_token(&self) -> crate::Result<String> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }

        tracing::debug!("GOOGLE_ACCESS_TOKEN not set, asking gcloud for a token");
        let output = tokio::process::Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| crate::Error::Config(format!("Failed to run gcloud: {}", e)))?;

        if !output.status.success() {
            return Err(crate::Error::Config(format!(
                "gcloud auth print-access-token failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(crate::Error::Config(
                "gcloud returned an empty access token".to_string(),
            ));
        }
        Ok(token)
    }
}
