//! Request construction for Vertex AI Imagen `predict`.

pub mod types;

use super::ApiRequest;
use crate::image::ReferenceImage;
use crate::models::GenerateOptions;
use crate::Result;
use types::{
    BytesImage, ImagenInstance, ImagenParameters, PredictRequest, ReferenceImageEntry,
    SubjectImageConfig,
};

/// Imagen accepts between one and four samples per request.
pub const MAX_SAMPLE_COUNT: u32 = 4;

/// The `sampleCount` actually sent for a requested image count.
pub fn sample_count(count: u32) -> u32 {
    count.clamp(1, MAX_SAMPLE_COUNT)
}

pub struct ImagenApi {
    project_id: String,
    location: String,
    model: String,
    access_token: String,
    base_url: Option<String>,
}

impl ImagenApi {
    pub fn new(project_id: String, location: String, model: String, access_token: String) -> Self {
        Self {
            project_id,
            location,
            model,
            access_token,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn endpoint(&self) -> String {
        let base_url = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", self.location));
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            base_url, self.project_id, self.location, self.model
        )
    }

    pub fn build_request(
        &self,
        options: &GenerateOptions,
        references: &[ReferenceImage],
    ) -> Result<ApiRequest> {
        let reference_images = references
            .iter()
            .zip(1..)
            .map(|(reference, reference_id)| ReferenceImageEntry {
                reference_type: "REFERENCE_TYPE_SUBJECT".to_string(),
                reference_id,
                reference_image: BytesImage {
                    bytes_base64_encoded: reference.data_base64.clone(),
                },
                subject_image_config: SubjectImageConfig {
                    subject_type: "SUBJECT_TYPE_DEFAULT".to_string(),
                },
            })
            .collect::<Vec<_>>();

        let request = PredictRequest {
            instances: vec![ImagenInstance {
                prompt: options.prompt.clone(),
                reference_images: (!reference_images.is_empty()).then_some(reference_images),
            }],
            parameters: ImagenParameters {
                sample_count: sample_count(options.count),
                aspect_ratio: options.aspect_ratio.clone(),
                person_generation: options.person_generation.clone(),
                negative_prompt: options.negative_prompt.clone(),
                seed: options.seed,
                include_rai_reason: true,
            },
        };

        Ok(ApiRequest {
            url: self.endpoint(),
            headers: vec![(
                "Authorization".to_string(),
                format!("Bearer {}", self.access_token),
            )],
            body: serde_json::to_value(&request)?,
        })
    }
}
