//! Request construction for Gemini's key-authenticated `generateContent`.

pub mod types;

use super::ApiRequest;
use crate::image::ReferenceImage;
use crate::models::GenerateOptions;
use crate::Result;
use types::{Content, GenerateContentRequest, GenerationConfig, ImageConfig, InlineData, Part};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiApi {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiApi {
    /// `model` may be given with or without the `models/` prefix.
    pub fn new(api_key: String, model: String) -> Self {
        let model = model.strip_prefix("models/").unwrap_or(&model).to_string();
        Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    pub fn build_request(
        &self,
        options: &GenerateOptions,
        references: &[ReferenceImage],
    ) -> Result<ApiRequest> {
        let mut parts = vec![Part::Text {
            text: options.prompt.clone(),
        }];
        parts.extend(references.iter().map(|reference| Part::InlineData {
            inline_data: InlineData {
                mime_type: reference.mime_type.clone(),
                data: reference.data_base64.clone(),
            },
        }));

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                image_config: options.aspect_ratio.clone().map(|aspect_ratio| ImageConfig {
                    aspect_ratio,
                }),
            },
        };

        Ok(ApiRequest {
            url: self.endpoint(),
            headers: vec![("x-goog-api-key".to_string(), self.api_key.clone())],
            body: serde_json::to_value(&request)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_model_prefix_is_stripped() {
        let api = GeminiApi::new("key".to_string(), "models/gemini-2.5-flash-image".to_string());
        assert_eq!(api.model(), "gemini-2.5-flash-image");
        assert_eq!(
            api.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn test_request_body_with_reference_image() {
        let api = GeminiApi::new("key".to_string(), "m".to_string());
        let mut options = GenerateOptions::new("a red fox", "out");
        options.aspect_ratio = Some("16:9".to_string());
        let reference = ReferenceImage {
            source: PathBuf::from("fox.png"),
            mime_type: "image/png".to_string(),
            data_base64: "AAAA".to_string(),
        };

        let request = api.build_request(&options, &[reference]).unwrap();

        assert_eq!(request.headers, vec![("x-goog-api-key".to_string(), "key".to_string())]);
        assert_eq!(
            request.body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "a red fox"},
                        {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
                    ]
                }],
                "generationConfig": {
                    "responseModalities": ["TEXT", "IMAGE"],
                    "imageConfig": {"aspectRatio": "16:9"}
                }
            })
        );
    }

    #[test]
    fn test_image_config_omitted_without_aspect_ratio() {
        let api = GeminiApi::new("key".to_string(), "m".to_string());
        let request = api
            .build_request(&GenerateOptions::new("a cat", "out"), &[])
            .unwrap();
        assert!(request.body["generationConfig"].get("imageConfig").is_none());
    }
}
