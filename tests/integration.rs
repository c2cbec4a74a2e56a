use base64::Engine as _;
use google_image_gen::{
    ai::{MockTransport, ProxySettings},
    app::{App, AppServices, ProxyRouting},
    image::ReferenceImageProcessor,
    models::{ArtifactKind, Config, FailureKind, GenerateOptions, Vendor},
    Error,
};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn png_base64() -> String {
    base64::engine::general_purpose::STANDARD.encode(PNG)
}

fn test_config() -> Config {
    Config {
        gemini_api_key: Some("test-key".to_string()),
        project_id: Some("test-project".to_string()),
        location: "us-central1".to_string(),
        access_token: Some("test-token".to_string()),
        imagen_model: "imagen-test".to_string(),
        gemini_model: "gemini-test".to_string(),
        proxy: None,
        fallback_proxy: None,
    }
}

/// Shares one scripted transport between the app and the test body.
struct SharedTransport(Arc<MockTransport>);

#[async_trait::async_trait]
impl google_image_gen::ai::Transport for SharedTransport {
    async fn send(
        &self,
        request: &google_image_gen::ai::ApiRequest,
        proxy: &ProxySettings,
    ) -> google_image_gen::Result<google_image_gen::ai::ApiResponse> {
        self.0.send(request, proxy).await
    }
}

fn build_app(transport: Arc<MockTransport>, config: Config, routing: ProxyRouting) -> App {
    App::with_services(
        AppServices {
            transport: Box::new(SharedTransport(transport)),
            references: ReferenceImageProcessor::new(),
        },
        config,
        routing,
    )
}

fn options(dir: &Path, count: u32) -> GenerateOptions {
    let mut options = GenerateOptions::new("a lighthouse in a storm", dir.join("images"));
    options.json_dir = dir.join("json");
    options.count = count;
    options
}

fn json_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_imagen_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new().with_json(
        200,
        json!({
            "predictions": [
                {"bytesBase64Encoded": png_base64(), "mimeType": "image/png"},
                {"raiFilteredReason": "Your current safety filter threshold filtered out 1 generated images."}
            ]
        }),
    ));
    let app = build_app(transport.clone(), test_config(), ProxyRouting::default());

    let result = app.generate(Vendor::Imagen, &options(dir.path(), 3)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.requested_count, 3);
    assert_eq!(result.generated_count, 1);
    assert_eq!(result.blocked_count, 1);
    assert_eq!(result.notes.len(), 1);
    assert_eq!(fs::read(&result.images[0]).unwrap(), PNG);
    assert!(result.images[0].to_string_lossy().ends_with("_0.png"));

    let files = json_files(&dir.path().join("json"));
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|f| f.ends_with("_request.json")));
    assert!(files.iter().any(|f| f.ends_with("_response.json")));
    let json_artifacts = result
        .artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Json)
        .count();
    assert_eq!(json_artifacts, 2);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let (request, _) = &calls[0];
    assert!(request.url.ends_with("/publishers/google/models/imagen-test:predict"));
    assert_eq!(request.body["parameters"]["sampleCount"], 3);
    assert!(request
        .headers
        .contains(&("Authorization".to_string(), "Bearer test-token".to_string())));
}

#[tokio::test]
async fn test_gemini_end_to_end_with_debug_file() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new().with_json(
        200,
        json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "A lighthouse, as requested."},
                    {"inlineData": {"mimeType": "image/png", "data": png_base64()}}
                ]},
                "finishReason": "STOP"
            }]
        }),
    ));
    let app = build_app(transport, test_config(), ProxyRouting::default());
    let mut options = options(dir.path(), 1);
    options.verbose = true;

    let result = app.generate(Vendor::Gemini, &options).await.unwrap();

    assert!(result.success);
    assert_eq!(result.images.len(), 1);
    assert!(result.images[0].to_string_lossy().ends_with("_generated_1.png"));
    assert_eq!(result.model_text.as_deref(), Some("A lighthouse, as requested."));

    let files = json_files(&dir.path().join("json"));
    assert_eq!(files.len(), 3);
    assert!(files.iter().any(|f| f.ends_with("_debug.json")));
}

#[tokio::test]
async fn test_imagen_count_above_limit_is_accounted_as_sent() {
    let dir = tempfile::tempdir().unwrap();
    let prediction = json!({"bytesBase64Encoded": png_base64(), "mimeType": "image/png"});
    let transport = Arc::new(MockTransport::new().with_json(
        200,
        json!({"predictions": vec![prediction; 4]}),
    ));
    let app = build_app(transport.clone(), test_config(), ProxyRouting::default());

    let result = app.generate(Vendor::Imagen, &options(dir.path(), 6)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.requested_count, 4);
    assert_eq!(result.generated_count, 4);
    assert!(result.notes.is_empty());
    assert_eq!(transport.calls()[0].0.body["parameters"]["sampleCount"], 4);
}

#[tokio::test]
async fn test_imagen_zero_count_requests_one() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new().with_json(
        200,
        json!({"predictions": [{"bytesBase64Encoded": png_base64(), "mimeType": "image/png"}]}),
    ));
    let app = build_app(transport.clone(), test_config(), ProxyRouting::default());

    let result = app.generate(Vendor::Imagen, &options(dir.path(), 0)).await.unwrap();

    assert_eq!(result.requested_count, 1);
    assert!(result.notes.is_empty());
    assert_eq!(transport.calls()[0].0.body["parameters"]["sampleCount"], 1);
}

#[tokio::test]
async fn test_saved_request_masks_reference_image() {
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("reference.png");
    image::RgbaImage::from_fn(64, 64, |x, y| {
        image::Rgba([(x * 7) as u8, (y * 13) as u8, ((x ^ y) * 3) as u8, 255])
    })
    .save_with_format(&reference, image::ImageFormat::Png)
    .unwrap();

    let transport = Arc::new(MockTransport::new().with_json(
        200,
        json!({"candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "image/png", "data": png_base64()}}
        ]}}]}),
    ));
    let app = build_app(transport.clone(), test_config(), ProxyRouting::default());
    let mut options = options(dir.path(), 1);
    options.reference_images = vec![reference];

    let result = app.generate(Vendor::Gemini, &options).await.unwrap();
    assert!(result.success);

    // the wire request still carries the full image
    let calls = transport.calls();
    let sent = calls[0].0.body["contents"][0]["parts"][1]["inlineData"]["data"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(sent.len() > 100);

    let request_file = json_files(&dir.path().join("json"))
        .into_iter()
        .find(|f| f.ends_with("_request.json"))
        .unwrap();
    let saved = fs::read_to_string(dir.path().join("json").join(request_file)).unwrap();
    assert!(saved.contains("[BASE64_DATA_MASKED:"));
    assert!(!saved.contains(&sent));
    assert!(saved.contains("a lighthouse in a storm"));
}

#[tokio::test]
async fn test_gemini_safety_block() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new().with_json(
        200,
        json!({"candidates": [{"finishReason": "IMAGE_SAFETY"}]}),
    ));
    let app = build_app(transport, test_config(), ProxyRouting::default());

    let result = app.generate(Vendor::Gemini, &options(dir.path(), 1)).await.unwrap();

    assert!(!result.success);
    assert!(result.safety_block);
    assert!(result.images.is_empty());
    assert!(!dir.path().join("images").exists());
}

#[tokio::test]
async fn test_permission_error_is_classified_and_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new().with_json(
        400,
        json!({"error": {"code": 400, "message": "personGeneration=allow_all is not available for this project"}}),
    ));
    let routing = ProxyRouting {
        primary: ProxySettings::direct(),
        fallback: Some(ProxySettings::via("http://proxy.local:3128")),
    };
    let app = build_app(transport.clone(), test_config(), routing);
    let mut options = options(dir.path(), 1);
    options.person_generation = Some("allow_all".to_string());

    let result = app.generate(Vendor::Imagen, &options).await.unwrap();

    assert!(!result.success);
    assert!(result.permission_error);
    assert_eq!(result.failure, Some(FailureKind::Permission));
    assert!(result.details[0].contains("allow_all"));
    assert_eq!(transport.get_call_count(), 1);
    assert!(json_files(&dir.path().join("json"))
        .iter()
        .any(|f| f.ends_with("_error.json")));
}

#[tokio::test]
async fn test_network_failure_falls_back_to_alternate_proxy() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(
        MockTransport::new()
            .with_error(Error::Network("connection timed out".to_string()))
            .with_json(200, json!({"predictions": [{"bytesBase64Encoded": png_base64()}]})),
    );
    let routing = ProxyRouting {
        primary: ProxySettings::direct(),
        fallback: Some(ProxySettings::via("http://proxy.local:3128")),
    };
    let app = build_app(transport.clone(), test_config(), routing);

    let result = app.generate(Vendor::Imagen, &options(dir.path(), 1)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.fallback_proxy.as_deref(), Some("http://proxy.local:3128"));
    assert_eq!(transport.get_call_count(), 2);
}

#[tokio::test]
async fn test_network_failure_without_fallback_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let transport =
        Arc::new(MockTransport::new().with_error(Error::Network("unreachable".to_string())));
    let app = build_app(transport.clone(), test_config(), ProxyRouting::default());

    let err = app
        .generate(Vendor::Gemini, &options(dir.path(), 1))
        .await
        .unwrap_err();

    assert!(err.is_network());
    assert_eq!(transport.get_call_count(), 1);
    // the request is persisted before sending
    assert_eq!(json_files(&dir.path().join("json")).len(), 1);
}

#[tokio::test]
async fn test_bad_reference_image_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new());
    let app = build_app(transport.clone(), test_config(), ProxyRouting::default());
    let mut options = options(dir.path(), 1);
    options.reference_images = vec![dir.path().join("missing.png")];

    let result = app.generate(Vendor::Gemini, &options).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Validation));
    assert_eq!(transport.get_call_count(), 0);
}

#[tokio::test]
async fn test_missing_credentials_is_configuration_failure() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new());
    let config = Config {
        gemini_api_key: None,
        ..test_config()
    };
    let app = build_app(transport.clone(), config, ProxyRouting::default());

    let result = app.generate(Vendor::Gemini, &options(dir.path(), 1)).await.unwrap();

    assert_eq!(result.failure, Some(FailureKind::Configuration));
    assert_eq!(transport.get_call_count(), 0);
}

#[tokio::test]
async fn test_unparseable_success_body_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new().with_response(
        google_image_gen::ai::ApiResponse {
            status: 200,
            body: "<html>gateway</html>".to_string(),
        },
    ));
    let app = build_app(transport, test_config(), ProxyRouting::default());

    let result = app.generate(Vendor::Imagen, &options(dir.path(), 1)).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::MalformedResponse));
    assert_eq!(result.details, vec!["<html>gateway</html>"]);
}

#[tokio::test]
async fn test_result_serializes_for_cli_output() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new().with_json(
        200,
        json!({"predictions": [{"raiFilteredReason": "All images were filtered out."}]}),
    ));
    let app = build_app(transport, test_config(), ProxyRouting::default());

    let result = app.generate(Vendor::Imagen, &options(dir.path(), 2)).await.unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["success"], false);
    assert_eq!(value["blocked"], true);
    assert_eq!(value["raiFiltered"], true);
    assert_eq!(value["failure"], "contentPolicy");
    assert_eq!(value["images"], json!([]));
}
