//! Google Cloud Vision OCR backend implementation.
//!
//! Sends the image as base64 to the `images:annotate` endpoint with a
//! single `TEXT_DETECTION` feature. Requires an API key (`VISION_API_KEY`).
//!
//! This backend never retries. A 429 or 5xx is reported as a remote error
//! and retry policy is left to the caller.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::backend::{OcrBackend, OcrBackendType, OcrError, OcrResult, RecognitionInput};

/// Public Cloud Vision annotate endpoint.
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Header carrying the API key when `CredentialPlacement::Header` is used.
const API_KEY_HEADER: &str = "X-Goog-Api-Key";

/// Where the API key goes on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialPlacement {
    /// `?key=<api key>` query parameter.
    #[default]
    Query,
    /// `X-Goog-Api-Key` request header.
    Header,
}

/// Configuration for the Vision backend.
#[derive(Clone)]
pub struct VisionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub credential: CredentialPlacement,
    /// Upper bound on the whole request, including reading the body.
    pub timeout: Duration,
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("credential", &self.credential)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            api_key: None,
            credential: CredentialPlacement::default(),
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest {
    image: VisionImage,
    features: Vec<VisionFeature>,
}

#[derive(Debug, Serialize)]
struct VisionImage {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VisionFeature {
    #[serde(rename = "type")]
    feature_type: &'static str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VisionStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Cloud Vision OCR backend.
pub struct VisionBackend {
    config: VisionConfig,
    client: Client,
}

impl VisionBackend {
    /// Create a new Vision backend.
    pub fn with_config(config: VisionConfig) -> Result<Self, OcrError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                OcrError::MisconfiguredBackend(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str, OcrError> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                OcrError::MisconfiguredBackend(
                    "Vision API key not set (VISION_API_KEY or [vision].api_key)".to_string(),
                )
            })
    }

    fn request_url(&self, api_key: &str) -> Result<Url, OcrError> {
        let mut url = Url::parse(&self.config.endpoint).map_err(|e| {
            OcrError::MisconfiguredBackend(format!(
                "Invalid Vision endpoint '{}': {}",
                self.config.endpoint, e
            ))
        })?;
        if self.config.credential == CredentialPlacement::Query {
            url.query_pairs_mut().append_pair("key", api_key);
        }
        Ok(url)
    }

    fn build_request(bytes: &[u8]) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: VisionImage {
                    content: base64::engine::general_purpose::STANDARD.encode(bytes),
                },
                features: vec![VisionFeature {
                    feature_type: "TEXT_DETECTION",
                    max_results: 1,
                }],
            }],
        }
    }

    fn timeout_error(&self) -> OcrError {
        OcrError::BackendTimeout {
            backend: OcrBackendType::Vision,
            timeout: self.config.timeout,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> OcrError {
        if e.is_timeout() {
            return self.timeout_error();
        }
        OcrError::TransportFailure(error_chain(&e.without_url()))
    }

    /// Issue one annotate request and return the raw status and body.
    async fn post(&self, bytes: &[u8]) -> Result<(StatusCode, String), OcrError> {
        let api_key = self.api_key()?;
        let url = self.request_url(api_key)?;

        let mut request = self.client.post(url).json(&Self::build_request(bytes));
        if self.config.credential == CredentialPlacement::Header {
            request = request.header(API_KEY_HEADER, api_key);
        }

        debug!(
            "Vision: posting {} bytes to {}",
            bytes.len(),
            self.config.endpoint
        );

        let exchange = async {
            let response = request.send().await.map_err(|e| self.transport_error(e))?;
            let status = response.status();
            let body = response.text().await.map_err(|e| self.transport_error(e))?;
            Ok::<_, OcrError>((status, body))
        };

        tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| self.timeout_error())?
    }
}

/// Render an error with all of its sources.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Derive extracted text from an annotate response.
fn interpret_response(status: StatusCode, body: &str) -> Result<String, OcrError> {
    if status != StatusCode::OK {
        return Err(OcrError::RemoteError {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    let parsed: AnnotateResponse =
        serde_json::from_str(body).map_err(|e| OcrError::RemoteError {
            status: status.as_u16(),
            body: format!("malformed response: {}", e),
        })?;

    let first = parsed.responses.into_iter().next().unwrap_or_default();

    if let Some(text) = first.full_text_annotation.and_then(|a| a.text) {
        return Ok(text);
    }
    if let Some(text) = first
        .text_annotations
        .into_iter()
        .next()
        .and_then(|a| a.description)
    {
        return Ok(text);
    }
    if let Some(error) = first.error {
        warn!(
            "Vision reported an image error with no annotation ({}: {})",
            error.code, error.message
        );
    }

    Ok(String::new())
}

#[async_trait]
impl OcrBackend for VisionBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Vision
    }

    fn is_available(&self) -> bool {
        self.api_key().is_ok()
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            format!("Cloud Vision is available ({})", self.config.endpoint)
        } else {
            "Vision API key not set. Create one at https://console.cloud.google.com/apis/credentials \
             and set VISION_API_KEY"
                .to_string()
        }
    }

    async fn recognize(&self, input: RecognitionInput<'_>) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let (status, body) = self.post(input.bytes).await?;
        let text = interpret_response(status, &body).inspect_err(|e| {
            warn!("Vision request failed: {}", e);
        })?;
        let elapsed = start.elapsed();

        Ok(OcrResult {
            text,
            backend: OcrBackendType::Vision,
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ImageType;
    use serde_json::json;
    use std::path::Path;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    fn input() -> RecognitionInput<'static> {
        RecognitionInput {
            path: Path::new("/unused"),
            bytes: PNG_BYTES,
            media_type: ImageType::Png,
        }
    }

    fn backend_for(server: &MockServer, credential: CredentialPlacement) -> VisionBackend {
        VisionBackend::with_config(VisionConfig {
            endpoint: format!("{}/v1/images:annotate", server.uri()),
            api_key: Some("test-key".to_string()),
            credential,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(VisionBackend::build_request(b"abc")).unwrap();
        assert_eq!(
            body,
            json!({
                "requests": [{
                    "image": {"content": "YWJj"},
                    "features": [{"type": "TEXT_DETECTION", "maxResults": 1}]
                }]
            })
        );
    }

    #[test]
    fn test_interpret_full_text() {
        let text = interpret_response(
            StatusCode::OK,
            r#"{"responses":[{"fullTextAnnotation":{"text":"ABC"}}]}"#,
        )
        .unwrap();
        assert_eq!(text, "ABC");
    }

    #[test]
    fn test_interpret_falls_back_to_text_annotations() {
        let text = interpret_response(
            StatusCode::OK,
            r#"{"responses":[{"textAnnotations":[{"description":"first"},{"description":"second"}]}]}"#,
        )
        .unwrap();
        assert_eq!(text, "first");
    }

    #[test]
    fn test_interpret_no_annotation_is_empty_success() {
        assert_eq!(
            interpret_response(StatusCode::OK, r#"{"responses":[{}]}"#).unwrap(),
            ""
        );
        assert_eq!(interpret_response(StatusCode::OK, "{}").unwrap(), "");
    }

    #[test]
    fn test_interpret_malformed_body() {
        let err = interpret_response(StatusCode::OK, "<html>oops</html>").unwrap_err();
        match err {
            OcrError::RemoteError { status, body } => {
                assert_eq!(status, 200);
                assert!(body.starts_with("malformed response"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_interpret_embedded_error_without_annotation_is_empty_success() {
        let text = interpret_response(
            StatusCode::OK,
            r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#,
        )
        .unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_full_text_annotation_via_query_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images:annotate"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "requests": [{"features": [{"type": "TEXT_DETECTION", "maxResults": 1}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responses": [{"fullTextAnnotation": {"text": "ABC"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = backend_for(&server, CredentialPlacement::Query)
            .recognize(input())
            .await
            .unwrap();
        assert_eq!(result.text, "ABC");
        assert_eq!(result.backend, OcrBackendType::Vision);
    }

    #[tokio::test]
    async fn test_header_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{}]})))
            .expect(1)
            .mount(&server)
            .await;

        let result = backend_for(&server, CredentialPlacement::Header)
            .recognize(input())
            .await
            .unwrap();
        assert_eq!(result.text, "");
    }

    #[tokio::test]
    async fn test_forbidden_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .expect(1)
            .mount(&server)
            .await;

        let err = backend_for(&server, CredentialPlacement::Query)
            .recognize(input())
            .await
            .unwrap_err();
        match err {
            OcrError::RemoteError { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "API key not valid");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let err = backend_for(&server, CredentialPlacement::Query)
            .recognize(input())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::RemoteError { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let backend = VisionBackend::with_config(VisionConfig {
            endpoint: format!("{}/v1/images:annotate", server.uri()),
            api_key: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(!backend.is_available());

        let err = backend.recognize(input()).await.unwrap_err();
        assert!(matches!(err, OcrError::MisconfiguredBackend(_)));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"responses": [{}]}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let backend = VisionBackend::with_config(VisionConfig {
            endpoint: format!("{}/v1/images:annotate", server.uri()),
            api_key: Some("test-key".to_string()),
            timeout: Duration::from_millis(300),
            ..Default::default()
        })
        .unwrap();

        let err = backend.recognize(input()).await.unwrap_err();
        assert!(matches!(
            err,
            OcrError::BackendTimeout {
                backend: OcrBackendType::Vision,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        // Bind then drop a listener to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let backend = VisionBackend::with_config(VisionConfig {
            endpoint: format!("http://127.0.0.1:{}/v1/images:annotate", port),
            api_key: Some("secret-key".to_string()),
            ..Default::default()
        })
        .unwrap();

        let err = backend.recognize(input()).await.unwrap_err();
        match err {
            OcrError::TransportFailure(message) => {
                assert!(!message.is_empty());
                assert!(!message.contains("secret-key"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = VisionConfig {
            api_key: Some("super-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
