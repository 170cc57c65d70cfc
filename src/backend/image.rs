use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::{GenerationBackend, GenerationRequest};
use crate::error::{Result, TaskRelayError};

use super::upstream_error_message;

/// Image-generations client for one model. Returns the base64-encoded
/// image bytes from the upstream response.
pub struct ImageBackend {
    client: Client,
    model: String,
    url: String,
    api_key: String,
    size: String,
}

#[derive(Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    response_format: String,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

impl ImageBackend {
    pub fn new(config: &Config, api_key: String, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.image.timeout_secs))
            .build()
            .map_err(|e| TaskRelayError::Config(format!("failed to create HTTP client: {e}")))?;

        let base = config.llm.base_url.trim_end_matches('/');

        Ok(Self {
            client,
            model: model.to_string(),
            url: format!("{base}/images/generations"),
            api_key,
            size: config.image.size.clone(),
        })
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ImageRequest {
            model: self.model.clone(),
            prompt: request.primary_input.clone(),
            n: 1,
            size: self.size.clone(),
            response_format: "b64_json".to_string(),
        };

        debug!(
            model = %self.model,
            size = %self.size,
            prompt_len = request.primary_input.len(),
            "invoking image generations API"
        );

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TaskRelayError::Backend(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let error_msg = upstream_error_message(&error_text);
            warn!(status = %status, error = %error_msg, "image API error");
            return Err(TaskRelayError::Backend(format!(
                "image API returned {status}: {error_msg}"
            )));
        }

        let image_resp: ImageResponse = resp
            .json()
            .await
            .map_err(|e| TaskRelayError::Backend(format!("failed to parse image response: {e}")))?;

        let payload = image_resp
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .unwrap_or_default();

        if payload.is_empty() {
            return Err(TaskRelayError::Backend("no image data in response".into()));
        }

        info!(
            payload_len = payload.len(),
            model = %self.model,
            "image response received"
        );

        Ok(payload)
    }
}

#[async_trait::async_trait]
impl GenerationBackend for ImageBackend {
    fn identifier(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<String> {
        self.generate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend_for(server: &mockito::Server) -> ImageBackend {
        let mut config = Config::default();
        config.llm.base_url = server.url();
        config.image.timeout_secs = 5;
        ImageBackend::new(&config, "test-key".into(), "test/image-model").unwrap()
    }

    #[tokio::test]
    async fn returns_base64_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/images/generations")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(json!({"data": [{"b64_json": "aGVsbG8="}]}).to_string())
            .create_async()
            .await;

        let backend = backend_for(&server);
        let request = GenerationRequest::image("a cat");
        let out = backend.invoke(&request).await.unwrap();

        assert_eq!(out, "aGVsbG8=");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_data_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body(json!({"data": []}).to_string())
            .create_async()
            .await;

        let backend = backend_for(&server);
        let request = GenerationRequest::image("a cat");
        let err = backend.invoke(&request).await.unwrap_err();
        assert!(err.to_string().contains("no image data"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/images/generations")
            .with_status(400)
            .with_body(json!({"error": {"message": "size not supported"}}).to_string())
            .create_async()
            .await;

        let backend = backend_for(&server);
        let request = GenerationRequest::image("a cat");
        let err = backend.invoke(&request).await.unwrap_err();
        assert!(err.to_string().contains("size not supported"));
    }
}
