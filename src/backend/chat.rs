use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::{GenerationBackend, GenerationRequest};
use crate::error::{Result, TaskRelayError};
use crate::prompts;

use super::upstream_error_message;

/// Chat-completions client for one model on an OpenAI-compatible endpoint
/// (OpenRouter by default). Q&A and content generation differ only in the
/// sampling parameters they are constructed with.
pub struct ChatBackend {
    client: Client,
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    max_tokens: usize,
    /// Optional site URL sent as `HTTP-Referer` for OpenRouter analytics.
    site_url: Option<String>,
    /// Optional app name sent as `X-Title` for the OpenRouter dashboard.
    app_name: Option<String>,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatBackend {
    /// Build a client for `model` with the given sampling parameters. The
    /// endpoint, timeout, and attribution headers come from config.
    pub fn new(
        config: &Config,
        api_key: String,
        model: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()
            .map_err(|e| TaskRelayError::Config(format!("failed to create HTTP client: {e}")))?;

        let base = config.llm.base_url.trim_end_matches('/');

        Ok(Self {
            client,
            model: model.to_string(),
            url: format!("{base}/chat/completions"),
            api_key,
            temperature,
            max_tokens,
            site_url: non_empty(&config.llm.site_url),
            app_name: non_empty(&config.llm.app_name),
        })
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let (system, user) = prompts::chat_messages(request);

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            model = %self.model,
            prompt_len = request.primary_input.len(),
            max_tokens = self.max_tokens,
            "invoking chat completions API"
        );

        let mut req = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if let Some(ref site_url) = self.site_url {
            req = req.header("HTTP-Referer", site_url.as_str());
        }
        if let Some(ref app_name) = self.app_name {
            req = req.header("X-Title", app_name.as_str());
        }

        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| TaskRelayError::Backend(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let error_msg = upstream_error_message(&error_text);
            warn!(status = %status, error = %error_msg, "chat API error");
            return Err(TaskRelayError::Backend(format!(
                "chat API returned {status}: {error_msg}"
            )));
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .map_err(|e| TaskRelayError::Backend(format!("failed to parse chat response: {e}")))?;

        let response = chat_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        info!(
            response_len = response.len(),
            model = %self.model,
            "chat response received"
        );

        if response.is_empty() {
            return Err(TaskRelayError::Backend("empty chat response".into()));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl GenerationBackend for ChatBackend {
    fn identifier(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<String> {
        self.complete(request).await
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend_for(server: &mockito::Server) -> ChatBackend {
        let mut config = Config::default();
        config.llm.base_url = server.url();
        config.llm.timeout_secs = 5;
        ChatBackend::new(&config, "test-key".into(), "test/model", 0.7, 256).unwrap()
    }

    #[tokio::test]
    async fn returns_completion_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{"message": {"role": "assistant", "content": "  Rust is a systems language.  "}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = backend_for(&server);
        let request = GenerationRequest::text("what is rust?");
        let out = backend.invoke(&request).await.unwrap();

        assert_eq!(out, "Rust is a systems language.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body(json!({"error": {"message": "model overloaded"}}).to_string())
            .create_async()
            .await;

        let backend = backend_for(&server);
        let request = GenerationRequest::text("q");
        let err = backend.invoke(&request).await.unwrap_err();
        assert!(err.to_string().contains("model overloaded"));
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "   "}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let backend = backend_for(&server);
        let request = GenerationRequest::text("q");
        let err = backend.invoke(&request).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;

        let backend = backend_for(&server);
        let request = GenerationRequest::text("q");
        assert!(backend.invoke(&request).await.is_err());
    }
}
