//! Ollama `/api/generate` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use sourcescout_shared::{LlmConfig, Result, SourceScoutError};

use crate::backend::{CompletionBackend, CompletionRequest, ResponseFormat};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Calls a local (or remote) Ollama server.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceScoutError::provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            format: match request.format {
                ResponseFormat::Json => Some("json"),
                ResponseFormat::Text => None,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceScoutError::provider(format!("ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SourceScoutError::provider(format!(
                "ollama returned HTTP {status}: {}",
                detail.trim()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SourceScoutError::provider(format!("invalid ollama response: {e}")))?;

        debug!(chars = parsed.response.len(), "ollama completion");
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sourcescout_shared::LlmProvider;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::Ollama,
            base_url: base_url.to_string(),
            model: "llama3:instruct".into(),
            api_key_env: "UNUSED".into(),
            timeout: Duration::from_secs(5),
            summarize_concurrency: 2,
            min_content_chars: 10,
            max_input_chars: 1000,
            max_summary_chars: 500,
        }
    }

    #[tokio::test]
    async fn json_mode_is_requested_for_json_prompts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3:instruct",
                "stream": false,
                "format": "json"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3:instruct",
                "response": "{\"reliable\": \"Yes\"}",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config(&server.uri())).unwrap();
        let out = client.complete(&CompletionRequest::json("score this")).await.unwrap();
        assert_eq!(out, "{\"reliable\": \"Yes\"}");
    }

    #[tokio::test]
    async fn text_prompt_omits_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "A short summary.",
                "done": true
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config(&server.uri())).unwrap();
        let out = client.complete(&CompletionRequest::text("summarize")).await.unwrap();
        assert_eq!(out, "A short summary.");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("format").is_none());
    }

    #[tokio::test]
    async fn server_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config(&server.uri())).unwrap();
        let err = client.complete(&CompletionRequest::text("x")).await.unwrap_err();
        assert!(matches!(err, SourceScoutError::Provider(_)));
        assert!(err.to_string().contains("model not loaded"));
    }
}
