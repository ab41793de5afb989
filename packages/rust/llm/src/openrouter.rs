//! OpenRouter / OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use sourcescout_shared::{LlmConfig, Result, SourceScoutError};

use crate::backend::{CompletionBackend, CompletionRequest, ResponseFormat};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<JsonFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Calls `POST {base_url}/chat/completions` with a bearer key.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenRouterClient {
    /// Reads the API key from the env var named by `config.api_key_env`.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                SourceScoutError::config(format!(
                    "OpenRouter API key not found. Set the {} environment variable.",
                    config.api_key_env
                ))
            })?;
        Self::with_key(config, api_key)
    }

    /// Build a client with an explicit key.
    pub fn with_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceScoutError::provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenRouterClient {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            response_format: match request.format {
                ResponseFormat::Json => Some(JsonFormat { kind: "json_object" }),
                ResponseFormat::Text => None,
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceScoutError::provider(format!("openrouter request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SourceScoutError::provider(format!(
                "openrouter returned HTTP {status}: {}",
                detail.trim()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SourceScoutError::provider(format!("invalid openrouter response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SourceScoutError::provider("openrouter response had no choices"))?;

        debug!(chars = content.len(), "openrouter completion");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sourcescout_shared::LlmProvider;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str, key_env: &str) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::Openrouter,
            base_url: base_url.to_string(),
            model: "meta-llama/llama-3-8b-instruct".into(),
            api_key_env: key_env.into(),
            timeout: Duration::from_secs(5),
            summarize_concurrency: 2,
            min_content_chars: 10,
            max_input_chars: 1000,
            max_summary_chars: 500,
        }
    }

    #[tokio::test]
    async fn sends_bearer_key_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gen-1",
                "choices": [{"message": {"role": "assistant", "content": "{\"reliable\": \"No\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_key(&config(&server.uri(), "UNUSED"), "sk-test").unwrap();
        let out = client.complete(&CompletionRequest::json("score")).await.unwrap();
        assert_eq!(out, "{\"reliable\": \"No\"}");
    }

    #[tokio::test]
    async fn empty_choices_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_key(&config(&server.uri(), "UNUSED"), "k").unwrap();
        let err = client.complete(&CompletionRequest::text("x")).await.unwrap_err();
        assert!(matches!(err, SourceScoutError::Provider(_)));
    }

    #[test]
    fn missing_key_is_config_error() {
        let result = OpenRouterClient::new(&config("http://unused", "SS_TEST_NO_SUCH_KEY_98765"));
        assert!(matches!(result, Err(SourceScoutError::Config { .. })));
    }
}
