//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/chat/completions` and `/embeddings`.
//!
//! Implements both `InferenceProvider` (ratings, chapter summaries) and
//! `EmbeddingProvider` (topic centroids, memory recall).

use async_trait::async_trait;
use recall_config::ProviderConfig;
use recall_core::error::ProviderError;
use recall_core::provider::{CompletionRequest, EmbeddingProvider, InferenceProvider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible LLM + embedding provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: embedding_model.into(),
            timeout_secs: request_timeout.as_secs(),
            client,
        })
    }

    /// Build from the `[provider]` config section.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("no API key configured".into()))?;
        Self::new(
            "openai_compat",
            config.api_url.clone(),
            api_key,
            config.model.clone(),
            config.embedding_model.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(
        base_url: Option<&str>,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
            embedding_model,
            Duration::from_secs(120),
        )
    }

    /// Build the chat-completions request body.
    fn chat_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ApiMessage {
                role: "system".into(),
                content: system.clone(),
            });
        }
        messages.push(ApiMessage {
            role: "user".into(),
            content: request.prompt.clone(),
        });

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_secs)
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if let Some(err) = status_error(status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(match err {
                ProviderError::ApiError { status_code, .. } => ProviderError::ApiError {
                    status_code,
                    message: error_body,
                },
                other => other,
            });
        }
        Ok(response)
    }
}

/// Map a non-success HTTP status to a provider error.
fn status_error(status: u16) -> Option<ProviderError> {
    match status {
        200..=299 => None,
        429 => Some(ProviderError::RateLimited {
            retry_after_secs: 5,
        }),
        401 | 403 => Some(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        )),
        _ => Some(ProviderError::ApiError {
            status_code: status,
            message: String::new(),
        }),
    }
}

/// Pull the first choice's text out of a chat-completions response.
fn parse_chat_response(api_response: ChatApiResponse) -> Result<String, ProviderError> {
    api_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))
}

/// Order embeddings by their `index` field and check the count.
fn parse_embedding_response(
    api_response: EmbeddingApiResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let mut data = api_response.data;
    data.sort_by_key(|d| d.index);
    if data.len() != expected {
        return Err(ProviderError::MalformedResponse(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl InferenceProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        debug!(provider = %self.name, model = %self.model, "Sending completion request");
        let body = self.chat_body(&request);
        let response = self.post("chat/completions", &body).await?;

        let api_response: ChatApiResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;
        parse_chat_response(api_response)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::MalformedResponse("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": texts,
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %self.embedding_model,
            count = texts.len(),
            "Sending embedding request"
        );

        let response = self.post("embeddings", &body).await?;
        let api_response: EmbeddingApiResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse embeddings: {e}"))
        })?;
        parse_embedding_response(api_response, texts.len())
    }
}

// ── OpenAI wire types ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(
            "test",
            "https://example.invalid/v1/",
            "sk-test",
            "gpt-test",
            "embed-test",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        assert_eq!(provider().base_url, "https://example.invalid/v1");
    }

    #[test]
    fn ollama_constructor() {
        let p = OpenAiCompatProvider::ollama(None, "llama3", "nomic-embed-text").unwrap();
        assert_eq!(InferenceProvider::name(&p), "ollama");
        assert!(p.base_url.contains("11434"));
    }

    #[test]
    fn from_config_requires_api_key() {
        let config = ProviderConfig::default();
        assert!(matches!(
            OpenAiCompatProvider::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));

        let config = ProviderConfig {
            api_key: Some("sk-x".into()),
            ..ProviderConfig::default()
        };
        let p = OpenAiCompatProvider::from_config(&config).unwrap();
        assert_eq!(p.model, "gpt-4o-mini");
    }

    #[test]
    fn chat_body_includes_system_and_limits() {
        let req = CompletionRequest::new("Rate this")
            .with_system("You are a rater")
            .with_max_tokens(100);
        let body = provider().chat_body(&req);

        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Rate this");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn chat_body_without_system() {
        let body = provider().chat_body(&CompletionRequest::new("hi"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(status_error(200).is_none());
        assert!(matches!(status_error(429), Some(ProviderError::RateLimited { .. })));
        assert!(matches!(
            status_error(401),
            Some(ProviderError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            status_error(500),
            Some(ProviderError::ApiError { status_code: 500, .. })
        ));
    }

    #[test]
    fn parse_chat_content() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"{\"importance\":0.4}"}}],"model":"m"}"#;
        let parsed: ChatApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parse_chat_response(parsed).unwrap(), "{\"importance\":0.4}");
    }

    #[test]
    fn parse_chat_without_choices_is_malformed() {
        let parsed: ChatApiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            parse_chat_response(parsed),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn parse_embedding_response_orders_by_index() {
        let json = r#"{
            "data": [
                {"embedding": [0.3, 0.4], "index": 1},
                {"embedding": [0.1, 0.2], "index": 0}
            ],
            "model": "embed-test"
        }"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(json).unwrap();
        let vectors = parse_embedding_response(parsed, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn parse_embedding_response_count_mismatch() {
        let parsed: EmbeddingApiResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[1.0],"index":0}]}"#).unwrap();
        assert!(parse_embedding_response(parsed, 2).is_err());
    }

    #[tokio::test]
    async fn empty_batch_skips_network() {
        let vectors = provider().embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
