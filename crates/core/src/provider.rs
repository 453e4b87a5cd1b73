//! Provider traits: the narrow contract with inference and embedding services.
//!
//! The context engine never talks to a model directly; it calls these traits
//! and treats every failure as recoverable where a fallback exists.

use crate::error::ProviderError;
use crate::json::extract_json_object;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single-turn completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Optional system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The user prompt
    pub prompt: String,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.2
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Text generation service.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get the generated text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;

    /// Send a request that is expected to answer with a JSON object.
    ///
    /// The first well-formed top-level object in the response is returned;
    /// surrounding prose is ignored.
    async fn complete_json(
        &self,
        request: CompletionRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let text = self.complete(request).await?;
        extract_json_object(&text).ok_or_else(|| {
            ProviderError::MalformedResponse(format!(
                "no JSON object in {} chars of output from '{}'",
                text.len(),
                self.name()
            ))
        })
    }
}

/// Text embedding service.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed several texts, one vector per input in order.
    ///
    /// Default implementation embeds sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
