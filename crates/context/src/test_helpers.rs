//! Shared test helpers: scripted inference and deterministic embeddings.

use async_trait::async_trait;
use recall_core::error::ProviderError;
use recall_core::provider::{CompletionRequest, EmbeddingProvider, InferenceProvider};
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the script. Once
/// the script runs out, the last response repeats.
pub struct ScriptedInferenceProvider {
    responses: Vec<Result<String, ProviderError>>,
    call_count: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInferenceProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        assert!(!responses.is_empty(), "script needs at least one response");
        Self {
            responses,
            call_count: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text.
    pub fn single(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    /// Always fail with the same error.
    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceProvider for ScriptedInferenceProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        self.prompts.lock().unwrap().push(request.prompt);
        let response = self.responses[(*count).min(self.responses.len() - 1)].clone();
        *count += 1;
        response
    }
}

/// Never answers within any sane timeout.
pub struct StallingInferenceProvider;

#[async_trait]
impl InferenceProvider for StallingInferenceProvider {
    fn name(&self) -> &str {
        "stalling_mock"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

const TOPICS: &[&[&str]] = &[
    &["cook", "recipe", "bake", "oven", "pasta"],
    &["travel", "flight", "hotel", "trip", "beach"],
    &["code", "rust", "compile", "bug", "deploy"],
];

/// Embeds text as per-topic keyword counts plus a small constant component,
/// so texts on the same topic are close and different topics are far apart.
pub struct TopicEmbedder {
    calls: Mutex<usize>,
}

impl TopicEmbedder {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn vectorize(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = TOPICS
            .iter()
            .map(|words| words.iter().filter(|w| lower.contains(*w)).count() as f32)
            .collect();
        v.push(0.05);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    fn name(&self) -> &str {
        "topic_mock"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        Ok(Self::vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

/// Embedding service that is always down.
pub struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    fn name(&self) -> &str {
        "unavailable_mock"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}
