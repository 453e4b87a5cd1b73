//! Cache-fronted embedding lookups.
//!
//! Embedding generation has no fallback: a provider failure or timeout is
//! surfaced to the caller. Successful vectors are cached by their exact text.

use crate::cache::EmbeddingCache;
use recall_core::error::ProviderError;
use recall_core::provider::EmbeddingProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct CachedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
    timeout: Duration,
}

impl CachedEmbedder {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<EmbeddingCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
        }
    }

    /// The shared cache behind this embedder.
    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    /// Embed one text, serving from cache when possible.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if let Some(hit) = self.cache.get(text) {
            return Ok(hit);
        }

        let vector = match tokio::time::timeout(self.timeout, self.provider.embed(text)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(provider = %self.provider.name(), "Embedding request timed out");
                return Err(ProviderError::Timeout(self.timeout.as_secs()));
            }
        };

        self.cache.set(text, vector.clone());
        Ok(vector)
    }

    /// Embed several texts. Only cache misses are sent to the provider, in a
    /// single batch call.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.cache.get(t)).collect();
        let missing: Vec<usize> = out
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.is_none().then_some(i))
            .collect();

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            debug!(
                provider = %self.provider.name(),
                requested = texts.len(),
                fetching = batch.len(),
                "Embedding batch"
            );

            let vectors =
                match tokio::time::timeout(self.timeout, self.provider.embed_batch(&batch)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!(provider = %self.provider.name(), "Embedding batch timed out");
                        return Err(ProviderError::Timeout(self.timeout.as_secs()));
                    }
                };

            if vectors.len() != batch.len() {
                return Err(ProviderError::MalformedResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for (&i, vector) in missing.iter().zip(vectors) {
                self.cache.set(texts[i].clone(), vector.clone());
                out[i] = Some(vector);
            }
        }

        Ok(out.into_iter().flatten().collect())
    }
}
