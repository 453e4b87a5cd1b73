//! Long-term memory recall.
//!
//! Pulls a pool of recent memories from the store, embeds them through the
//! shared cached embedder, drops those below the similarity floor and picks
//! a relevant but non-redundant subset with maximal marginal relevance.

use crate::budget::ContextComponent;
use recall_config::RecallConfig;
use recall_core::error::Result;
use recall_core::memory::MemoryRecord;
use recall_core::store::ConversationStore;
use recall_memory::{CachedEmbedder, diversity_select, vector_search};
use std::sync::Arc;
use tracing::debug;

const SECTION_HEADER: &str = "[Relevant Memories]";

pub struct MemoryRecall {
    store: Arc<dyn ConversationStore>,
    embedder: Arc<CachedEmbedder>,
    candidate_pool: usize,
    limit: usize,
    lambda: f32,
    min_score: f32,
}

impl MemoryRecall {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        embedder: Arc<CachedEmbedder>,
        config: &RecallConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            candidate_pool: config.candidate_pool,
            limit: config.limit,
            lambda: config.lambda,
            min_score: config.min_score,
        }
    }

    /// Memories for `query`, most useful first. `score` holds each record's
    /// similarity to the query.
    pub async fn recall(&self, query: &str) -> Result<Vec<MemoryRecord>> {
        let candidates = self.store.recent_memories(self.candidate_pool).await?;
        if candidates.is_empty() || self.limit == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let texts: Vec<String> = candidates.iter().map(|m| m.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let embedded: Vec<MemoryRecord> = candidates
            .into_iter()
            .zip(vectors)
            .map(|(mut record, vector)| {
                record.embedding = Some(vector);
                record
            })
            .collect();
        // Ranked by similarity with `score` set; everything under the floor is gone.
        let relevant = vector_search(&embedded, &query_vector, embedded.len(), self.min_score);
        if relevant.is_empty() {
            debug!(candidates = embedded.len(), "No memory above the similarity floor");
            return Ok(Vec::new());
        }

        let relevant_vectors: Vec<Vec<f32>> = relevant
            .iter()
            .filter_map(|m| m.embedding.clone())
            .collect();
        let picks = diversity_select(&relevant_vectors, &query_vector, self.limit, self.lambda)?;
        debug!(
            candidates = embedded.len(),
            relevant = relevant.len(),
            selected = picks.len(),
            "Recalled memories"
        );

        Ok(picks.into_iter().map(|i| relevant[i].clone()).collect())
    }

    /// Recalled memories rendered as one prompt component, or `None` when
    /// nothing was recalled.
    pub async fn component(&self, query: &str, priority: i32) -> Result<Option<ContextComponent>> {
        let memories = self.recall(query).await?;
        if memories.is_empty() {
            return Ok(None);
        }
        Ok(Some(ContextComponent::new(
            "memories",
            priority,
            render_memories(&memories),
        )))
    }
}

/// One bullet per memory under a section header.
pub fn render_memories(memories: &[MemoryRecord]) -> String {
    let mut out = String::from(SECTION_HEADER);
    for memory in memories {
        out.push_str("\n- ");
        out.push_str(&memory.content.replace('\n', " "));
    }
    out
}
