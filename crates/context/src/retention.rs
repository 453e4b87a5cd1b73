//! Retention planning ("smart truncation").
//!
//! When a conversation outgrows its message cap, the planner keeps the
//! opening message, a window of the most recent messages, and the most
//! important earlier messages. Important exchanges are archived to
//! long-term memory before they can fall out of the window.
//!
//! # Selection
//!
//! | Slot | Count | Source |
//! |------|-------|--------|
//! | First message | 1 | Always kept, outside the cap |
//! | Recent | `ceil(max × recent_share)` | Newest messages |
//! | Important | `max − recent` | Highest scores among the rest, ties to the earlier message |

use crate::scoring::{
    Exchange, FallbackReason, ImportanceScore, ImportanceScorer, ScoreSource, heuristic_for,
};
use crate::token::estimate_conversation;
use recall_config::RetentionConfig;
use recall_core::memory::{MemoryId, NewMemory};
use recall_core::message::{Message, Role};
use recall_core::store::ConversationStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A message with its importance and original position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMessage {
    pub message: Message,
    pub importance: f32,
    pub rationale: String,
    pub preserve: bool,
    /// Position in the input slice.
    pub index: usize,
    pub source: ScoreSource,
}

impl ScoredMessage {
    fn new(message: &Message, index: usize, score: &ImportanceScore) -> Self {
        Self {
            message: message.clone(),
            importance: score.importance,
            rationale: score.rationale.clone(),
            preserve: score.should_preserve,
            index,
            source: score.source,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncationResult {
    /// Kept messages in chronological order.
    pub kept: Vec<Message>,
    /// Every scored message, in input order. Empty when nothing was cut.
    pub scored: Vec<ScoredMessage>,
    pub removed_count: usize,
    pub preserved_count: usize,
    pub archived_count: usize,
    pub archived_ids: Vec<MemoryId>,
    pub archive_failures: usize,
    pub tokens_saved: usize,
    /// `None` when no token budget was given.
    pub within_budget: Option<bool>,
    /// `"none"` or `"hybrid"`.
    pub strategy: String,
}

/// A contiguous run of messages scored together.
enum Segment {
    Exchange { user: usize, assistant: usize },
    Single(usize),
}

pub struct RetentionPlanner {
    scorer: Arc<ImportanceScorer>,
    store: Arc<dyn ConversationStore>,
    recent_share: f64,
    archive_threshold: f32,
}

impl RetentionPlanner {
    pub fn new(scorer: Arc<ImportanceScorer>, store: Arc<dyn ConversationStore>) -> Self {
        Self::from_config(scorer, store, &RetentionConfig::default())
    }

    pub fn from_config(
        scorer: Arc<ImportanceScorer>,
        store: Arc<dyn ConversationStore>,
        config: &RetentionConfig,
    ) -> Self {
        Self {
            scorer,
            store,
            recent_share: config.recent_share,
            archive_threshold: config.archive_threshold,
        }
    }

    /// Decide which messages stay in the active context.
    pub async fn plan(
        &self,
        messages: &[Message],
        max_messages: usize,
        token_budget: Option<usize>,
    ) -> TruncationResult {
        let original_tokens = estimate_conversation(messages);

        if messages.len().saturating_sub(1) <= max_messages {
            return TruncationResult {
                kept: messages.to_vec(),
                scored: Vec::new(),
                removed_count: 0,
                preserved_count: 0,
                archived_count: 0,
                archived_ids: Vec::new(),
                archive_failures: 0,
                tokens_saved: 0,
                within_budget: token_budget.map(|b| original_tokens <= b),
                strategy: "none".into(),
            };
        }

        let segments = segment(messages);
        let exchanges: Vec<Exchange> = segments
            .iter()
            .filter_map(|s| match *s {
                Segment::Exchange { user, assistant } => Some(Exchange::new(
                    messages[user].id,
                    messages[assistant].id,
                    messages[user].content.clone(),
                    messages[assistant].content.clone(),
                )),
                Segment::Single(_) => None,
            })
            .collect();
        let mut exchange_scores = self.scorer.score_batch(&exchanges).await;

        // Unpaired messages are always scored heuristically, so a plan that
        // also holds external scores is re-scored as a whole.
        let has_singles = segments.iter().any(|s| matches!(s, Segment::Single(_)));
        let mixed = has_singles && exchange_scores.iter().any(|s| s.source.is_external());
        if mixed {
            warn!(
                exchanges = exchanges.len(),
                "Unpaired messages alongside external scores, re-scoring plan heuristically"
            );
            exchange_scores = exchanges
                .iter()
                .map(|e| heuristic_for(&e.user, &e.assistant, FallbackReason::MixedBatch))
                .collect();
        }
        let single_reason = if mixed {
            FallbackReason::MixedBatch
        } else {
            FallbackReason::Unpaired
        };

        let mut scored: Vec<ScoredMessage> = Vec::with_capacity(messages.len() - 1);
        let mut archive: Vec<(&Exchange, &ImportanceScore)> = Vec::new();
        let mut next_exchange = exchanges.iter().zip(exchange_scores.iter());
        for segment in &segments {
            match *segment {
                Segment::Exchange { user, assistant } => {
                    let Some((exchange, score)) = next_exchange.next() else {
                        continue;
                    };
                    scored.push(ScoredMessage::new(&messages[user], user, score));
                    scored.push(ScoredMessage::new(&messages[assistant], assistant, score));
                    if score.importance >= self.archive_threshold {
                        archive.push((exchange, score));
                    }
                }
                Segment::Single(i) => {
                    let m = &messages[i];
                    let score = match m.role {
                        Role::Assistant => heuristic_for("", &m.content, single_reason),
                        Role::User | Role::System => heuristic_for(&m.content, "", single_reason),
                    };
                    scored.push(ScoredMessage::new(m, i, &score));
                }
            }
        }

        let (archived_ids, archive_failures) = self.archive(&archive, messages).await;

        let kept_indices = select(&scored, max_messages, self.recent_share);
        let mut kept = Vec::with_capacity(kept_indices.len() + 1);
        kept.push(messages[0].clone());
        kept.extend(kept_indices.iter().map(|&i| messages[i].clone()));

        let preserved_count = scored
            .iter()
            .filter(|s| s.preserve && kept_indices.binary_search(&s.index).is_ok())
            .count();

        let (tokens_saved, within_budget) = match token_budget {
            Some(budget) => {
                let kept_tokens = estimate_conversation(&kept);
                (
                    original_tokens.saturating_sub(kept_tokens),
                    Some(kept_tokens <= budget),
                )
            }
            None => (0, None),
        };

        info!(
            total = messages.len(),
            kept = kept.len(),
            archived = archived_ids.len(),
            archive_failures,
            "Retention plan computed"
        );

        TruncationResult {
            removed_count: messages.len() - kept.len(),
            kept,
            scored,
            preserved_count,
            archived_count: archived_ids.len(),
            archived_ids,
            archive_failures,
            tokens_saved,
            within_budget,
            strategy: "hybrid".into(),
        }
    }

    /// Store important exchanges as memories. Returns stored ids and the
    /// number of failed writes.
    async fn archive(
        &self,
        exchanges: &[(&Exchange, &ImportanceScore)],
        messages: &[Message],
    ) -> (Vec<MemoryId>, usize) {
        let mut ids = Vec::with_capacity(exchanges.len());
        let mut failures = 0;

        for (exchange, score) in exchanges {
            let created_at = messages
                .iter()
                .find(|m| m.id == exchange.assistant_message_id)
                .map(|m| m.created_at)
                .unwrap_or_else(chrono::Utc::now);
            let memory = NewMemory {
                content: format!("user: {}\nassistant: {}", exchange.user, exchange.assistant),
                importance: score.importance,
                source_key: NewMemory::exchange_key(
                    exchange.user_message_id,
                    exchange.assistant_message_id,
                ),
                tags: vec!["exchange".into()],
                created_at,
            };

            match self.store.store_memory(memory).await {
                Ok(record) => {
                    debug!(memory_id = record.id, source = %record.source_key, "Archived exchange");
                    ids.push(record.id);
                }
                Err(e) => {
                    warn!(
                        store = %self.store.name(),
                        user_message_id = exchange.user_message_id,
                        error = %e,
                        "Failed to archive exchange"
                    );
                    failures += 1;
                }
            }
        }

        (ids, failures)
    }
}

/// Pair each user message with the assistant reply right after it. The
/// first message is never part of a segment.
fn segment(messages: &[Message]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut i = 1;
    while i < messages.len() {
        let pairs = messages[i].role == Role::User
            && messages
                .get(i + 1)
                .is_some_and(|next| next.role == Role::Assistant);
        if pairs {
            segments.push(Segment::Exchange {
                user: i,
                assistant: i + 1,
            });
            i += 2;
        } else {
            segments.push(Segment::Single(i));
            i += 1;
        }
    }
    segments
}

/// Pick up to `max` indices from `scored` (sorted by index): the most recent
/// ones plus the most important earlier ones. Returned ascending.
fn select(scored: &[ScoredMessage], max: usize, recent_share: f64) -> Vec<usize> {
    let recent_slots = ((max as f64 * recent_share.clamp(0.0, 1.0)).ceil() as usize).min(max);
    let recent_count = recent_slots.min(scored.len());
    let split = scored.len() - recent_count;
    let (earlier, recent) = scored.split_at(split);

    let mut ranked: Vec<&ScoredMessage> = earlier.iter().collect();
    ranked.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });

    let mut kept: Vec<usize> = ranked
        .into_iter()
        .take(max - recent_slots)
        .map(|s| s.index)
        .chain(recent.iter().map(|s| s.index))
        .collect();
    kept.sort_unstable();
    kept.dedup();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedInferenceProvider;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use recall_core::chapter::{Chapter, ChapterClosure, NewChapter};
    use recall_core::error::StoreError;
    use recall_core::memory::MemoryRecord;
    use recall_core::message::{ChapterId, MessageId, NewMessage};
    use recall_memory::InMemoryStore;
    use std::time::Duration;

    fn conversation(turns: usize) -> Vec<Message> {
        let mut messages = vec![Message::system(1, "You are a helpful companion.")];
        for t in 0..turns {
            let id = messages.len() as i64 + 1;
            messages.push(Message::user(id, format!("question number {t}")));
            messages.push(Message::assistant(id + 1, format!("answer number {t}")));
        }
        messages
    }

    fn planner(store: Arc<dyn ConversationStore>) -> RetentionPlanner {
        RetentionPlanner::new(Arc::new(ImportanceScorer::heuristic_only()), store)
    }

    #[tokio::test]
    async fn short_conversation_is_untouched() {
        let messages = conversation(3); // 7 messages
        let result = planner(Arc::new(InMemoryStore::new()))
            .plan(&messages, 6, Some(1000))
            .await;

        assert_eq!(result.strategy, "none");
        assert_eq!(result.kept, messages);
        assert_eq!(result.removed_count, 0);
        assert_eq!(result.tokens_saved, 0);
        assert_eq!(result.within_budget, Some(true));
    }

    #[tokio::test]
    async fn empty_conversation_is_untouched() {
        let result = planner(Arc::new(InMemoryStore::new())).plan(&[], 5, None).await;
        assert!(result.kept.is_empty());
        assert_eq!(result.within_budget, None);
    }

    #[tokio::test]
    async fn long_conversation_keeps_first_and_recent() {
        let messages = conversation(10); // 21 messages
        let result = planner(Arc::new(InMemoryStore::new()))
            .plan(&messages, 10, None)
            .await;

        assert_eq!(result.strategy, "hybrid");
        assert_eq!(result.kept.len(), 11);
        assert_eq!(result.kept[0].id, 1);
        assert_eq!(result.removed_count, 10);
        // ceil(10 × 0.6) = 6 most recent
        let tail: Vec<_> = result.kept[5..].iter().map(|m| m.id).collect();
        assert_eq!(tail, vec![16, 17, 18, 19, 20, 21]);
        // chronological
        assert!(result.kept.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(result.scored.len(), 20);
        assert_eq!(result.within_budget, None);
        assert_eq!(result.tokens_saved, 0);
    }

    #[tokio::test]
    async fn important_earlier_exchange_survives() {
        let mut messages = conversation(10);
        // Exchange at ids 4/5 becomes emotionally salient.
        messages[3].content = "I love my sister, please remember her birthday".into();
        let result = planner(Arc::new(InMemoryStore::new()))
            .plan(&messages, 6, None)
            .await;

        let ids: Vec<_> = result.kept.iter().map(|m| m.id).collect();
        assert!(ids.contains(&4));
        assert!(ids.contains(&5));
        assert_eq!(result.kept.len(), 7);
    }

    #[tokio::test]
    async fn ties_prefer_earlier_messages() {
        let messages = conversation(10);
        let result = planner(Arc::new(InMemoryStore::new()))
            .plan(&messages, 5, None)
            .await;
        // recent = ceil(3) = 3, important = 2 → earliest two after the first
        let ids: Vec<_> = result.kept.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 19, 20, 21]);
    }

    #[tokio::test]
    async fn token_accounting_with_budget() {
        let messages = conversation(10);
        let result = planner(Arc::new(InMemoryStore::new()))
            .plan(&messages, 4, Some(10))
            .await;

        let kept_tokens = estimate_conversation(&result.kept);
        assert_eq!(
            result.tokens_saved,
            estimate_conversation(&messages) - kept_tokens
        );
        assert_eq!(result.within_budget, Some(false));
    }

    #[tokio::test]
    async fn important_exchanges_are_archived_once() {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(ScriptedInferenceProvider::single(
            r#"{"importance": 0.8, "rationale": "personal"}"#,
        ));
        let scorer = Arc::new(ImportanceScorer::new(Some(provider), Duration::from_secs(5)));
        let planner = RetentionPlanner::new(scorer, store.clone());
        let messages = conversation(5);

        let first = planner.plan(&messages, 4, None).await;
        assert_eq!(first.archived_count, 5);
        assert_eq!(first.archive_failures, 0);
        assert!(first.preserved_count > 0);

        let second = planner.plan(&messages, 4, None).await;
        assert_eq!(second.archived_ids, first.archived_ids);
        assert_eq!(store.memory_count().await.unwrap(), 5);

        let memory = store
            .find_memory_by_source("exchange:2:3")
            .await
            .unwrap()
            .unwrap();
        assert!(memory.content.starts_with("user: question number 0"));
    }

    #[tokio::test]
    async fn low_scores_are_not_archived() {
        let store = Arc::new(InMemoryStore::new());
        let result = planner(store.clone()).plan(&conversation(5), 4, None).await;
        assert_eq!(result.archived_count, 0);
        assert_eq!(store.memory_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unpaired_messages_are_scored_alone() {
        let mut messages = conversation(4);
        messages.push(Message::user(10, "are you there?"));
        messages.push(Message::user(11, "hello?"));
        let result = planner(Arc::new(InMemoryStore::new()))
            .plan(&messages, 4, None)
            .await;

        let last = result.scored.last().unwrap();
        assert_eq!(last.message.id, 11);
        // base + question
        assert!((last.importance - 0.4).abs() < 1e-5);
        assert_eq!(
            last.source,
            ScoreSource::Heuristic {
                reason: FallbackReason::Unpaired
            }
        );
        assert_eq!(result.scored.len(), messages.len() - 1);
    }

    #[tokio::test]
    async fn unpaired_messages_force_heuristic_plan_with_external_scorer() {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(ScriptedInferenceProvider::single(
            r#"{"importance": 0.9, "rationale": "personal"}"#,
        ));
        let scorer = Arc::new(ImportanceScorer::new(Some(provider), Duration::from_secs(5)));
        let planner = RetentionPlanner::new(scorer, store.clone());

        let mut messages = conversation(4);
        messages.push(Message::user(10, "are you there?"));
        messages.push(Message::user(11, "hello?"));
        let result = planner.plan(&messages, 4, None).await;

        assert_eq!(result.scored.len(), messages.len() - 1);
        assert!(result.scored.iter().all(|s| s.source
            == ScoreSource::Heuristic {
                reason: FallbackReason::MixedBatch
            }));
        // Heuristic scores for plain questions stay under the archive bar.
        assert_eq!(result.archived_count, 0);
        assert_eq!(store.memory_count().await.unwrap(), 0);
    }

    /// A store whose memory writes always fail.
    struct BrokenArchive(InMemoryStore);

    #[async_trait]
    impl ConversationStore for BrokenArchive {
        fn name(&self) -> &str {
            "broken"
        }
        async fn append_message(&self, m: NewMessage) -> Result<Message, StoreError> {
            self.0.append_message(m).await
        }
        async fn get_message(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
            self.0.get_message(id).await
        }
        async fn messages_in_range(
            &self,
            start: MessageId,
            end: Option<MessageId>,
        ) -> Result<Vec<Message>, StoreError> {
            self.0.messages_in_range(start, end).await
        }
        async fn recent_messages(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
            self.0.recent_messages(limit).await
        }
        async fn assign_chapter(&self, m: MessageId, c: ChapterId) -> Result<(), StoreError> {
            self.0.assign_chapter(m, c).await
        }
        async fn open_chapter(&self) -> Result<Option<Chapter>, StoreError> {
            self.0.open_chapter().await
        }
        async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
            self.0.get_chapter(id).await
        }
        async fn create_chapter(&self, c: NewChapter) -> Result<Chapter, StoreError> {
            self.0.create_chapter(c).await
        }
        async fn set_chapter_centroid(
            &self,
            id: ChapterId,
            centroid: Vec<f32>,
        ) -> Result<Vec<f32>, StoreError> {
            self.0.set_chapter_centroid(id, centroid).await
        }
        async fn close_and_open(
            &self,
            id: ChapterId,
            expected_version: u64,
            closure: ChapterClosure,
            successor: NewChapter,
        ) -> Result<(Chapter, Chapter), StoreError> {
            self.0.close_and_open(id, expected_version, closure, successor).await
        }
        async fn list_chapters(&self) -> Result<Vec<Chapter>, StoreError> {
            self.0.list_chapters().await
        }
        async fn store_memory(&self, _memory: NewMemory) -> Result<MemoryRecord, StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
        async fn find_memory_by_source(
            &self,
            key: &str,
        ) -> Result<Option<MemoryRecord>, StoreError> {
            self.0.find_memory_by_source(key).await
        }
        async fn recent_memories(&self, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
            self.0.recent_memories(limit).await
        }
        async fn memories_before(
            &self,
            before: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<MemoryRecord>, StoreError> {
            self.0.memories_before(before, limit).await
        }
        async fn memory_count(&self) -> Result<usize, StoreError> {
            self.0.memory_count().await
        }
    }

    #[tokio::test]
    async fn archive_failures_are_counted_not_fatal() {
        let provider = Arc::new(ScriptedInferenceProvider::single(r#"{"importance": 0.9}"#));
        let scorer = Arc::new(ImportanceScorer::new(Some(provider), Duration::from_secs(5)));
        let planner = RetentionPlanner::new(scorer, Arc::new(BrokenArchive(InMemoryStore::new())));

        let result = planner.plan(&conversation(5), 4, None).await;
        assert_eq!(result.archive_failures, 5);
        assert_eq!(result.archived_count, 0);
        assert_eq!(result.kept.len(), 5);
    }
}
