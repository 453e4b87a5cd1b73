//! Chapter boundary detection.
//!
//! One chapter is open at a time. After each message, `check_boundary`
//! decides whether the open chapter continues or closes, and on closure
//! opens its successor at the next message id in the same store write.
//!
//! # Triggers (checked in order)
//!
//! | Trigger | Condition |
//! |---------|-----------|
//! | Gap | Last two messages further apart than `gap_minutes` |
//! | HardCap | Chapter holds `hard_cap` messages or more |
//! | TopicDrift | At least `drift_min_messages`, and the newest message's similarity to the frozen centroid is below `drift_threshold` |
//!
//! Checks on one segmenter are serialized by an async mutex; concurrent
//! segmenters on the same store are arbitrated by the store's version
//! check, and the loser reports `Superseded`.

use crate::chapters::open_cache::OpenChapterCache;
use crate::chapters::summarizer::ChapterSummarizer;
use recall_config::ChapterConfig;
use recall_core::chapter::{Chapter, ChapterClosure, NewChapter};
use recall_core::error::{Error, Result, StoreError};
use recall_core::message::{ChapterId, Message, MessageId};
use recall_core::store::ConversationStore;
use recall_memory::{CachedEmbedder, cosine_similarity, mean_vector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What closed a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryTrigger {
    Gap,
    HardCap,
    TopicDrift,
}

impl std::fmt::Display for BoundaryTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Gap => "gap",
            Self::HardCap => "hard_cap",
            Self::TopicDrift => "topic_drift",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryOutcome {
    /// No chapter was open; one was started at the latest message.
    Opened(Chapter),
    /// The open chapter has no messages up to the latest id.
    Empty(ChapterId),
    Continued(ChapterId),
    Closed {
        closed: Chapter,
        opened: Chapter,
        trigger: BoundaryTrigger,
    },
    /// Another writer closed the chapter first.
    Superseded(ChapterId),
}

pub struct ChapterSegmenter {
    store: Arc<dyn ConversationStore>,
    embedder: Arc<CachedEmbedder>,
    summarizer: ChapterSummarizer,
    config: ChapterConfig,
    writer: Mutex<()>,
    open_cache: OpenChapterCache,
}

impl ChapterSegmenter {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        embedder: Arc<CachedEmbedder>,
        summarizer: ChapterSummarizer,
        config: ChapterConfig,
    ) -> Self {
        let open_cache = OpenChapterCache::new(config.open_cache_ttl());
        Self {
            store,
            embedder,
            summarizer,
            config,
            writer: Mutex::new(()),
            open_cache,
        }
    }

    /// The open chapter, served from a short-lived cache when fresh.
    pub async fn current_open_chapter(&self) -> Result<Option<Chapter>> {
        if let Some(chapter) = self.open_cache.get() {
            return Ok(Some(chapter));
        }
        let chapter = self.store.open_chapter().await?;
        match &chapter {
            Some(c) => self.open_cache.put(c.clone()),
            None => self.open_cache.invalidate(),
        }
        Ok(chapter)
    }

    /// Evaluate the open chapter after `latest_message_id` was appended.
    pub async fn check_boundary(&self, latest_message_id: MessageId) -> Result<BoundaryOutcome> {
        let _guard = self.writer.lock().await;

        let Some(chapter) = self.store.open_chapter().await? else {
            return self.bootstrap(latest_message_id).await;
        };

        let messages = self
            .store
            .messages_in_range(chapter.start_message_id, Some(latest_message_id))
            .await?;
        let Some(last) = messages.last() else {
            return Ok(BoundaryOutcome::Empty(chapter.id));
        };
        if last.id == latest_message_id {
            self.store
                .assign_chapter(latest_message_id, chapter.id)
                .await?;
        }

        let Some(trigger) = self.detect_trigger(&chapter, &messages).await? else {
            debug!(chapter_id = chapter.id, messages = messages.len(), "Chapter continues");
            return Ok(BoundaryOutcome::Continued(chapter.id));
        };

        self.close(chapter, &messages, trigger).await
    }

    /// Open a chapter when none is open. It starts right after the last
    /// closed chapter so no message is left without one, or at the latest
    /// message when nothing was ever closed.
    async fn bootstrap(&self, latest_message_id: MessageId) -> Result<BoundaryOutcome> {
        let start = self
            .store
            .list_chapters()
            .await?
            .iter()
            .filter_map(|c| c.end_message_id)
            .max()
            .map_or(latest_message_id, |end| end + 1);
        let opened = self
            .store
            .create_chapter(NewChapter::starting_at(start))
            .await?;
        for message in self
            .store
            .messages_in_range(start, Some(latest_message_id))
            .await?
        {
            self.store.assign_chapter(message.id, opened.id).await?;
        }

        info!(chapter_id = opened.id, start, "Opened chapter");
        self.open_cache.put(opened.clone());
        Ok(BoundaryOutcome::Opened(opened))
    }

    async fn detect_trigger(
        &self,
        chapter: &Chapter,
        messages: &[Message],
    ) -> Result<Option<BoundaryTrigger>> {
        if let [.., previous, newest] = messages {
            let gap = newest.created_at - previous.created_at;
            if gap > chrono::Duration::minutes(self.config.gap_minutes) {
                return Ok(Some(BoundaryTrigger::Gap));
            }
        }

        if messages.len() >= self.config.hard_cap {
            return Ok(Some(BoundaryTrigger::HardCap));
        }

        if messages.len() >= self.config.drift_min_messages {
            let centroid = self.centroid(chapter, messages).await?;
            let Some(newest) = messages.last() else {
                return Ok(None);
            };
            let embedding = self.embedder.embed(&newest.content).await?;
            let similarity = cosine_similarity(&centroid, &embedding)?;
            debug!(chapter_id = chapter.id, similarity, "Topic similarity");
            if similarity < self.config.drift_threshold {
                return Ok(Some(BoundaryTrigger::TopicDrift));
            }
        }

        Ok(None)
    }

    /// The chapter's frozen centroid, computing and storing it on first use.
    async fn centroid(&self, chapter: &Chapter, messages: &[Message]) -> Result<Vec<f32>> {
        if let Some(centroid) = &chapter.centroid {
            return Ok(centroid.clone());
        }

        let window = self.config.centroid_window.max(1);
        let texts: Vec<String> = messages
            .iter()
            .rev()
            .take(window)
            .map(|m| m.content.clone())
            .collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        let centroid = mean_vector(&vectors)?;

        let stored = self
            .store
            .set_chapter_centroid(chapter.id, centroid)
            .await?;
        debug!(chapter_id = chapter.id, dims = stored.len(), "Chapter centroid frozen");
        Ok(stored)
    }

    async fn close(
        &self,
        chapter: Chapter,
        messages: &[Message],
        trigger: BoundaryTrigger,
    ) -> Result<BoundaryOutcome> {
        let end_message_id = messages.last().map_or(chapter.start_message_id, |m| m.id);
        let summary = self.summarizer.summarize(messages).await;

        let closure = ChapterClosure {
            end_message_id,
            summary,
        };
        let (closed, opened) = match self
            .store
            .close_and_open(
                chapter.id,
                chapter.version,
                closure,
                NewChapter::starting_at(end_message_id + 1),
            )
            .await
        {
            Ok(pair) => pair,
            Err(StoreError::VersionConflict { .. }) => {
                warn!(chapter_id = chapter.id, "Chapter closed concurrently, skipping");
                self.open_cache.invalidate();
                return Ok(BoundaryOutcome::Superseded(chapter.id));
            }
            Err(e) => return Err(Error::Store(e)),
        };
        self.open_cache.put(opened.clone());

        info!(
            closed = closed.id,
            opened = opened.id,
            trigger = %trigger,
            messages = messages.len(),
            title = %closed.title,
            "Chapter closed"
        );

        Ok(BoundaryOutcome::Closed {
            closed,
            opened,
            trigger,
        })
    }
}
