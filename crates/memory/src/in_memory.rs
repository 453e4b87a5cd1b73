//! In-memory store, useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::chapter::{Chapter, ChapterClosure, NewChapter};
use recall_core::error::StoreError;
use recall_core::memory::{MemoryRecord, NewMemory};
use recall_core::message::{ChapterId, Message, MessageId, NewMessage};
use recall_core::store::ConversationStore;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    messages: Vec<Message>,
    chapters: Vec<Chapter>,
    memories: Vec<MemoryRecord>,
    next_message_id: MessageId,
    next_chapter_id: ChapterId,
    next_memory_id: i64,
}

impl State {
    fn open_new_chapter(&mut self, chapter: NewChapter) -> Result<Chapter, StoreError> {
        if let Some(open) = self.chapters.iter().find(|c| c.is_open()) {
            return Err(StoreError::Storage(format!(
                "chapter {} is still open",
                open.id
            )));
        }
        let id = self.next_chapter_id;
        self.next_chapter_id += 1;
        let created = Chapter {
            id,
            title: chapter.title,
            summary: chapter.summary,
            start_message_id: chapter.start_message_id,
            end_message_id: None,
            centroid: None,
            keywords: Vec::new(),
            created_at: chapter.created_at,
            version: 0,
        };
        self.chapters.push(created.clone());
        Ok(created)
    }
}

/// A store that keeps everything in vectors behind one lock.
/// Ids start at 1 and increase monotonically.
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                next_message_id: 1,
                next_chapter_id: 1,
                next_memory_id: 1,
                ..State::default()
            })),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_message_id;
        state.next_message_id += 1;
        let stored = Message::new(id, message.role, message.content, message.created_at);
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        let state = self.state.read().await;
        Ok(state.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn messages_in_range(
        &self,
        start: MessageId,
        end: Option<MessageId>,
    ) -> Result<Vec<Message>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.id >= start && end.is_none_or(|e| m.id <= e))
            .cloned()
            .collect())
    }

    async fn recent_messages(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let state = self.state.read().await;
        Ok(state.messages.iter().rev().take(limit).cloned().collect())
    }

    async fn assign_chapter(
        &self,
        message_id: MessageId,
        chapter_id: ChapterId,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(StoreError::NotFound {
                kind: "message",
                id: message_id,
            })?;
        message.chapter_id = Some(chapter_id);
        Ok(())
    }

    async fn open_chapter(&self) -> Result<Option<Chapter>, StoreError> {
        let state = self.state.read().await;
        Ok(state.chapters.iter().find(|c| c.is_open()).cloned())
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
        let state = self.state.read().await;
        Ok(state.chapters.iter().find(|c| c.id == id).cloned())
    }

    async fn create_chapter(&self, chapter: NewChapter) -> Result<Chapter, StoreError> {
        let mut state = self.state.write().await;
        state.open_new_chapter(chapter)
    }

    async fn set_chapter_centroid(
        &self,
        id: ChapterId,
        centroid: Vec<f32>,
    ) -> Result<Vec<f32>, StoreError> {
        let mut state = self.state.write().await;
        let chapter = state
            .chapters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound { kind: "chapter", id })?;
        if let Some(existing) = &chapter.centroid {
            return Ok(existing.clone());
        }
        chapter.centroid = Some(centroid.clone());
        Ok(centroid)
    }

    async fn close_and_open(
        &self,
        id: ChapterId,
        expected_version: u64,
        closure: ChapterClosure,
        successor: NewChapter,
    ) -> Result<(Chapter, Chapter), StoreError> {
        let mut state = self.state.write().await;
        let chapter = state
            .chapters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound { kind: "chapter", id })?;
        if chapter.version != expected_version || !chapter.is_open() {
            return Err(StoreError::VersionConflict {
                chapter_id: id,
                expected: expected_version,
                actual: chapter.version,
            });
        }
        chapter.end_message_id = Some(closure.end_message_id);
        chapter.title = closure.summary.title;
        chapter.summary = closure.summary.summary;
        chapter.keywords = closure.summary.keywords;
        chapter.version += 1;
        let closed = chapter.clone();

        let opened = state.open_new_chapter(successor)?;
        Ok((closed, opened))
    }

    async fn list_chapters(&self) -> Result<Vec<Chapter>, StoreError> {
        Ok(self.state.read().await.chapters.clone())
    }

    async fn store_memory(&self, memory: NewMemory) -> Result<MemoryRecord, StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .memories
            .iter()
            .find(|m| m.source_key == memory.source_key)
        {
            return Ok(existing.clone());
        }
        let id = state.next_memory_id;
        state.next_memory_id += 1;
        let record = MemoryRecord {
            id,
            content: memory.content,
            importance: memory.importance,
            source_key: memory.source_key,
            tags: memory.tags,
            created_at: memory.created_at,
            score: 0.0,
            embedding: None,
        };
        state.memories.push(record.clone());
        Ok(record)
    }

    async fn find_memory_by_source(
        &self,
        source_key: &str,
    ) -> Result<Option<MemoryRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .memories
            .iter()
            .find(|m| m.source_key == source_key)
            .cloned())
    }

    async fn recent_memories(&self, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.memories.iter().rev().take(limit).cloned().collect())
    }

    async fn memories_before(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .memories
            .iter()
            .rev()
            .filter(|m| m.created_at < before)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn memory_count(&self) -> Result<usize, StoreError> {
        Ok(self.state.read().await.memories.len())
    }
}
