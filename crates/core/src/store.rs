//! ConversationStore trait: the persistence contract.
//!
//! The store owns durability and query execution. The context engine only
//! needs create/find/update over messages, chapters and memories, ordering
//! queries and range filters.
//!
//! Implementations: in-memory (for testing and ephemeral sessions), or any
//! database-backed store supplied by the host application.

use crate::chapter::{Chapter, ChapterClosure, NewChapter};
use crate::error::StoreError;
use crate::memory::{MemoryRecord, NewMemory};
use crate::message::{ChapterId, Message, MessageId, NewMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "sqlite").
    fn name(&self) -> &str;

    // ── Messages ──

    /// Persist a message, assigning the next id.
    async fn append_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    async fn get_message(&self, id: MessageId) -> Result<Option<Message>, StoreError>;

    /// Messages with `start <= id <= end` (open-ended when `end` is `None`),
    /// oldest first.
    async fn messages_in_range(
        &self,
        start: MessageId,
        end: Option<MessageId>,
    ) -> Result<Vec<Message>, StoreError>;

    /// The most recent `limit` messages, newest first.
    async fn recent_messages(&self, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Record chapter membership for a message.
    async fn assign_chapter(
        &self,
        message_id: MessageId,
        chapter_id: ChapterId,
    ) -> Result<(), StoreError>;

    // ── Chapters ──

    /// The chapter whose end boundary is unset, if any.
    async fn open_chapter(&self) -> Result<Option<Chapter>, StoreError>;

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError>;

    /// Open a new chapter. Fails if another chapter is still open.
    async fn create_chapter(&self, chapter: NewChapter) -> Result<Chapter, StoreError>;

    /// Set the topic centroid unless one is already stored. Does not change
    /// the chapter version.
    ///
    /// Returns the centroid that is in effect afterwards, which is the
    /// previously stored one when it already existed.
    async fn set_chapter_centroid(
        &self,
        id: ChapterId,
        centroid: Vec<f32>,
    ) -> Result<Vec<f32>, StoreError>;

    /// Close a chapter if its version still equals `expected_version` and
    /// open `successor` in the same write, so no reader ever observes the
    /// store without an open chapter.
    ///
    /// Returns the closed and the opened chapter, or
    /// `StoreError::VersionConflict` when another writer got there first.
    async fn close_and_open(
        &self,
        id: ChapterId,
        expected_version: u64,
        closure: ChapterClosure,
        successor: NewChapter,
    ) -> Result<(Chapter, Chapter), StoreError>;

    /// All chapters, oldest first.
    async fn list_chapters(&self) -> Result<Vec<Chapter>, StoreError>;

    // ── Memories ──

    /// Persist a memory. Idempotent by `source_key`: archiving the same
    /// source again returns the existing record untouched.
    async fn store_memory(&self, memory: NewMemory) -> Result<MemoryRecord, StoreError>;

    async fn find_memory_by_source(
        &self,
        source_key: &str,
    ) -> Result<Option<MemoryRecord>, StoreError>;

    /// The most recent `limit` memories, newest first.
    async fn recent_memories(&self, limit: usize) -> Result<Vec<MemoryRecord>, StoreError>;

    /// Memories created strictly before `before`, newest first.
    async fn memories_before(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StoreError>;

    /// Total memory count.
    async fn memory_count(&self) -> Result<usize, StoreError>;
}

