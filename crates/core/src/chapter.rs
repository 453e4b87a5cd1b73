//! Chapters: topically coherent spans of a conversation.

use crate::message::{ChapterId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chapter of the conversation.
///
/// A chapter is open while `end_message_id` is `None`. The store guarantees
/// at most one open chapter; `version` increments when the chapter closes and is
/// the compare-and-swap token for closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub title: String,
    pub summary: String,
    /// First message id that belongs to this chapter.
    pub start_message_id: MessageId,
    /// Last message id, set on closure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_message_id: Option<MessageId>,
    /// Topic centroid. Written once, then frozen for the chapter's lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Vec<f32>>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Chapter {
    pub fn is_open(&self) -> bool {
        self.end_message_id.is_none()
    }

    /// Whether a message id falls inside this chapter's boundaries.
    pub fn contains(&self, message_id: MessageId) -> bool {
        message_id >= self.start_message_id
            && self.end_message_id.is_none_or(|end| message_id <= end)
    }
}

/// Fields supplied when opening a chapter.
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub start_message_id: MessageId,
    pub title: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl NewChapter {
    /// A fresh chapter with empty title/summary, pending future activity.
    pub fn starting_at(start_message_id: MessageId) -> Self {
        Self {
            start_message_id,
            title: String::new(),
            summary: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// Generated description of a closing chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Everything written onto a chapter when it closes.
#[derive(Debug, Clone)]
pub struct ChapterClosure {
    pub end_message_id: MessageId,
    pub summary: ChapterSummary,
}
