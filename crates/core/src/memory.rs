//! Long-term memory records.
//!
//! Memories are produced when the retention planner archives important
//! exchanges before they fall out of the active context, and are recalled
//! later as context snippets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned memory identity.
pub type MemoryId = i64;

/// A single persisted memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique ID for this memory
    pub id: MemoryId,

    /// The content of the memory
    pub content: String,

    /// Importance in [0, 1] at the time of archival
    pub importance: f32,

    /// Identity of what produced this memory (e.g. `exchange:12:13`).
    /// Unique per store; archiving the same source twice is a no-op.
    pub source_key: String,

    /// Tags for categorization
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// When this memory was created
    pub created_at: DateTime<Utc>,

    /// Relevance score (set by search operations)
    #[serde(default)]
    pub score: f32,

    /// Optional embedding vector
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

/// A memory that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    pub content: String,
    pub importance: f32,
    pub source_key: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl NewMemory {
    /// Idempotency key for an archived user/assistant exchange.
    pub fn exchange_key(user_message_id: i64, assistant_message_id: i64) -> String {
        format!("exchange:{user_message_id}:{assistant_message_id}")
    }
}
