//! Message domain types.
//!
//! Messages are identified by integer ids assigned by the store, ordered
//! chronologically, and immutable once created except for the chapter they
//! are assigned to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned message identity. Monotonically increasing.
pub type MessageId = i64;

/// Store-assigned chapter identity.
pub type ChapterId = i64;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (persona, rules)
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single persisted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Owning chapter, once assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<ChapterId>,
}

impl Message {
    /// Create a message with an explicit timestamp.
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            created_at,
            chapter_id: None,
        }
    }

    /// Create a new user message stamped now.
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content, Utc::now())
    }

    /// Create a new assistant message stamped now.
    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, content, Utc::now())
    }

    /// Create a new system message stamped now.
    pub fn system(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::System, content, Utc::now())
    }

    /// Render as `role: content`, the form used in prompts and transcripts.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}

/// A message that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at,
        }
    }
}
