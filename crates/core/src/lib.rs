//! # Recall Core
//!
//! Domain types, traits, and error definitions for the Recall context engine.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (inference, embeddings, persistence) is defined
//! as a trait here. Implementations live in their respective crates. This
//! enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod chapter;
pub mod decay;
pub mod error;
pub mod json;
pub mod memory;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use chapter::{Chapter, ChapterClosure, ChapterSummary, NewChapter};
pub use decay::{DecayableValue, ValueClass, decay};
pub use error::{Error, ProviderError, Result, SimilarityError, StoreError};
pub use json::extract_json_object;
pub use memory::{MemoryId, MemoryRecord, NewMemory};
pub use message::{ChapterId, Message, MessageId, NewMessage, Role};
pub use provider::{CompletionRequest, EmbeddingProvider, InferenceProvider};
pub use store::ConversationStore;
