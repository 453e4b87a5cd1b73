//! Inference and embedding provider implementations for Recall.
//!
//! All providers implement the `recall_core::InferenceProvider` and/or
//! `recall_core::EmbeddingProvider` traits.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
