//! Memory-side building blocks for Recall: vector math, the bounded
//! embedding cache, cache-fronted embedding lookups and an in-memory store.

pub mod cache;
pub mod embedder;
pub mod in_memory;
pub mod vector;

pub use cache::{CacheStats, EmbeddingCache};
pub use embedder::CachedEmbedder;
pub use in_memory::InMemoryStore;
pub use vector::{
    cosine_similarity, diversity_select, euclidean_distance, mean_vector, vector_search,
};
