//! Topical chapters: boundary detection, closing summaries and the
//! open-chapter read cache.

pub mod open_cache;
pub mod segmenter;
pub mod summarizer;

pub use open_cache::OpenChapterCache;
pub use segmenter::{BoundaryOutcome, BoundaryTrigger, ChapterSegmenter};
pub use summarizer::{ChapterSummarizer, sample_evenly};
