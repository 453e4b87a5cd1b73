//! # Recall Context
//!
//! Decides what goes into a bounded context window: token estimation and
//! budgeting, importance scoring, retention planning with archival, chapter
//! segmentation, memory recall and final prompt assembly.

pub mod assembler;
pub mod budget;
pub mod chapters;
pub mod recall;
pub mod retention;
pub mod scoring;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assembler::{AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler};
pub use budget::{
    BudgetConfig, ContextComponent, DropInfo, DropReason, PackResult, PackedComponent,
    TokenBudgeter, pack,
};
pub use chapters::{BoundaryOutcome, BoundaryTrigger, ChapterSegmenter, ChapterSummarizer};
pub use recall::MemoryRecall;
pub use retention::{RetentionPlanner, ScoredMessage, TruncationResult};
pub use scoring::{
    Exchange, FallbackReason, ImportanceScore, ImportanceScorer, ScoreSource, heuristic_score,
};
pub use token::{estimate_conversation, estimate_message_tokens, estimate_tokens, truncate_to_tokens};
