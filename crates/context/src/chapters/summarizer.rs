//! Chapter summaries for closing chapters.
//!
//! Long chapters are sampled evenly so the prompt stays small. Any failure
//! produces a placeholder summary; closing a chapter never waits on a
//! working inference service.

use recall_config::ChapterConfig;
use recall_core::chapter::ChapterSummary;
use recall_core::message::Message;
use recall_core::provider::{CompletionRequest, InferenceProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const PLACEHOLDER_TITLE: &str = "Untitled chapter";
pub const PLACEHOLDER_SUMMARY: &str = "No summary available.";

const MAX_KEYWORDS: usize = 8;

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize a finished stretch of conversation. \
Answer with a single JSON object: \
{\"title\": <short title>, \"summary\": <two or three sentences>, \"keywords\": [<strings>]}.";

pub struct ChapterSummarizer {
    provider: Option<Arc<dyn InferenceProvider>>,
    sample_size: usize,
    timeout: Duration,
}

impl ChapterSummarizer {
    pub fn new(
        provider: Option<Arc<dyn InferenceProvider>>,
        sample_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            sample_size: sample_size.max(1),
            timeout,
        }
    }

    pub fn from_config(
        provider: Option<Arc<dyn InferenceProvider>>,
        config: &ChapterConfig,
    ) -> Self {
        Self::new(provider, config.summary_sample, config.summary_timeout())
    }

    /// Summarize a chapter's messages. Never fails.
    pub async fn summarize(&self, messages: &[Message]) -> ChapterSummary {
        let Some(provider) = &self.provider else {
            return placeholder();
        };
        if messages.is_empty() {
            return placeholder();
        }

        let transcript = sample_evenly(messages, self.sample_size)
            .iter()
            .map(|m| m.transcript_line())
            .collect::<Vec<_>>()
            .join("\n");
        let request = CompletionRequest::new(format!(
            "Conversation excerpt ({} of {} messages):\n{transcript}",
            messages.len().min(self.sample_size),
            messages.len()
        ))
        .with_system(SUMMARY_SYSTEM_PROMPT)
        .with_max_tokens(300);

        match tokio::time::timeout(self.timeout, provider.complete_json(request)).await {
            Ok(Ok(value)) => match parse_summary(&value) {
                Some(summary) => {
                    debug!(title = %summary.title, "Chapter summarized");
                    summary
                }
                None => {
                    warn!("Chapter summary missing fields, using placeholder");
                    placeholder()
                }
            },
            Ok(Err(e)) => {
                warn!(provider = %provider.name(), error = %e, "Chapter summary failed, using placeholder");
                placeholder()
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Chapter summary timed out, using placeholder"
                );
                placeholder()
            }
        }
    }
}

/// Up to `n` messages picked at an even stride, first message included.
pub fn sample_evenly(messages: &[Message], n: usize) -> Vec<&Message> {
    if messages.len() <= n {
        return messages.iter().collect();
    }
    (0..n).map(|i| &messages[i * messages.len() / n]).collect()
}

pub fn placeholder() -> ChapterSummary {
    ChapterSummary {
        title: PLACEHOLDER_TITLE.into(),
        summary: PLACEHOLDER_SUMMARY.into(),
        keywords: Vec::new(),
    }
}

fn parse_summary(value: &serde_json::Value) -> Option<ChapterSummary> {
    let title = value.get("title")?.as_str()?.trim();
    let summary = value.get("summary")?.as_str()?.trim();
    if title.is_empty() || summary.is_empty() {
        return None;
    }
    let keywords = value
        .get("keywords")
        .and_then(|k| k.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|k| k.as_str())
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .take(MAX_KEYWORDS)
                .collect()
        })
        .unwrap_or_default();

    Some(ChapterSummary {
        title: title.to_string(),
        summary: summary.to_string(),
        keywords,
    })
}
