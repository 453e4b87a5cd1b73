//! `recall plan`: decide which messages of a conversation stay in context.
//!
//! Messages are loaded from a JSON file and archived into an in-process
//! store, so the report shows what would be archived without touching any
//! real database.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use recall_config::AppConfig;
use recall_context::{ImportanceScorer, RetentionPlanner, TruncationResult};
use recall_core::message::{Message, Role};
use recall_core::provider::InferenceProvider;
use recall_memory::InMemoryStore;
use recall_providers::OpenAiCompatProvider;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// One message as written in the input file.
#[derive(Debug, Deserialize)]
pub(crate) struct InputMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

pub async fn run(
    config: &AppConfig,
    file: &Path,
    max_messages: Option<usize>,
    budget: Option<usize>,
    offline: bool,
    json: bool,
) -> Result<()> {
    let messages = load_messages(file, Utc::now())?;
    let scorer = Arc::new(ImportanceScorer::from_config(
        scoring_provider(config, offline),
        &config.scoring,
    ));
    let store = Arc::new(InMemoryStore::new());
    let planner = RetentionPlanner::from_config(scorer, store, &config.retention);

    let max_messages = max_messages.unwrap_or(config.retention.max_messages);
    let result = planner.plan(&messages, max_messages, budget).await;
    info!(
        kept = result.kept.len(),
        removed = result.removed_count,
        archived = result.archived_count,
        "Retention planned"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result);
    }
    Ok(())
}

/// Load messages, assigning ids `1..=n` in file order. Messages without a
/// timestamp get `now`.
pub(crate) fn load_messages(file: &Path, now: DateTime<Utc>) -> Result<Vec<Message>> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let input: Vec<InputMessage> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of messages", file.display()))?;

    Ok(input
        .into_iter()
        .zip(1..)
        .map(|(m, id)| Message::new(id, m.role, m.content, m.created_at.unwrap_or(now)))
        .collect())
}

pub(crate) fn scoring_provider(
    config: &AppConfig,
    offline: bool,
) -> Option<Arc<dyn InferenceProvider>> {
    if offline || !config.scoring.external || !config.has_api_key() {
        return None;
    }
    match OpenAiCompatProvider::from_config(&config.provider) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            warn!(error = %e, "Inference provider unavailable, scoring heuristically");
            None
        }
    }
}

fn print_report(result: &TruncationResult) {
    println!("🧠 Retention plan ({})", result.strategy);
    println!(
        "   Kept:      {} (removed {}, preserved {})",
        result.kept.len(),
        result.removed_count,
        result.preserved_count
    );
    println!(
        "   Archived:  {} ({} failed)",
        result.archived_count, result.archive_failures
    );
    println!("   Saved:     ~{} tokens", result.tokens_saved);
    if let Some(fits) = result.within_budget {
        println!("   Budget:    {}", if fits { "✅ fits" } else { "❌ over" });
    }

    if !result.scored.is_empty() {
        println!();
        for scored in &result.scored {
            let kept = result.kept.iter().any(|m| m.id == scored.message.id);
            println!(
                "   {} #{:<4} {:<9} {:.2}  {}",
                if kept { "✅" } else { "  " },
                scored.message.id,
                scored.message.role,
                scored.importance,
                scored.rationale
            );
        }
    }
}
