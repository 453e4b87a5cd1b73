//! Importance scoring for user/assistant exchanges.
//!
//! The external path asks the inference provider for a structured rating.
//! Any failure (no provider, timeout, transport error, unparsable answer)
//! falls back to a keyword/length heuristic and the fallback reason travels
//! with the score, so degraded mode is visible to callers and in logs.

use futures::future::join_all;
use recall_config::ScoringConfig;
use recall_core::error::ProviderError;
use recall_core::message::MessageId;
use recall_core::provider::{CompletionRequest, InferenceProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default preserve threshold when the rater does not say.
pub const PRESERVE_THRESHOLD: f32 = 0.6;

const HEURISTIC_BASE: f32 = 0.3;

const EMOTIONAL_KEYWORDS: &[&str] = &[
    "love", "hate", "afraid", "scared", "worried", "anxious", "happy", "sad", "angry", "upset",
    "lonely", "excited", "grateful", "hurt", "cry", "miss ",
];

const SALIENCE_KEYWORDS: &[&str] = &[
    "remember",
    "important",
    "never forget",
    "my name",
    "birthday",
    "anniversary",
    "promise",
    "deadline",
    "allergic",
    "diagnosed",
    "married",
    "pregnant",
    "passed away",
    "new job",
    "moving to",
];

const RATING_SYSTEM_PROMPT: &str = "You rate how important a conversation exchange is \
to remember long term. Answer with a single JSON object: \
{\"importance\": <number 0..1>, \"rationale\": <short string>, \"should_preserve\": <bool>}.";

/// One user message and the assistant reply that followed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user_message_id: MessageId,
    pub assistant_message_id: MessageId,
    pub user: String,
    pub assistant: String,
}

impl Exchange {
    pub fn new(
        user_message_id: MessageId,
        assistant_message_id: MessageId,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) -> Self {
        Self {
            user_message_id,
            assistant_message_id,
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Why the heuristic was used instead of the external rater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoProvider,
    Timeout,
    RequestFailed,
    MalformedResponse,
    /// The message has no partner to form an exchange with.
    Unpaired,
    /// The batch mixed external and heuristic scores and was normalized.
    MixedBatch,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoProvider => "no provider",
            Self::Timeout => "timeout",
            Self::RequestFailed => "request failed",
            Self::MalformedResponse => "malformed response",
            Self::Unpaired => "unpaired",
            Self::MixedBatch => "mixed batch",
        };
        f.write_str(s)
    }
}

/// Where a score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreSource {
    External,
    Heuristic { reason: FallbackReason },
}

impl ScoreSource {
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceScore {
    /// In [0, 1].
    pub importance: f32,
    pub rationale: String,
    pub should_preserve: bool,
    pub source: ScoreSource,
}

/// Rates exchanges, externally when possible.
pub struct ImportanceScorer {
    provider: Option<Arc<dyn InferenceProvider>>,
    timeout: Duration,
}

impl ImportanceScorer {
    pub fn new(provider: Option<Arc<dyn InferenceProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// A scorer that never calls out.
    pub fn heuristic_only() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Build from the `[scoring]` section. `external = false` disables the
    /// provider even when one is supplied.
    pub fn from_config(
        provider: Option<Arc<dyn InferenceProvider>>,
        config: &ScoringConfig,
    ) -> Self {
        let provider = if config.external { provider } else { None };
        Self::new(provider, config.timeout())
    }

    /// Score one exchange. Never fails.
    pub async fn score(&self, exchange: &Exchange) -> ImportanceScore {
        let Some(provider) = &self.provider else {
            return heuristic(exchange, FallbackReason::NoProvider);
        };

        let request = CompletionRequest::new(rating_prompt(exchange))
            .with_system(RATING_SYSTEM_PROMPT)
            .with_max_tokens(200);

        let reason = match tokio::time::timeout(self.timeout, provider.complete_json(request)).await
        {
            Ok(Ok(value)) => match parse_rating(&value) {
                Some((importance, rationale, preserve)) => {
                    let importance = apply_boosts(importance, exchange);
                    debug!(
                        user_message_id = exchange.user_message_id,
                        importance, "Exchange rated externally"
                    );
                    return ImportanceScore {
                        importance,
                        rationale,
                        should_preserve: preserve.unwrap_or(importance >= PRESERVE_THRESHOLD),
                        source: ScoreSource::External,
                    };
                }
                None => FallbackReason::MalformedResponse,
            },
            Ok(Err(ProviderError::MalformedResponse(_))) => FallbackReason::MalformedResponse,
            Ok(Err(e)) => {
                warn!(provider = %provider.name(), error = %e, "Importance rating request failed");
                FallbackReason::RequestFailed
            }
            Err(_) => FallbackReason::Timeout,
        };

        warn!(
            user_message_id = exchange.user_message_id,
            reason = %reason,
            "Falling back to heuristic importance"
        );
        heuristic(exchange, reason)
    }

    /// Score several exchanges concurrently, in input order.
    ///
    /// A batch never mixes sources: if some exchanges were rated externally
    /// and others fell back, the whole batch is re-scored heuristically so
    /// the scores are comparable.
    pub async fn score_batch(&self, exchanges: &[Exchange]) -> Vec<ImportanceScore> {
        let scores = join_all(exchanges.iter().map(|e| self.score(e))).await;

        let external = scores.iter().filter(|s| s.source.is_external()).count();
        if external > 0 && external < scores.len() {
            warn!(
                external,
                fallback = scores.len() - external,
                "Mixed scoring sources in batch, re-scoring heuristically"
            );
            return exchanges
                .iter()
                .map(|e| heuristic(e, FallbackReason::MixedBatch))
                .collect();
        }
        scores
    }
}

/// Keyword and length heuristic, clamped to [0, 1].
pub fn heuristic_score(user: &str, assistant: &str) -> f32 {
    heuristic_parts(user, assistant).0
}

fn heuristic_parts(user: &str, assistant: &str) -> (f32, Vec<&'static str>) {
    let mut score = HEURISTIC_BASE;
    let mut signals = Vec::new();

    if user.chars().count() > 150 {
        score += 0.15;
        signals.push("long user message");
    }
    if assistant.chars().count() > 200 {
        score += 0.15;
        signals.push("long reply");
    }
    if user.contains('?') {
        score += 0.1;
        signals.push("question");
    }

    let combined = format!("{user}\n{assistant}").to_lowercase();
    if EMOTIONAL_KEYWORDS.iter().any(|k| combined.contains(k)) {
        score += 0.2;
        signals.push("emotional content");
    }
    if SALIENCE_KEYWORDS.iter().any(|k| combined.contains(k)) {
        score += 0.15;
        signals.push("salient detail");
    }

    (score.clamp(0.0, 1.0), signals)
}

fn heuristic(exchange: &Exchange, reason: FallbackReason) -> ImportanceScore {
    heuristic_for(&exchange.user, &exchange.assistant, reason)
}

/// Heuristic score for arbitrary user/assistant text.
pub(crate) fn heuristic_for(user: &str, assistant: &str, reason: FallbackReason) -> ImportanceScore {
    let (importance, signals) = heuristic_parts(user, assistant);
    let rationale = if signals.is_empty() {
        "heuristic: no signals".to_string()
    } else {
        format!("heuristic: {}", signals.join(", "))
    };
    ImportanceScore {
        importance,
        rationale,
        should_preserve: importance >= PRESERVE_THRESHOLD,
        source: ScoreSource::Heuristic { reason },
    }
}

fn rating_prompt(exchange: &Exchange) -> String {
    format!(
        "User: {}\n\nAssistant: {}\n\nRate this exchange.",
        exchange.user, exchange.assistant
    )
}

/// Pull `(importance, rationale, should_preserve)` out of the rater's JSON.
fn parse_rating(value: &serde_json::Value) -> Option<(f32, String, Option<bool>)> {
    let importance = value.get("importance")?.as_f64()?;
    if !importance.is_finite() {
        return None;
    }
    let rationale = value
        .get("rationale")
        .and_then(|r| r.as_str())
        .unwrap_or_default()
        .to_string();
    let preserve = value.get("should_preserve").and_then(|p| p.as_bool());
    Some(((importance as f32).clamp(0.0, 1.0), rationale, preserve))
}

fn apply_boosts(mut importance: f32, exchange: &Exchange) -> f32 {
    if exchange.user.chars().count() > 300 {
        importance = (importance + 0.1).min(1.0);
    }
    if exchange.assistant.chars().count() > 500 {
        importance = (importance + 0.1).min(1.0);
    }
    if exchange.user.contains('?') {
        importance = (importance + 0.05).min(1.0);
    }
    importance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedInferenceProvider, StallingInferenceProvider};

    fn plain() -> Exchange {
        Exchange::new(1, 2, "ok", "sure")
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn heuristic_base_score() {
        assert!(approx(heuristic_score("ok", "sure"), 0.3));
    }

    #[test]
    fn heuristic_adds_signals() {
        let user = format!("{} why?", "x".repeat(160));
        let assistant = "y".repeat(210);
        // 0.3 + 0.15 + 0.15 + 0.1
        assert!(approx(heuristic_score(&user, &assistant), 0.7));
    }

    #[test]
    fn heuristic_keywords_are_case_insensitive() {
        assert!(approx(heuristic_score("I LOVE this", "ok"), 0.5));
        assert!(approx(heuristic_score("ok", "I will Remember that"), 0.45));
    }

    #[test]
    fn heuristic_is_clamped() {
        let user = format!("{} I love it, remember my birthday?", "x".repeat(200));
        let assistant = "y".repeat(300);
        let score = heuristic_score(&user, &assistant);
        assert!(approx(score, 1.0));
    }

    #[tokio::test]
    async fn no_provider_falls_back() {
        let score = ImportanceScorer::heuristic_only().score(&plain()).await;
        assert_eq!(
            score.source,
            ScoreSource::Heuristic {
                reason: FallbackReason::NoProvider
            }
        );
        assert!(!score.should_preserve);
    }

    #[tokio::test]
    async fn external_rating_is_used() {
        let provider = Arc::new(ScriptedInferenceProvider::single(
            r#"Sure. {"importance": 0.4, "rationale": "small talk"}"#,
        ));
        let scorer = ImportanceScorer::new(Some(provider), Duration::from_secs(5));
        let score = scorer.score(&plain()).await;

        assert_eq!(score.source, ScoreSource::External);
        assert!(approx(score.importance, 0.4));
        assert_eq!(score.rationale, "small talk");
        assert!(!score.should_preserve);
    }

    #[tokio::test]
    async fn external_rating_gets_boosts() {
        let provider = Arc::new(ScriptedInferenceProvider::single(r#"{"importance": 0.5}"#));
        let scorer = ImportanceScorer::new(Some(provider), Duration::from_secs(5));
        let exchange = Exchange::new(1, 2, format!("{}?", "a".repeat(310)), "b".repeat(510));
        let score = scorer.score(&exchange).await;

        // 0.5 + 0.1 + 0.1 + 0.05
        assert!(approx(score.importance, 0.75));
        assert!(score.should_preserve);
    }

    #[tokio::test]
    async fn boosts_saturate_at_one() {
        let provider = Arc::new(ScriptedInferenceProvider::single(r#"{"importance": 0.97}"#));
        let scorer = ImportanceScorer::new(Some(provider), Duration::from_secs(5));
        let exchange = Exchange::new(1, 2, format!("{}?", "a".repeat(310)), "b");
        assert!(approx(scorer.score(&exchange).await.importance, 1.0));
    }

    #[tokio::test]
    async fn explicit_preserve_flag_wins() {
        let provider = Arc::new(ScriptedInferenceProvider::single(
            r#"{"importance": 0.2, "should_preserve": true}"#,
        ));
        let scorer = ImportanceScorer::new(Some(provider), Duration::from_secs(5));
        assert!(scorer.score(&plain()).await.should_preserve);
    }

    #[tokio::test]
    async fn malformed_response_falls_back() {
        let provider = Arc::new(ScriptedInferenceProvider::single("I'd say pretty important"));
        let scorer = ImportanceScorer::new(Some(provider), Duration::from_secs(5));
        let score = scorer.score(&plain()).await;
        assert_eq!(
            score.source,
            ScoreSource::Heuristic {
                reason: FallbackReason::MalformedResponse
            }
        );
    }

    #[tokio::test]
    async fn json_without_importance_is_malformed() {
        let provider = Arc::new(ScriptedInferenceProvider::single(r#"{"rationale": "hm"}"#));
        let scorer = ImportanceScorer::new(Some(provider), Duration::from_secs(5));
        let score = scorer.score(&plain()).await;
        assert_eq!(
            score.source,
            ScoreSource::Heuristic {
                reason: FallbackReason::MalformedResponse
            }
        );
    }

    #[tokio::test]
    async fn request_failure_falls_back() {
        let provider = Arc::new(ScriptedInferenceProvider::failing(ProviderError::Network(
            "connection refused".into(),
        )));
        let scorer = ImportanceScorer::new(Some(provider), Duration::from_secs(5));
        let score = scorer.score(&plain()).await;
        assert_eq!(
            score.source,
            ScoreSource::Heuristic {
                reason: FallbackReason::RequestFailed
            }
        );
        assert!(approx(score.importance, 0.3));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back() {
        let scorer =
            ImportanceScorer::new(Some(Arc::new(StallingInferenceProvider)), Duration::from_secs(10));
        let score = scorer.score(&plain()).await;
        assert_eq!(
            score.source,
            ScoreSource::Heuristic {
                reason: FallbackReason::Timeout
            }
        );
    }

    #[tokio::test]
    async fn config_can_disable_external() {
        let provider = Arc::new(ScriptedInferenceProvider::single(r#"{"importance": 0.9}"#));
        let config = ScoringConfig {
            external: false,
            ..ScoringConfig::default()
        };
        let scorer = ImportanceScorer::from_config(Some(provider.clone()), &config);
        let score = scorer.score(&plain()).await;
        assert!(!score.source.is_external());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn batch_keeps_order() {
        let provider = Arc::new(ScriptedInferenceProvider::new(vec![
            Ok(r#"{"importance": 0.1}"#.into()),
            Ok(r#"{"importance": 0.9}"#.into()),
        ]));
        let scorer = ImportanceScorer::new(Some(provider), Duration::from_secs(5));
        let scores = scorer
            .score_batch(&[plain(), Exchange::new(3, 4, "hi", "hello")])
            .await;

        assert!(approx(scores[0].importance, 0.1));
        assert!(approx(scores[1].importance, 0.9));
        assert!(scores.iter().all(|s| s.source.is_external()));
    }

    #[tokio::test]
    async fn mixed_batch_is_rescored_heuristically() {
        let provider = Arc::new(ScriptedInferenceProvider::new(vec![
            Ok(r#"{"importance": 0.9}"#.into()),
            Ok("not json".into()),
        ]));
        let scorer = ImportanceScorer::new(Some(provider), Duration::from_secs(5));
        let scores = scorer
            .score_batch(&[plain(), Exchange::new(3, 4, "I love it", "great")])
            .await;

        let mixed = ScoreSource::Heuristic {
            reason: FallbackReason::MixedBatch,
        };
        assert!(scores.iter().all(|s| s.source == mixed));
        assert!(approx(scores[0].importance, 0.3));
        assert!(approx(scores[1].importance, 0.5));
    }

    #[tokio::test]
    async fn empty_batch() {
        assert!(ImportanceScorer::heuristic_only().score_batch(&[]).await.is_empty());
    }
}
