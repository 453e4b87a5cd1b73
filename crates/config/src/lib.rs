//! Configuration loading, validation, and management for Recall.
//!
//! Loads configuration from `~/.recall/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use recall_core::decay::ValueClass;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.recall/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inference and embedding service
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Context window size and output reservation
    #[serde(default)]
    pub context: ContextConfig,

    /// Smart truncation of message history
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Importance scoring of exchanges
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Chapter segmentation
    #[serde(default)]
    pub chapters: ChapterConfig,

    /// Embedding cache and timeouts
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Long-term memory recall
    #[serde(default)]
    pub recall: RecallConfig,

    /// Half-lives for decaying state
    #[serde(default)]
    pub decay: DecayConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            embedding_model: default_embedding_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Model input window in tokens.
    #[serde(default = "default_in_max")]
    pub in_max: usize,

    /// Fraction of the window held back for the model's reply.
    #[serde(default = "default_reserve_out")]
    pub reserve_out: f64,
}

fn default_in_max() -> usize {
    8192
}
fn default_reserve_out() -> f64 {
    0.25
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            in_max: default_in_max(),
            reserve_out: default_reserve_out(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Share of the message budget reserved for the most recent messages.
    #[serde(default = "default_recent_share")]
    pub recent_share: f64,

    /// Exchanges scoring at or above this are archived as memories.
    #[serde(default = "default_archive_threshold")]
    pub archive_threshold: f32,
}

fn default_max_messages() -> usize {
    40
}
fn default_recent_share() -> f64 {
    0.6
}
fn default_archive_threshold() -> f32 {
    0.5
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            recent_share: default_recent_share(),
            archive_threshold: default_archive_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Ask the inference service for ratings. When false, only the
    /// heuristic is used.
    #[serde(default = "default_true")]
    pub external: bool,

    #[serde(default = "default_scoring_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_scoring_timeout() -> u64 {
    10
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            external: true,
            timeout_secs: default_scoring_timeout(),
        }
    }
}

impl ScoringConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterConfig {
    /// Silence longer than this between two messages closes the chapter.
    #[serde(default = "default_gap_minutes")]
    pub gap_minutes: i64,

    /// Chapters close unconditionally at this many messages.
    #[serde(default = "default_hard_cap")]
    pub hard_cap: usize,

    /// Topic drift is only evaluated from this many messages on.
    #[serde(default = "default_drift_min_messages")]
    pub drift_min_messages: usize,

    /// Number of recent messages averaged into the centroid.
    #[serde(default = "default_centroid_window")]
    pub centroid_window: usize,

    /// Similarity to the centroid below this counts as drift.
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f32,

    /// Maximum messages sampled for the chapter summary.
    #[serde(default = "default_summary_sample")]
    pub summary_sample: usize,

    #[serde(default = "default_summary_timeout")]
    pub summary_timeout_secs: u64,

    /// Freshness window of the open-chapter read cache.
    #[serde(default = "default_open_cache_ttl")]
    pub open_cache_ttl_secs: u64,
}

fn default_gap_minutes() -> i64 {
    120
}
fn default_hard_cap() -> usize {
    150
}
fn default_drift_min_messages() -> usize {
    10
}
fn default_centroid_window() -> usize {
    10
}
fn default_drift_threshold() -> f32 {
    0.65
}
fn default_summary_sample() -> usize {
    20
}
fn default_summary_timeout() -> u64 {
    30
}
fn default_open_cache_ttl() -> u64 {
    30
}

impl Default for ChapterConfig {
    fn default() -> Self {
        Self {
            gap_minutes: default_gap_minutes(),
            hard_cap: default_hard_cap(),
            drift_min_messages: default_drift_min_messages(),
            centroid_window: default_centroid_window(),
            drift_threshold: default_drift_threshold(),
            summary_sample: default_summary_sample(),
            summary_timeout_secs: default_summary_timeout(),
            open_cache_ttl_secs: default_open_cache_ttl(),
        }
    }
}

impl ChapterConfig {
    pub fn summary_timeout(&self) -> Duration {
        Duration::from_secs(self.summary_timeout_secs)
    }

    pub fn open_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.open_cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_cache_capacity() -> usize {
    500
}
fn default_embedding_timeout() -> u64 {
    15
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    /// How many recent memories are considered as candidates.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    /// How many memories are returned.
    #[serde(default = "default_recall_limit")]
    pub limit: usize,

    /// MMR trade-off: 1.0 is pure relevance, 0.0 pure novelty.
    #[serde(default = "default_lambda")]
    pub lambda: f32,

    /// Candidates less similar to the query than this are never recalled.
    #[serde(default = "default_recall_min_score")]
    pub min_score: f32,
}

fn default_candidate_pool() -> usize {
    50
}
fn default_recall_limit() -> usize {
    5
}
fn default_lambda() -> f32 {
    0.7
}
fn default_recall_min_score() -> f32 {
    0.0
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            candidate_pool: default_candidate_pool(),
            limit: default_recall_limit(),
            lambda: default_lambda(),
            min_score: default_recall_min_score(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    #[serde(default = "default_belief_half_life")]
    pub belief_half_life_hours: f64,

    #[serde(default = "default_mood_half_life")]
    pub mood_half_life_hours: f64,
}

fn default_belief_half_life() -> f64 {
    168.0
}
fn default_mood_half_life() -> f64 {
    6.0
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            belief_half_life_hours: default_belief_half_life(),
            mood_half_life_hours: default_mood_half_life(),
        }
    }
}

impl DecayConfig {
    /// Configured half-life for a class of value, in seconds.
    pub fn half_life_secs(&self, class: ValueClass) -> f64 {
        let hours = match class {
            ValueClass::BeliefConfidence => self.belief_half_life_hours,
            ValueClass::MoodIntensity => self.mood_half_life_hours,
        };
        hours * 3600.0
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.recall/config.toml).
    ///
    /// Environment variables override the file:
    /// - `RECALL_API_KEY`, then `OPENAI_API_KEY`, when the file sets no key
    /// - `RECALL_API_URL`
    /// - `RECALL_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load a specific file, then apply the same environment overrides as
    /// [`AppConfig::load`].
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("RECALL_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("RECALL_API_URL") {
            config.provider.api_url = url;
        }

        if let Ok(model) = std::env::var("RECALL_MODEL") {
            config.provider.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".recall")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context.in_max == 0 {
            return Err(ConfigError::ValidationError(
                "context.in_max must be > 0".into(),
            ));
        }

        if !(0.0..1.0).contains(&self.context.reserve_out) {
            return Err(ConfigError::ValidationError(
                "context.reserve_out must be in [0.0, 1.0)".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retention.recent_share) {
            return Err(ConfigError::ValidationError(
                "retention.recent_share must be between 0.0 and 1.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retention.archive_threshold) {
            return Err(ConfigError::ValidationError(
                "retention.archive_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.recall.lambda) {
            return Err(ConfigError::ValidationError(
                "recall.lambda must be between 0.0 and 1.0".into(),
            ));
        }

        if !(-1.0..=1.0).contains(&self.recall.min_score) {
            return Err(ConfigError::ValidationError(
                "recall.min_score must be between -1.0 and 1.0".into(),
            ));
        }

        if !(-1.0..=1.0).contains(&self.chapters.drift_threshold) {
            return Err(ConfigError::ValidationError(
                "chapters.drift_threshold must be between -1.0 and 1.0".into(),
            ));
        }

        if self.chapters.hard_cap == 0 || self.chapters.centroid_window == 0 {
            return Err(ConfigError::ValidationError(
                "chapters.hard_cap and chapters.centroid_window must be > 0".into(),
            ));
        }

        if self.embedding.cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.cache_capacity must be > 0".into(),
            ));
        }

        if self.decay.belief_half_life_hours <= 0.0 || self.decay.mood_half_life_hours <= 0.0 {
            return Err(ConfigError::ValidationError(
                "decay half-lives must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init-config`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for recall_core::Error {
    fn from(err: ConfigError) -> Self {
        recall_core::Error::Config {
            message: err.to_string(),
        }
    }
}
