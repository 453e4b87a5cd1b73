//! Priority-based token budgeting.
//!
//! Components are packed greedily in descending priority until the input
//! budget is spent. A component that does not fit whole is truncated to the
//! remaining allocation; one that cannot meet its minimum is skipped so a
//! lower-priority component still gets a chance.
//!
//! # Budget
//!
//! `available = floor(in_max × (1 − reserve_out))`. The sum of estimated
//! tokens of everything returned never exceeds `available`.

use crate::token::{TRUNCATION_MARKER, estimate_tokens, truncate_to_tokens};
use recall_config::ContextConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A named piece of prompt content competing for budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextComponent {
    pub name: String,
    /// Higher packs first. Equal priorities keep input order.
    pub priority: i32,
    pub content: String,
    /// Skip the component entirely when less than this remains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_tokens: Option<usize>,
    /// Never spend more than this on the component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl ContextComponent {
    pub fn new(name: impl Into<String>, priority: i32, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority,
            content: content.into(),
            min_tokens: None,
            max_tokens: None,
        }
    }

    pub fn with_min_tokens(mut self, min_tokens: usize) -> Self {
        self.min_tokens = Some(min_tokens);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Input window size and the share of it held back for the reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetConfig {
    pub in_max: usize,
    /// Clamped to [0, 1] when the budget is computed.
    pub reserve_out: f64,
}

impl BudgetConfig {
    pub fn new(in_max: usize, reserve_out: f64) -> Self {
        Self {
            in_max,
            reserve_out,
        }
    }

    /// Tokens available for input after the output reserve.
    pub fn available(&self) -> usize {
        let reserve = if self.reserve_out.is_nan() {
            0.0
        } else {
            self.reserve_out.clamp(0.0, 1.0)
        };
        (self.in_max as f64 * (1.0 - reserve)).floor() as usize
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

impl From<&ContextConfig> for BudgetConfig {
    fn from(config: &ContextConfig) -> Self {
        Self::new(config.in_max, config.reserve_out)
    }
}

/// A component that made it into the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedComponent {
    pub name: String,
    pub content: String,
    /// Estimated tokens of `content` as packed.
    pub tokens: usize,
    pub truncated: bool,
}

/// Why a component was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No content to pack.
    Empty,
    /// The budget was already spent.
    BudgetExhausted,
    /// Less than `min_tokens` remained.
    BelowMinimum,
    /// Truncation left no whole word.
    NothingLeft,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Empty => "empty content",
            Self::BudgetExhausted => "budget exhausted",
            Self::BelowMinimum => "minimum does not fit",
            Self::NothingLeft => "nothing left after truncation",
        };
        f.write_str(s)
    }
}

/// Information about a component dropped during budget enforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropInfo {
    pub name: String,
    /// Estimated tokens of the full content.
    pub tokens_dropped: usize,
    pub reason: DropReason,
}

/// Outcome of a packing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackResult {
    /// Packed contents in priority order.
    pub contents: Vec<String>,
    pub included: Vec<PackedComponent>,
    pub dropped: Vec<DropInfo>,
    pub used_tokens: usize,
    pub available: usize,
    /// Budget utilization percentage (0.0–100.0).
    pub utilization_pct: f32,
}

/// Greedy priority packer. Stateless, create one and reuse it.
#[derive(Debug, Clone, Default)]
pub struct TokenBudgeter {
    config: BudgetConfig,
}

impl TokenBudgeter {
    pub fn new(config: BudgetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Tokens available for input.
    pub fn available(&self) -> usize {
        self.config.available()
    }

    /// Pack components into the budget.
    ///
    /// # Algorithm
    ///
    /// 1. Stable-sort by priority, highest first
    /// 2. For each: skip when empty or when its minimum exceeds what remains
    /// 3. Allocate `min(estimate, max_tokens, remaining)`
    /// 4. Truncate when the allocation is short, then re-estimate and shrink
    ///    until the real cost fits
    pub fn pack(&self, components: &[ContextComponent]) -> PackResult {
        let available = self.available();

        let mut ordered: Vec<&ContextComponent> = components.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut used = 0usize;
        let mut included = Vec::new();
        let mut dropped = Vec::new();

        for component in ordered {
            let estimate = estimate_tokens(&component.content);
            let dropped_as = |reason| DropInfo {
                name: component.name.clone(),
                tokens_dropped: estimate,
                reason,
            };

            if used >= available {
                dropped.push(dropped_as(DropReason::BudgetExhausted));
                continue;
            }
            if estimate == 0 {
                dropped.push(dropped_as(DropReason::Empty));
                continue;
            }

            let remaining = available - used;
            if component.min_tokens.is_some_and(|min| min > remaining) {
                dropped.push(dropped_as(DropReason::BelowMinimum));
                continue;
            }

            let allocation = estimate
                .min(component.max_tokens.unwrap_or(usize::MAX))
                .min(remaining);

            if allocation >= estimate {
                used += estimate;
                included.push(PackedComponent {
                    name: component.name.clone(),
                    content: component.content.clone(),
                    tokens: estimate,
                    truncated: false,
                });
                continue;
            }

            match fit_to_allocation(&component.content, allocation) {
                Some((content, tokens)) => {
                    debug!(
                        component = %component.name,
                        estimate,
                        allocation,
                        tokens,
                        "Truncated component to fit budget"
                    );
                    used += tokens;
                    included.push(PackedComponent {
                        name: component.name.clone(),
                        content,
                        tokens,
                        truncated: true,
                    });
                }
                None => dropped.push(dropped_as(DropReason::NothingLeft)),
            }
        }

        let utilization_pct = if available == 0 {
            0.0
        } else {
            (used as f32 / available as f32) * 100.0
        };

        PackResult {
            contents: included.iter().map(|c| c.content.clone()).collect(),
            included,
            dropped,
            used_tokens: used,
            available,
            utilization_pct,
        }
    }
}

/// Pack components and return only the contents, in priority order.
pub fn pack(components: &[ContextComponent], config: &BudgetConfig) -> Vec<String> {
    TokenBudgeter::new(*config).pack(components).contents
}

/// Truncate until the re-estimated cost fits `allocation`. A bare marker
/// carries no content and counts as nothing left.
fn fit_to_allocation(content: &str, allocation: usize) -> Option<(String, usize)> {
    let mut target = allocation;
    while target > 0 {
        let text = truncate_to_tokens(content, target);
        if text.is_empty() || text == TRUNCATION_MARKER {
            return None;
        }
        let cost = estimate_tokens(&text);
        if cost <= allocation {
            return Some((text, cost));
        }
        target = target.saturating_sub((cost - allocation).max(1));
    }
    None
}
