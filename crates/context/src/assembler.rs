//! Prompt assembly from persona, recalled memories and history.
//!
//! Every piece becomes a [`ContextComponent`] and goes through the token
//! budgeter. History messages are prioritized newest-first so the oldest
//! turns are the first to go, then restored to chronological order.
//!
//! # Priorities
//!
//! | Component | Priority |
//! |-----------|----------|
//! | Persona | 1000 |
//! | Memories | 500 |
//! | History | 100 for the newest message, one less per step back |
//!
//! Assembly is deterministic: identical inputs always produce identical
//! outputs.

use crate::budget::{ContextComponent, DropInfo, PackResult, TokenBudgeter};
use crate::recall::render_memories;
use recall_core::memory::MemoryRecord;
use recall_core::message::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PERSONA_PRIORITY: i32 = 1_000;
pub const MEMORY_PRIORITY: i32 = 500;
pub const HISTORY_PRIORITY: i32 = 100;

/// Inputs for a single model call.
pub struct AssemblyInput<'a> {
    pub persona: &'a str,
    /// Already recalled, most useful first.
    pub memories: &'a [MemoryRecord],
    /// Chronological.
    pub history: &'a [Message],
}

/// The assembled context, ready for a model call.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// Persona plus the memory section, when either survived packing.
    pub system_message: String,
    /// Surviving history in chronological order. Truncated messages carry
    /// their truncated content.
    pub messages: Vec<Message>,
    pub metadata: AssemblyMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    pub total_tokens: usize,
    pub budget: usize,
    /// Budget utilization percentage (0.0–100.0).
    pub utilization_pct: f32,
    pub history_included: usize,
    pub history_total: usize,
    pub drops: Vec<DropInfo>,
}

/// The context assembler. Stateless, create one and reuse it.
pub struct ContextAssembler {
    budgeter: TokenBudgeter,
}

impl ContextAssembler {
    pub fn new(budgeter: TokenBudgeter) -> Self {
        Self { budgeter }
    }

    pub fn assemble(&self, input: &AssemblyInput<'_>) -> AssembledContext {
        let mut components = Vec::with_capacity(input.history.len() + 2);
        components.push(ContextComponent::new("persona", PERSONA_PRIORITY, input.persona));
        if !input.memories.is_empty() {
            components.push(ContextComponent::new(
                "memories",
                MEMORY_PRIORITY,
                render_memories(input.memories),
            ));
        }

        let mut history_index = HashMap::with_capacity(input.history.len());
        for (age, message) in input.history.iter().rev().enumerate() {
            let name = format!("history:{}", message.id);
            let priority = HISTORY_PRIORITY.saturating_sub(i32::try_from(age).unwrap_or(i32::MAX));
            history_index.insert(name.clone(), input.history.len() - 1 - age);
            components.push(ContextComponent::new(name, priority, message.content.clone()));
        }

        let packed: PackResult = self.budgeter.pack(&components);

        let mut sections = Vec::new();
        let mut history: Vec<(usize, Message)> = Vec::new();
        for component in &packed.included {
            match component.name.as_str() {
                "persona" | "memories" => sections.push(component.content.clone()),
                name => {
                    if let Some(&i) = history_index.get(name) {
                        let mut message = input.history[i].clone();
                        message.content = component.content.clone();
                        history.push((i, message));
                    }
                }
            }
        }
        history.sort_by_key(|(i, _)| *i);

        AssembledContext {
            system_message: sections.join("\n\n"),
            metadata: AssemblyMetadata {
                total_tokens: packed.used_tokens,
                budget: packed.available,
                utilization_pct: packed.utilization_pct,
                history_included: history.len(),
                history_total: input.history.len(),
                drops: packed.dropped,
            },
            messages: history.into_iter().map(|(_, m)| m).collect(),
        }
    }
}
