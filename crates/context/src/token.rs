//! Token estimation utilities.
//!
//! Uses a word-based heuristic: ~1.3 tokens per whitespace-separated word,
//! rounded up. Deterministic and tokenizer-free; every budget decision in
//! this crate is made against these estimates.

use recall_core::message::Message;

/// Fixed per-message cost for role name and wire-format delimiters.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Appended to truncated text.
pub const TRUNCATION_MARKER: &str = "...";

/// Estimate the token count for a string.
///
/// `ceil(words × 1.3)`, computed in integers. Empty or whitespace-only text
/// is zero.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words * 13).div_ceil(10)
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages.
pub fn estimate_conversation(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Shorten `text` so it is roughly `max_tokens` long.
///
/// Text that already fits is returned unchanged. Otherwise the text is cut
/// at the same fraction of its characters, backed off to a word boundary and
/// suffixed with [`TRUNCATION_MARKER`]. A truncated result is always strictly
/// shorter than the input. When no whole word survives the result is the
/// marker alone, or empty when the input is too short to be replaced by it.
///
/// The estimate of the result can still exceed `max_tokens` slightly (short
/// leading words); callers that need a hard bound re-estimate.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let estimate = estimate_tokens(text);
    if estimate <= max_tokens {
        return text.to_string();
    }

    let total_chars = text.chars().count();
    let cut = total_chars * max_tokens / estimate;
    let byte_end = text
        .char_indices()
        .nth(cut)
        .map_or(text.len(), |(i, _)| i);

    let mut prefix = &text[..byte_end];
    // Never end mid-word.
    if !text[byte_end..].starts_with(char::is_whitespace) {
        prefix = back_off_one_word(prefix);
    }
    let mut prefix = prefix.trim_end();

    while !prefix.is_empty() && prefix.chars().count() + TRUNCATION_MARKER.len() >= total_chars {
        prefix = back_off_one_word(prefix).trim_end();
    }

    if prefix.is_empty() {
        if total_chars > TRUNCATION_MARKER.len() {
            return TRUNCATION_MARKER.to_string();
        }
        return String::new();
    }
    format!("{prefix}{TRUNCATION_MARKER}")
}

/// Drop the trailing (possibly partial) word.
fn back_off_one_word(s: &str) -> &str {
    match s.rfind(char::is_whitespace) {
        Some(i) => &s[..i],
        None => "",
    }
}
