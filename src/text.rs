//! Text heuristics shared by the processor, the session store and the CLI.
//!
//! Nothing here calls the network.  Lengths are measured in `char`s, never
//! bytes, so Cyrillic input is cut on character boundaries.

use crate::config::TextConfig;
use crate::llm::prompt::ProcessingMode;
use crate::llm::ChatMessage;

/// Rough characters-per-token ratio used for budget estimates.
const CHARS_PER_TOKEN: usize = 4;

/// Keep at most `max` characters, appending `...` when something was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// A text is "short" (no summary offered) when it has fewer than
/// `short_text_words` words or fewer than `short_text_chars` characters.
pub fn is_short_text(text: &str, cfg: &TextConfig) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    word_count(text) < cfg.short_text_words || text.chars().count() < cfg.short_text_chars
}

/// Modes offered for `text`: always basic and premium, summary only for
/// longer input.
pub fn available_modes(text: &str, cfg: &TextConfig) -> Vec<ProcessingMode> {
    let mut modes = vec![ProcessingMode::Basic, ProcessingMode::Premium];
    if !is_short_text(text, cfg) {
        modes.push(ProcessingMode::Summary);
    }
    modes
}

/// Preview of at most `max_len` characters plus `...`.  Cuts back to the
/// last space only when it lies past 70% of `max_len`, otherwise cuts
/// mid-word.
pub fn trim_preview(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len).collect();
    let last_space = cut.rfind(' ').map(|byte_idx| (byte_idx, cut[..byte_idx].chars().count()));
    let cut = match last_space {
        Some((byte_idx, chars)) if chars * 10 > max_len * 7 => &cut[..byte_idx],
        _ => cut.as_str(),
    };
    format!("{cut}...")
}

/// Approximate token count (~4 chars per token, never below 1).
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / CHARS_PER_TOKEN).max(1)
}

/// Cut `text` proportionally so its estimate fits in `max_tokens`.
pub fn clamp_to_token_limit(text: &str, max_tokens: usize) -> String {
    let tokens = estimate_tokens(text);
    if tokens <= max_tokens {
        return text.to_string();
    }
    let keep = text.chars().count() * max_tokens / tokens;
    text.chars().take(keep).collect()
}

/// Sliding window: keep the newest messages whose combined estimate fits in
/// `max_tokens`.  Order is preserved.
pub fn trim_messages_to_token_limit(messages: &[ChatMessage], max_tokens: usize) -> Vec<ChatMessage> {
    let mut total = 0;
    let mut start = messages.len();
    for (idx, msg) in messages.iter().enumerate().rev() {
        total += estimate_tokens(&msg.content);
        if total > max_tokens {
            break;
        }
        start = idx;
    }
    messages[start..].to_vec()
}
