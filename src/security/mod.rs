//! Input hardening for visitor messages.
//!
//! [`sanitize`] strips tag-shaped markup, [`is_injection_attempt`] screens the
//! result against a forbidden-phrase list, and [`wrap_user_content`] fences the
//! surviving text inside the delimiter the system prompt treats as untrusted.

pub mod injection;
pub mod sanitizer;

pub use injection::{is_injection_attempt, matched_phrase, BLOCKED_PHRASES};
pub use sanitizer::{sanitize, wrap_user_content, USER_INPUT_END, USER_INPUT_START};

/// Redact sensitive values for safe logging. Shows first 4 chars + "***" suffix.
pub fn redact(value: &str) -> String {
    match value.char_indices().nth(4) {
        Some((end, _)) => format!("{}***", &value[..end]),
        None => "***".to_string(),
    }
}
