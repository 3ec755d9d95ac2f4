//! Input sanitization and the untrusted-content delimiter.
//!
//! Visitor text is stripped of anything tag-shaped before it is wrapped in
//! [`USER_INPUT_START`] / [`USER_INPUT_END`]. Stripping first means a visitor
//! cannot close the delimiter early and smuggle text outside of it.

use regex::Regex;
use std::sync::OnceLock;

/// Opening delimiter around visitor-supplied text.
pub const USER_INPUT_START: &str = "<user_input>";
/// Closing delimiter around visitor-supplied text.
pub const USER_INPUT_END: &str = "</user_input>";

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is a valid regex"))
}

/// Remove every `<...>` substring from `raw`.
///
/// Everything outside a tag is left untouched, including a lone `<` that
/// never closes.
pub fn sanitize(raw: &str) -> String {
    tag_pattern().replace_all(raw, "").into_owned()
}

/// Wrap already-sanitized text in the untrusted-content delimiter.
pub fn wrap_user_content(clean: &str) -> String {
    let mut wrapped =
        String::with_capacity(USER_INPUT_START.len() + clean.len() + USER_INPUT_END.len());
    wrapped.push_str(USER_INPUT_START);
    wrapped.push_str(clean);
    wrapped.push_str(USER_INPUT_END);
    wrapped
}
