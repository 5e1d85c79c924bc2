//! Fence-stripping for model replies.
//!
//! Models often wrap JSON in a markdown code block even when told not to. This runs before
//! every parse attempt.

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Reply used when the model returned no text at all.
pub const EMPTY_REPLY: &str = "{}";

/// Trim, then remove a leading "```json" (or bare "```") and one trailing "```", repeating
/// until no leading fence remains. Total and idempotent.
pub fn strip_fences(reply: &str) -> &str {
    let mut text = reply.trim();
    loop {
        let rest = if let Some(rest) = text.strip_prefix(JSON_FENCE) {
            rest
        } else if let Some(rest) = text.strip_prefix(FENCE) {
            rest
        } else {
            return text;
        };
        text = rest.strip_suffix(FENCE).unwrap_or(rest).trim();
    }
}

/// Normalized reply text, defaulting to an empty object when the model said nothing.
pub fn normalize_reply(reply: Option<&str>) -> String {
    strip_fences(reply.unwrap_or(EMPTY_REPLY)).to_string()
}
