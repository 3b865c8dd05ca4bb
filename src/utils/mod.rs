//! Small shared helpers

pub mod constants;
pub mod wait;

pub use wait::PollPacing;

/// Rough token-count estimate for a captured transcript.
///
/// Uses the common chars/4 heuristic; the session layer only needs an order
/// of magnitude for bookkeeping, not tokenizer-exact counts.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

/// Shorten a string for a progress log line without splitting a char.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("héllo wörld!"), 3);
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_for_log("short", 10), "short");
        let cut = truncate_for_log("héllo wörld", 5);
        assert_eq!(cut, "héllo…");
    }
}
