//! Text processing utilities.

/// Cut `content` to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(content: &str, max: usize) -> String {
    if content.chars().count() <= max {
        return content.to_string();
    }
    let kept: String = content.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Collapse runs of whitespace, newlines included, into single spaces.
pub fn single_line(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}
