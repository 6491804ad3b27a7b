//! Telegram HTML rendering for bot replies.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Reply to a relayed query. The model's text is escaped, never interpreted.
pub fn format_answer(reply: &str) -> String {
    format!("🤖 <b>Answer:</b>\n{}", escape_html(reply))
}

/// Shorten `s` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}
