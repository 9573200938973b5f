/// User turn text sent when the client supplies no prompt.
pub const DEFAULT_USER: &str = include_str!("../data/prompts/default_user.txt");
/// Response text returned when the provider produces no usable text.
pub const EMPTY_GENERATION: &str = include_str!("../data/prompts/empty_generation.txt");

/// Returns the first `max_chars` characters of `text` for log previews.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
