pub mod chat;
pub mod doctor;
pub mod forget;
pub mod inspect;
pub mod reset;
pub mod search;
pub mod stats;

/// Shorten `text` to at most `max` characters for one-line listings.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
