// src/utils/html.rs

/// Strips unsafe markup from creator-entered text (exam titles, descriptions,
/// rewards, question prompts and options).
///
/// Whitelist-based: harmless formatting tags such as <b> and <p> survive, while
/// <script>/<iframe> (with their content) and event-handler attributes are removed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
