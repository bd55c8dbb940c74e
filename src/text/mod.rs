//! Narrative text presentation.
//!
//! Text blocks arrive partial and grow chunk by chunk; chunks can end
//! mid-tag. Sanitization strips the model's thinking delimiters and any
//! dangling tag fragment at the tail, and is idempotent so a block can be
//! re-presented as often as the decoder calls back.

use std::sync::OnceLock;

use regex::Regex;

fn thinking_delimiters() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?thinking>").expect("static pattern compiles"))
}

/// Sanitize a narrative chunk for display: drop `<thinking>`/`</thinking>`
/// delimiters (keeping the inner text) and any incomplete tag fragment the
/// stream left at the tail.
///
/// `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(text: &str) -> String {
    let stripped = thinking_delimiters().replace_all(text, "");
    remove_partial_tail_tag(&stripped).to_string()
}

/// Remove an incomplete tag fragment (`<`, `</thi`, …) from the end of a
/// streaming chunk. Content that merely contains `<` mid-text is untouched.
pub fn remove_partial_tail_tag(text: &str) -> &str {
    let Some(pos) = text.rfind('<') else {
        return text;
    };
    let tail = &text[pos..];
    if !tail.contains('>') && is_tag_fragment(tail) {
        return &text[..pos];
    }
    text
}

fn is_tag_fragment(tail: &str) -> bool {
    let rest = tail[1..].strip_prefix('/').unwrap_or(&tail[1..]);
    rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The unseen suffix to emit for a block whose sanitized content has grown
/// since `previous` was presented. `None` means nothing new to show.
pub(crate) fn render_delta(previous: &str, sanitized: &str) -> Option<String> {
    if sanitized.len() <= previous.len() {
        return None;
    }
    if let Some(suffix) = sanitized.strip_prefix(previous) {
        return Some(suffix.to_string());
    }
    // Sanitization shifted an earlier stretch (a fragment completed into a
    // delimiter and vanished). Emit everything past the common prefix.
    let common = previous
        .bytes()
        .zip(sanitized.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    Some(sanitized[common..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_thinking_delimiters_but_keeps_text() {
        assert_eq!(sanitize("<thinking>hmm</thinking>so"), "hmmso");
    }

    #[test]
    fn strips_dangling_tag_fragment() {
        assert_eq!(sanitize("Hello <thi"), "Hello ");
        assert_eq!(sanitize("Hello </"), "Hello ");
        assert_eq!(sanitize("Hello <"), "Hello ");
    }

    #[test]
    fn keeps_non_tag_angle_brackets() {
        assert_eq!(sanitize("a < b"), "a < b");
        assert_eq!(sanitize("x <- y"), "x <- y");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for input in [
            "plain",
            "Hello <thinki",
            "<thinking>a</thinking>b<",
            "a < b </thinking>",
            "",
        ] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn render_delta_emits_only_the_suffix() {
        assert_eq!(render_delta("Hel", "Hello"), Some("lo".to_string()));
        assert_eq!(render_delta("Hello", "Hello"), None);
        assert_eq!(render_delta("Hello", "Hel"), None);
    }

    #[test]
    fn render_delta_never_duplicates_across_fragment_completion() {
        // "abc<thi" presents as "abc"; once the tag completes and is
        // stripped, only the new text after it is emitted.
        let first = sanitize("abc<thi");
        assert_eq!(first, "abc");
        let second = sanitize("abc<thinking>def");
        assert_eq!(render_delta(&first, &second), Some("def".to_string()));
    }
}
