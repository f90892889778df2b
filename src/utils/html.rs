//! Markup cleanup for embed fields. AniList descriptions and MAL synopses
//! arrive with HTML in them, and embed fields have hard length caps.

use std::borrow::Cow;

use scraper::Html;

/// Flattens an HTML fragment to its text content. `<br>` turns into a
/// newline, every other tag just disappears.
pub fn strip(html: &str) -> String {
    let with_breaks = html.replace("<br>", "\n").replace("<br/>", "\n").replace("<br />", "\n");

    Html::parse_fragment(&with_breaks)
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Caps `text` at `limit` characters, marking the cut with a trailing `..`.
pub fn truncate(text: &str, limit: usize) -> Cow<'_, str> {
    if text.chars().count() <= limit {
        Cow::Borrowed(text)
    } else {
        let mut cut: String = text.chars().take(limit.saturating_sub(2)).collect();
        cut.push_str("..");
        Cow::Owned(cut)
    }
}

/// Splits `text` into embed-description sized parts, each at most `limit`
/// characters. Parts after the first start with `...`, parts before the last
/// end with `...`, so a reader can tell the description continues.
pub fn paginate(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest: Vec<char> = text.chars().collect();

    while rest.len() > limit {
        let tail = rest.split_off(limit);

        let mut part: String = rest.into_iter().collect();
        part.push_str("...");
        parts.push(part);

        rest = "...".chars().chain(tail).collect();
    }

    parts.push(rest.into_iter().collect());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strip_removes_tags_and_keeps_text() {
        assert_eq!(
            strip("An <i>adventure</i> begins.<br>Or does it?"),
            "An adventure begins.\nOr does it?"
        );
    }

    #[test]
    fn strip_leaves_plain_text_alone() {
        assert_eq!(strip("no markup here"), "no markup here");
    }

    #[test]
    fn truncate_is_a_noop_under_the_limit() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn truncate_marks_the_cut() {
        assert_eq!(truncate("abcdefgh", 6), "abcd..");
    }

    #[test]
    fn paginate_short_text_is_one_part() {
        assert_eq!(paginate("hello", 100), vec!["hello".to_owned()]);
    }

    #[test]
    fn paginate_marks_continuations_on_both_sides() {
        let parts = paginate(&"a".repeat(10), 4);

        assert_eq!(parts[0], "aaaa...");
        assert!(parts[1].starts_with("..."));
        assert!(parts[1].ends_with("..."));
        assert!(parts.last().is_some_and(|last| last.starts_with("...")));
        assert!(!parts.last().is_some_and(|last| last.ends_with("......")));
    }
}
