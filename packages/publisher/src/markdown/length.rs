//! Plain-text length of a markdown body, sent as `body_length`.

use lazy_static::lazy_static;
use regex::Regex;

use super::inline::{IMAGE, LINK};

lazy_static! {
    static ref HEADING_MARKER: Regex = Regex::new(r"(?m)^\s*#{1,6}\s*").unwrap();
    static ref LIST_MARKER: Regex = Regex::new(r"(?m)^\s*[-*]\s+").unwrap();
}

/// Count the visible characters of `markdown`.
///
/// Images count for nothing, links count their label, heading/list markers
/// and `**`, `*`, `` ` `` markers are dropped, and whitespace is ignored.
pub fn estimate_length(markdown: &str) -> usize {
    let text = IMAGE.replace_all(markdown, "");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING_MARKER.replace_all(&text, "");
    let text = LIST_MARKER.replace_all(&text, "");
    let text = text.replace("**", "").replace(['*', '`'], "");

    text.chars().filter(|c| !c.is_whitespace()).count()
}
