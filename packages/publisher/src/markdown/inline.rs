//! Inline formatting for a single line of markdown.
//!
//! Code spans, images and links are turned into HTML first and stashed behind
//! placeholders, so the emphasis passes that follow never see URLs, attribute
//! values or code. Placeholders use private-use code points, which the input
//! is stripped of up front.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

const STASH_OPEN: char = '\u{E000}';
const STASH_CLOSE: char = '\u{E001}';

lazy_static! {
    static ref CODE_SPAN: Regex = Regex::new(r"`([^`]+)`").unwrap();
    pub(crate) static ref IMAGE: Regex =
        Regex::new(r"!\[([^\]]*)\]\((https?://[^)\s]+)\)").unwrap();
    pub(crate) static ref LINK: Regex = Regex::new(r"\[([^\]]+)\]\((https?://[^)\s]+)\)").unwrap();
    static ref STRIKE: Regex = Regex::new(r"~~(.+?)~~").unwrap();
    static ref BOLD: Regex = Regex::new(r"\*\*([^*]+)\*\*").unwrap();
    static ref ITALIC_STAR: Regex = Regex::new(r"\*([^*]+)\*").unwrap();
    static ref ITALIC_UNDERSCORE: Regex = Regex::new(r"_([^_]+)_").unwrap();
    static ref PLACEHOLDER: Regex = Regex::new(r"\x{E000}(\d+)\x{E001}").unwrap();
}

/// Escape text for use in HTML content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// `<img>` tag used both inline and inside figure blocks.
pub(crate) fn image_tag(src: &str, alt: &str) -> String {
    format!(
        r#"<img src="{}" alt="{}" loading="lazy" class="is-slide" data-modal="true""#,
        src, alt
    )
}

/// Convert one line of markdown to HTML.
pub fn format_inline(line: &str) -> String {
    let mut stash = Stash::default();
    let line: String = line
        .chars()
        .filter(|c| *c != STASH_OPEN && *c != STASH_CLOSE)
        .collect();

    let text = CODE_SPAN.replace_all(&line, |caps: &Captures| {
        stash.push(format!("<code>{}</code>", escape_html(&caps[1])))
    });

    // Everything below operates on escaped text, so captured URLs and
    // labels are already safe to place in attributes.
    let text = escape_html(&text);

    let text = IMAGE.replace_all(&text, |caps: &Captures| {
        let tag = image_tag(caps[2].trim(), caps[1].trim());
        stash.push(format!("{}>", tag))
    });

    let text = LINK.replace_all(&text, |caps: &Captures| {
        let label = emphasize(caps[1].trim());
        stash.push(format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
            caps[2].trim(),
            label
        ))
    });

    let text = emphasize(&text);
    stash.restore(&text)
}

/// Single pass of strikethrough, bold and italic substitution.
fn emphasize(text: &str) -> String {
    let text = STRIKE.replace_all(text, "<s>$1</s>");
    let text = BOLD.replace_all(&text, "<strong>$1</strong>");
    let text = ITALIC_STAR.replace_all(&text, "<i>$1</i>");
    ITALIC_UNDERSCORE.replace_all(&text, "<i>$1</i>").into_owned()
}

#[derive(Default)]
struct Stash {
    fragments: Vec<String>,
}

impl Stash {
    fn push(&mut self, html: String) -> String {
        self.fragments.push(html);
        format!("{}{}{}", STASH_OPEN, self.fragments.len() - 1, STASH_CLOSE)
    }

    fn restore(&self, text: &str) -> String {
        let mut text = text.to_string();
        // Link labels may hold code-span placeholders, so unwrap until stable.
        for _ in 0..=self.fragments.len() {
            if !text.contains(STASH_OPEN) {
                break;
            }
            text = PLACEHOLDER
                .replace_all(&text, |caps: &Captures| {
                    caps[1]
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| self.fragments.get(i))
                        .cloned()
                        .unwrap_or_default()
                })
                .into_owned();
        }
        text
    }
}
