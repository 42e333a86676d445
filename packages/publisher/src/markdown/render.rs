//! Block-level markdown renderer producing note.com editor HTML.
//!
//! The editor expects every top-level block to carry a `name`/`id` anchor, so
//! each [`RenderedBlock`] gets a fresh UUID. Block content is deterministic;
//! only the anchors change between calls.
//!
//! Headings are folded into two tiers: `#` and `##` become `<h2>`, `###`
//! through `######` become `<h3>`.

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use super::inline::{escape_html, format_inline, image_tag};

const FENCE: &str = "```";

lazy_static! {
    static ref SOLE_IMAGE: Regex = Regex::new(r"^!\[([^\]]*)\]\((https?://[^)\s]+)\)$").unwrap();
    static ref THEMATIC_BREAK: Regex = Regex::new(r"^\s*-{3,}\s*$").unwrap();
    static ref QUOTE: Regex = Regex::new(r"^>\s?(.*)$").unwrap();
    static ref HEADING: Regex = Regex::new(r"^(#{1,6})\s+(.+)$").unwrap();
    static ref BULLET: Regex = Regex::new(r"^[-*]\s+(.+)$").unwrap();
}

/// Block content, already converted to HTML fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Formatted lines joined with `<br>`
    Paragraph(Vec<String>),
    Heading { level: u8, content: String },
    /// Formatted list items
    BulletList(Vec<String>),
    /// Formatted quote lines joined with `<br>`
    Blockquote(Vec<String>),
    /// Escaped code lines
    CodeBlock(Vec<String>),
    ImageFigure { src: String, alt: String },
    ThematicBreak,
}

/// One top-level block with its DOM anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    pub id: String,
    pub kind: BlockKind,
}

impl RenderedBlock {
    fn new(kind: BlockKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
        }
    }

    pub fn to_html(&self) -> String {
        let id = &self.id;
        match &self.kind {
            BlockKind::Paragraph(lines) => {
                format!(r#"<p name="{id}" id="{id}">{}</p>"#, lines.join("<br>"))
            }
            BlockKind::Heading { level, content } => {
                format!(r#"<h{level} name="{id}" id="{id}">{content}</h{level}>"#)
            }
            BlockKind::BulletList(items) => {
                let items: String = items.iter().map(|i| format!("<li>{}</li>", i)).collect();
                format!(r#"<ul name="{id}" id="{id}">{items}</ul>"#)
            }
            BlockKind::Blockquote(lines) => format!(
                r#"<blockquote><p name="{id}" id="{id}">{}</p></blockquote>"#,
                lines.join("<br>")
            ),
            BlockKind::CodeBlock(lines) => format!(
                r#"<pre name="{id}" id="{id}"><code>{}</code></pre>"#,
                lines.join("\n")
            ),
            BlockKind::ImageFigure { src, alt } => format!(
                r#"<figure name="{id}" id="{id}">{} contenteditable="false" draggable="false"><figcaption></figcaption></figure>"#,
                image_tag(src, alt)
            ),
            BlockKind::ThematicBreak => format!(r#"<hr name="{id}" id="{id}">"#),
        }
    }
}

/// Render markdown into editor blocks, in document order.
pub fn render(markdown: &str) -> Vec<RenderedBlock> {
    let text = markdown.replace("\r\n", "\n");
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut scanner = BlockScanner::default();
    for raw_line in text.split('\n') {
        scanner.scan_line(raw_line.trim_end());
    }
    scanner.finish()
}

/// Render markdown into the HTML string sent as an article body.
pub fn render_html(markdown: &str) -> String {
    render(markdown)
        .iter()
        .map(RenderedBlock::to_html)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two heading tiers: shallow headings map to h2, deeper ones to h3.
fn heading_level(hashes: usize) -> u8 {
    if hashes <= 2 {
        2
    } else {
        3
    }
}

#[derive(Default)]
struct BlockScanner {
    blocks: Vec<RenderedBlock>,
    paragraph: Vec<String>,
    list: Vec<String>,
    quote: Vec<String>,
    code: Vec<String>,
    in_code: bool,
}

impl BlockScanner {
    fn scan_line(&mut self, line: &str) {
        if line.trim_start().starts_with(FENCE) {
            self.flush_text_blocks();
            if self.in_code {
                self.flush_code();
            }
            self.in_code = !self.in_code;
            return;
        }

        if self.in_code {
            self.code.push(line.to_string());
            return;
        }

        if line.trim().is_empty() {
            self.flush_text_blocks();
            return;
        }

        if let Some(caps) = SOLE_IMAGE.captures(line.trim()) {
            self.flush_text_blocks();
            self.blocks.push(RenderedBlock::new(BlockKind::ImageFigure {
                src: escape_html(caps[2].trim()),
                alt: escape_html(caps[1].trim()),
            }));
            return;
        }

        if THEMATIC_BREAK.is_match(line) {
            self.flush_text_blocks();
            self.blocks.push(RenderedBlock::new(BlockKind::ThematicBreak));
            return;
        }

        if let Some(caps) = QUOTE.captures(line) {
            self.flush_paragraph();
            self.flush_list();
            self.quote.push(caps[1].to_string());
            return;
        }
        self.flush_quote();

        if let Some(caps) = HEADING.captures(line) {
            self.flush_paragraph();
            self.flush_list();
            self.blocks.push(RenderedBlock::new(BlockKind::Heading {
                level: heading_level(caps[1].len()),
                content: format_inline(caps[2].trim()),
            }));
            return;
        }

        if let Some(caps) = BULLET.captures(line) {
            self.flush_paragraph();
            self.list.push(caps[1].trim().to_string());
            return;
        }

        self.flush_list();
        self.paragraph.push(line.to_string());
    }

    fn finish(mut self) -> Vec<RenderedBlock> {
        if self.in_code {
            self.flush_code();
        }
        self.flush_paragraph();
        self.flush_list();
        self.flush_quote();
        self.blocks
    }

    fn flush_text_blocks(&mut self) {
        self.flush_paragraph();
        self.flush_list();
        self.flush_quote();
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let lines = self.paragraph.drain(..).map(|l| format_inline(&l)).collect();
        self.blocks.push(RenderedBlock::new(BlockKind::Paragraph(lines)));
    }

    fn flush_list(&mut self) {
        if self.list.is_empty() {
            return;
        }
        let items = self.list.drain(..).map(|l| format_inline(&l)).collect();
        self.blocks.push(RenderedBlock::new(BlockKind::BulletList(items)));
    }

    fn flush_quote(&mut self) {
        if self.quote.is_empty() {
            return;
        }
        let lines = self.quote.drain(..).map(|l| format_inline(&l)).collect();
        self.blocks.push(RenderedBlock::new(BlockKind::Blockquote(lines)));
    }

    fn flush_code(&mut self) {
        if self.code.is_empty() {
            return;
        }
        let lines = self.code.drain(..).map(|l| escape_html(&l)).collect();
        self.blocks.push(RenderedBlock::new(BlockKind::CodeBlock(lines)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(markdown: &str) -> Vec<BlockKind> {
        render(markdown).into_iter().map(|b| b.kind).collect()
    }

    #[test]
    fn test_heading_then_two_paragraphs() {
        let blocks = render("# Title\n\nline one\n\nline two");
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Heading {
                level: 2,
                content: "Title".to_string()
            }
        );
        assert_eq!(blocks[1].kind, BlockKind::Paragraph(vec!["line one".to_string()]));
        assert_eq!(blocks[2].kind, BlockKind::Paragraph(vec!["line two".to_string()]));
        assert_ne!(blocks[1].id, blocks[2].id);
    }

    #[test]
    fn test_render_is_stable_apart_from_ids() {
        let markdown = "## A\n\n- x\n- y\n\n> q\n\n```\ncode\n```\n\n---\n\ntext";
        let first = render(markdown);
        let second = render(markdown);
        assert_eq!(
            first.iter().map(|b| &b.kind).collect::<Vec<_>>(),
            second.iter().map(|b| &b.kind).collect::<Vec<_>>()
        );
        assert_ne!(first[0].id, second[0].id);
    }

    #[test]
    fn test_heading_tiers() {
        let levels: Vec<u8> = kinds("# a\n## b\n### c\n###### d")
            .into_iter()
            .filter_map(|k| match k {
                BlockKind::Heading { level, .. } => Some(level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![2, 2, 3, 3]);
    }

    #[test]
    fn test_seven_hashes_is_paragraph() {
        assert_eq!(
            kinds("####### too deep"),
            vec![BlockKind::Paragraph(vec!["####### too deep".to_string()])]
        );
    }

    #[test]
    fn test_consecutive_lines_join_with_br() {
        let html = render_html("first\nsecond");
        assert!(html.ends_with(">first<br>second</p>"));
    }

    #[test]
    fn test_bullet_list() {
        assert_eq!(
            kinds("intro\n- one\n* **two**\nafter"),
            vec![
                BlockKind::Paragraph(vec!["intro".to_string()]),
                BlockKind::BulletList(vec![
                    "one".to_string(),
                    "<strong>two</strong>".to_string()
                ]),
                BlockKind::Paragraph(vec!["after".to_string()]),
            ]
        );
    }

    #[test]
    fn test_blockquote_accumulates() {
        assert_eq!(
            kinds("> one\n>two\n>\nplain"),
            vec![
                BlockKind::Blockquote(vec!["one".to_string(), "two".to_string(), String::new()]),
                BlockKind::Paragraph(vec!["plain".to_string()]),
            ]
        );
    }

    #[test]
    fn test_code_block_is_escaped_verbatim() {
        assert_eq!(
            kinds("```rust\nlet a = **b** < c;\n\n  indented\n```"),
            vec![BlockKind::CodeBlock(vec![
                "let a = **b** &lt; c;".to_string(),
                String::new(),
                "  indented".to_string(),
            ])]
        );
    }

    #[test]
    fn test_unterminated_fence_still_flushes() {
        let blocks = kinds("text\n```\nfn main() {}");
        assert_eq!(
            blocks,
            vec![
                BlockKind::Paragraph(vec!["text".to_string()]),
                BlockKind::CodeBlock(vec!["fn main() {}".to_string()]),
            ]
        );
    }

    #[test]
    fn test_sole_image_line_is_figure() {
        let blocks = render("before\n![pic](https://example.com/a.png)\nafter");
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1].kind,
            BlockKind::ImageFigure {
                src: "https://example.com/a.png".to_string(),
                alt: "pic".to_string()
            }
        );
        let html = blocks[1].to_html();
        assert!(html.starts_with(&format!(r#"<figure name="{0}" id="{0}"><img src="#, blocks[1].id)));
        assert!(html.contains(r#"draggable="false"><figcaption></figcaption></figure>"#));
    }

    #[test]
    fn test_thematic_break() {
        assert_eq!(
            kinds("a\n---\nb\n-----"),
            vec![
                BlockKind::Paragraph(vec!["a".to_string()]),
                BlockKind::ThematicBreak,
                BlockKind::Paragraph(vec!["b".to_string()]),
                BlockKind::ThematicBreak,
            ]
        );
    }

    #[test]
    fn test_crlf_and_blank_input() {
        assert!(render("  \r\n\n ").is_empty());
        assert_eq!(render("a\r\nb").len(), 1);
        assert_eq!(render_html(""), "");
    }

    #[test]
    fn test_html_shapes() {
        let blocks = render("## T\n\n> q\n\n- i\n\n```\nx\n```\n\n---");
        let html: Vec<String> = blocks.iter().map(|b| b.to_html()).collect();
        let id = |i: usize| blocks[i].id.clone();

        assert_eq!(html[0], format!(r#"<h2 name="{0}" id="{0}">T</h2>"#, id(0)));
        assert_eq!(
            html[1],
            format!(r#"<blockquote><p name="{0}" id="{0}">q</p></blockquote>"#, id(1))
        );
        assert_eq!(html[2], format!(r#"<ul name="{0}" id="{0}"><li>i</li></ul>"#, id(2)));
        assert_eq!(html[3], format!(r#"<pre name="{0}" id="{0}"><code>x</code></pre>"#, id(3)));
        assert_eq!(html[4], format!(r#"<hr name="{0}" id="{0}">"#, id(4)));
    }
}
