//! Request payloads for draft-save and publish.
//!
//! The draft-save endpoint is undocumented and has accepted different body
//! shapes over time, so the orchestrator walks [`DRAFT_SAVE_VARIANTS`] in
//! order and keeps the first one the platform accepts.

use indexmap::IndexSet;
use serde_json::{json, Value};

use crate::markdown::{estimate_length, render_html};

/// Everything a draft-save or publish payload may carry.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftContent {
    pub id: String,
    pub key: String,
    pub title: String,
    /// Markdown after inline image rewriting
    pub markdown: String,
    pub html: String,
    pub body_length: usize,
    /// Storage keys of uploaded inline images
    pub image_keys: Vec<String>,
}

impl DraftContent {
    /// Render `markdown` and measure it.
    pub fn new(
        id: impl Into<String>,
        key: impl Into<String>,
        title: impl Into<String>,
        markdown: impl Into<String>,
        image_keys: Vec<String>,
    ) -> Self {
        let markdown = markdown.into();
        Self {
            id: id.into(),
            key: key.into(),
            title: title.into(),
            html: render_html(&markdown),
            body_length: estimate_length(&markdown),
            markdown,
            image_keys,
        }
    }
}

/// One draft-save body shape.
#[derive(Debug, Clone, Copy)]
pub struct PayloadVariant {
    pub name: &'static str,
    pub build: fn(&DraftContent) -> Value,
}

pub const DRAFT_SAVE_VARIANTS: &[PayloadVariant] = &[
    PayloadVariant {
        name: "full",
        build: full_payload,
    },
    PayloadVariant {
        name: "html",
        build: html_payload,
    },
    PayloadVariant {
        name: "markdown",
        build: markdown_payload,
    },
    PayloadVariant {
        name: "by_id",
        build: id_payload,
    },
    PayloadVariant {
        name: "by_key",
        build: key_payload,
    },
];

fn full_payload(content: &DraftContent) -> Value {
    json!({
        "name": content.title,
        "body": content.html,
        "body_length": content.body_length,
        "index": false,
        "is_lead_form": false,
        "raw_body": content.markdown,
        "image_keys": content.image_keys,
        "embedded_image_keys": content.image_keys,
    })
}

fn html_payload(content: &DraftContent) -> Value {
    json!({
        "name": content.title,
        "body": content.html,
        "body_length": content.body_length,
        "index": false,
        "is_lead_form": false,
    })
}

fn markdown_payload(content: &DraftContent) -> Value {
    json!({
        "name": content.title,
        "body": content.markdown,
        "body_length": content.body_length,
        "index": false,
        "is_lead_form": false,
    })
}

fn id_payload(content: &DraftContent) -> Value {
    json!({
        "id": content.id,
        "name": content.title,
        "body": content.html,
    })
}

fn key_payload(content: &DraftContent) -> Value {
    json!({
        "key": content.key,
        "name": content.title,
        "body": content.html,
    })
}

/// Body for `PUT /api/v1/text_notes/{id}` that publishes the article.
pub fn publish_payload(content: &DraftContent, hashtags: &[String]) -> Value {
    json!({
        "name": content.title,
        "body": content.html,
        "body_length": content.body_length,
        "status": "published",
        "hashtags": normalize_hashtags(hashtags),
        "index": false,
        "is_lead_form": false,
        "image_keys": content.image_keys,
    })
}

/// Trim, drop empties, ensure a single leading `#`, dedupe in order.
pub fn normalize_hashtags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| tag.trim().trim_start_matches('#').trim())
        .filter(|bare| !bare.is_empty())
        .map(|bare| format!("#{}", bare))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> DraftContent {
        DraftContent::new(
            "123",
            "n0abc",
            "Title",
            "# Hi\n\n**bold** text",
            vec!["img/a.png".to_string()],
        )
    }

    #[test]
    fn test_variant_order() {
        let names: Vec<&str> = DRAFT_SAVE_VARIANTS.iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["full", "html", "markdown", "by_id", "by_key"]);
    }

    #[test]
    fn test_full_payload_fields() {
        let c = content();
        let payload = (DRAFT_SAVE_VARIANTS[0].build)(&c);
        assert_eq!(payload["name"], "Title");
        assert_eq!(payload["body"], c.html.as_str());
        assert_eq!(payload["raw_body"], "# Hi\n\n**bold** text");
        assert_eq!(payload["body_length"], 10);
        assert_eq!(payload["index"], false);
        assert_eq!(payload["image_keys"], json!(["img/a.png"]));
        assert_eq!(payload["embedded_image_keys"], json!(["img/a.png"]));
    }

    #[test]
    fn test_markdown_variant_sends_raw_body() {
        let c = content();
        let payload = (DRAFT_SAVE_VARIANTS[2].build)(&c);
        assert_eq!(payload["body"], "# Hi\n\n**bold** text");
        assert!(payload.get("raw_body").is_none());
    }

    #[test]
    fn test_identity_variants() {
        let c = content();
        let by_id = (DRAFT_SAVE_VARIANTS[3].build)(&c);
        let by_key = (DRAFT_SAVE_VARIANTS[4].build)(&c);
        assert_eq!(by_id, json!({"id": "123", "name": "Title", "body": c.html}));
        assert_eq!(by_key, json!({"key": "n0abc", "name": "Title", "body": c.html}));
    }

    #[test]
    fn test_publish_payload() {
        let c = content();
        let tags = vec!["rust".to_string(), " #rust ".to_string(), "".to_string(), "note".to_string()];
        let payload = publish_payload(&c, &tags);
        assert_eq!(payload["status"], "published");
        assert_eq!(payload["hashtags"], json!(["#rust", "#note"]));
    }

    #[test]
    fn test_normalize_hashtags() {
        let tags: Vec<String> = ["  a ", "#b", "##c", "   ", "a", "#"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(normalize_hashtags(&tags), vec!["#a", "#b", "#c"]);
    }
}
