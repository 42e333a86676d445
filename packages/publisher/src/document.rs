//! Markdown documents with optional YAML front matter.
//!
//! ```text
//! ---
//! title: My article
//! image: https://example.com/cover.jpg
//! note_id: "123456"
//! published: true
//! tags: [rust, note]
//! ---
//! Body starts here.
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

lazy_static! {
    static ref TITLE_HEADING: Regex = Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*$").unwrap();
    static ref NOTE_ID_LINE: Regex = Regex::new(r"^note_id\s*:").unwrap();
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("document has no title (set `title` in front matter or add a `# ` heading)")]
    MissingTitle,
}

pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

/// A document ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    /// Markdown body without front matter
    pub body: String,
    /// Cover image, URL or local path
    pub eyecatch_url: Option<String>,
    /// Existing article to update instead of creating one
    pub note_id: Option<String>,
    pub publish: bool,
    pub hashtags: Vec<String>,
}

/// Values given on the command line, which win over front matter.
#[derive(Debug, Clone, Default)]
pub struct DocumentOverrides {
    pub title: Option<String>,
    pub eyecatch_url: Option<String>,
    /// Force publishing; `false` leaves the front matter setting alone
    pub publish: bool,
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    title: Option<String>,
    image: Option<String>,
    note_id: Option<Scalar>,
    published: Option<bool>,
    tags: Option<Tags>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Integer(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Tags {
    List(Vec<Scalar>),
    Csv(String),
}

impl Tags {
    fn into_vec(self) -> Vec<String> {
        match self {
            Tags::List(items) => items.into_iter().map(Scalar::into_string).collect(),
            Tags::Csv(text) => text
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

impl Document {
    /// Read and parse a markdown file.
    pub fn load(path: &Path, overrides: &DocumentOverrides) -> DocumentResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_markdown(&text, overrides)
    }

    /// Parse markdown text with optional front matter.
    pub fn from_markdown(text: &str, overrides: &DocumentOverrides) -> DocumentResult<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let (front, body) = match split_front_matter(text) {
            Some((yaml, body)) if yaml.trim().is_empty() => (FrontMatter::default(), body),
            Some((yaml, body)) => (serde_yaml::from_str::<FrontMatter>(yaml)?, body),
            None => (FrontMatter::default(), text),
        };

        let title = overrides
            .title
            .clone()
            .or(front.title)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| first_heading(body))
            .ok_or(DocumentError::MissingTitle)?;

        Ok(Self {
            title,
            body: body.to_string(),
            eyecatch_url: overrides
                .eyecatch_url
                .clone()
                .or(front.image)
                .filter(|s| !s.trim().is_empty()),
            note_id: front
                .note_id
                .map(Scalar::into_string)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            publish: overrides.publish || front.published.unwrap_or(false),
            hashtags: front.tags.map(Tags::into_vec).unwrap_or_default(),
        })
    }
}

fn first_heading(body: &str) -> Option<String> {
    TITLE_HEADING
        .captures(body)
        .map(|c| c[1].trim_end_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Split `---` delimited front matter from the body.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Set `note_id` in the front matter of `text`, adding a block if needed.
pub fn with_note_id(text: &str, note_id: &str) -> String {
    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let entry = format!("note_id: \"{}\"", note_id.replace('"', "\\\""));
    let (bom, text) = match text.strip_prefix('\u{feff}') {
        Some(rest) => ("\u{feff}", rest),
        None => ("", text),
    };

    let Some((yaml, body)) = split_front_matter(text) else {
        return format!("{bom}---{nl}{entry}{nl}---{nl}{text}", nl = newline);
    };

    let mut lines: Vec<String> = yaml.lines().map(str::to_string).collect();
    match lines.iter().position(|l| NOTE_ID_LINE.is_match(l)) {
        Some(i) => lines[i] = entry,
        None => lines.push(entry),
    }

    let mut out = String::with_capacity(text.len() + 32);
    out.push_str(bom);
    out.push_str("---");
    out.push_str(newline);
    for line in lines {
        out.push_str(&line);
        out.push_str(newline);
    }
    out.push_str("---");
    out.push_str(newline);
    out.push_str(body);
    out
}

/// Record `note_id` in the file's front matter. Returns whether the file changed.
pub fn write_back_note_id(path: &Path, note_id: &str) -> DocumentResult<bool> {
    let original = std::fs::read_to_string(path)?;
    let updated = with_note_id(&original, note_id);
    if updated == original {
        return Ok(false);
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(updated.as_bytes())?;
    staged.flush()?;
    staged.persist(path).map_err(|e| DocumentError::Io(e.error))?;
    Ok(true)
}
