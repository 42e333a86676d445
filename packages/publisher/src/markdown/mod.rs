//! Markdown conversion for the note.com editor.
//!
//! - [`render`] - block scanner producing editor HTML
//! - [`inline`] - inline formatting and HTML escaping
//! - [`length`] - plain-text length estimate for article metadata

pub mod inline;
pub mod length;
pub mod render;

pub use inline::{escape_html, format_inline};
pub use length::estimate_length;
pub use render::{render, render_html, BlockKind, RenderedBlock};
