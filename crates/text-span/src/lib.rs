//! Source text positions for css-purge.
//!
//! This crate provides the small set of position utilities shared by the
//! stylesheet parser, the purge engine and the HTML rewriting driver:
//! byte spans, offset to line/column lookup for diagnostics, and one-pass
//! splicing of replacement text into an original document.

mod edit;
mod line_index;
mod span;

pub use edit::{apply_edits, EditError, TextEdit};
pub use line_index::{LineCol, LineIndex};
pub use span::{ByteOffset, Span};
