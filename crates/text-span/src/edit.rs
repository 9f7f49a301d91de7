//! One-pass text splicing.
//!
//! Replacements are described against spans of the *original* text and applied
//! together, so a replacement that is shorter or longer than the text it
//! replaces never shifts the position of a later one.

use crate::Span;
use thiserror::Error;

/// A replacement of one span of the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// The span of the original text to replace.
    pub span: Span,
    /// The text to put in its place.
    pub replacement: String,
}

impl TextEdit {
    /// Creates a new edit.
    pub fn new(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }
}

/// An edit set that cannot be applied to the given text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// Two edits cover the same bytes.
    #[error("overlapping edits at {first:?} and {second:?}")]
    Overlap {
        /// The earlier edit's span.
        first: Span,
        /// The later edit's span.
        second: Span,
    },

    /// An edit reaches past the end of the text or splits a character.
    #[error("edit {span:?} is outside the text")]
    OutOfBounds {
        /// The offending span.
        span: Span,
    },
}

/// Applies all `edits` to `text` in a single pass over the original.
///
/// Edits may be given in any order; they must not overlap.
pub fn apply_edits(text: &str, mut edits: Vec<TextEdit>) -> Result<String, EditError> {
    edits.sort_by_key(|edit| edit.span.start);

    let mut output = String::with_capacity(text.len());
    let mut cursor = 0usize;
    let mut previous: Option<Span> = None;

    for edit in &edits {
        let start = usize::from(edit.span.start);
        let end = usize::from(edit.span.end);

        if start > end
            || end > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            return Err(EditError::OutOfBounds { span: edit.span });
        }
        if let Some(prev) = previous {
            if prev.end > edit.span.start {
                return Err(EditError::Overlap {
                    first: prev,
                    second: edit.span,
                });
            }
        }

        output.push_str(&text[cursor..start]);
        output.push_str(&edit.replacement);
        cursor = end;
        previous = Some(edit.span);
    }

    output.push_str(&text[cursor..]);
    Ok(output)
}
