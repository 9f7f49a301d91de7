//! Parse error types.

use text_span::Span;
use thiserror::Error;

/// An error that occurred while parsing a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// The location in the source where the error occurred.
    pub span: Span,
}

impl ParseError {
    /// Creates a new parse error.
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The kind of parse error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A `/*` comment with no closing `*/`.
    #[error("unterminated comment")]
    UnterminatedComment,

    /// A quoted string with no closing quote.
    #[error("unterminated string")]
    UnterminatedString,

    /// A `{` block that reaches the end of input.
    #[error("unclosed block: {context}")]
    UnclosedBlock {
        /// What the block belongs to (a selector or at-rule name).
        context: String,
    },

    /// A `}` with no block to close.
    #[error("unexpected '}}'")]
    UnexpectedCloseBrace,

    /// A selector or at-rule prelude that is not followed by a block.
    #[error("expected '{{' after `{prelude}`")]
    MissingBlock {
        /// The prelude text.
        prelude: String,
    },

    /// A token that cannot appear where it was found.
    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
    },
}
