//! Purge errors.

use camino::Utf8PathBuf;
use css_parser::ParseError;
use text_span::{LineCol, LineIndex};
use thiserror::Error;

/// An error that stops a purge unit.
#[derive(Debug, Error)]
pub enum PurgeError {
    /// A content or stylesheet file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A stylesheet could not be parsed.
    #[error("{origin}:{}:{}: {error}", .location.line + 1, .location.col + 1)]
    Parse {
        /// The file path, or a description of raw input.
        origin: String,
        /// Where in the stylesheet the error starts.
        location: LineCol,
        /// The parse error.
        #[source]
        error: ParseError,
    },
}

impl PurgeError {
    /// Wraps a parse error with its origin and line/column.
    pub fn parse(origin: impl Into<String>, source: &str, error: ParseError) -> Self {
        let location = LineIndex::new(source)
            .line_col(error.span.start)
            .unwrap_or_default();
        PurgeError::Parse {
            origin: origin.into(),
            location,
            error,
        }
    }
}
