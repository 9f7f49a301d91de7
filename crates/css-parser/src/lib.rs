//! CSS parser for css-purge.
//!
//! The parser keeps the byte span of every node it produces so that a purged
//! stylesheet can be rebuilt from slices of the original text: anything that
//! survives purging is emitted exactly as it was written.
//!
//! - Lexer (tokenizer) using `logos`
//! - Recursive parser for rules, at-rules and declaration blocks
//! - Strict errors for unbalanced braces and unterminated strings or comments
//!
//! # Example
//!
//! ```
//! use css_parser::{parse, Node};
//!
//! let source = ".used { color: red } .unused { color: blue }";
//! let sheet = parse(source).unwrap();
//!
//! assert_eq!(sheet.nodes.len(), 2);
//! if let Node::Rule(rule) = &sheet.nodes[0] {
//!     assert_eq!(rule.prelude.slice(source), ".used");
//! }
//! ```

mod ast;
mod error;
mod lexer;
mod parser;

pub use ast::*;
pub use error::{ParseError, ParseErrorKind};
pub use lexer::{Lexer, Token, TokenKind};
pub use text_span::Span;

/// Parses CSS source text into a stylesheet tree.
pub fn parse(source: &str) -> Result<Stylesheet, ParseError> {
    parser::Parser::new(source).parse()
}
