//! CSS lexer using logos.
//!
//! The lexer only distinguishes the tokens that carry structure: braces,
//! parentheses, brackets, semicolons, colons, at-keywords, strings, comments
//! and escapes. Everything else is lexed as opaque runs of text, which is all
//! the parser needs to find rule boundaries.

use logos::Logos;
use text_size::TextSize;
use text_span::Span;

/// A token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The span of the token in the source.
    pub span: Span,
}

/// Token kinds for CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Logos, Default)]
#[logos(skip r"[ \t\r\n\x0C]+")]
pub enum TokenKind {
    /// `/* ... */`
    #[token("/*", block_comment)]
    Comment,

    /// `"..."` or `'...'`
    #[token("\"", |lex| quoted_string(lex, '"'))]
    #[token("'", |lex| quoted_string(lex, '\''))]
    String,

    /// `{`
    #[token("{")]
    LBrace,

    /// `}`
    #[token("}")]
    RBrace,

    /// `(`
    #[token("(")]
    LParen,

    /// `)`
    #[token(")")]
    RParen,

    /// `[`
    #[token("[")]
    LBracket,

    /// `]`
    #[token("]")]
    RBracket,

    /// `;`
    #[token(";")]
    Semicolon,

    /// `:`
    #[token(":")]
    Colon,

    /// An at-keyword such as `@media` or `@-webkit-keyframes`.
    #[regex(r"@-*[A-Za-z_][A-Za-z0-9_-]*")]
    AtKeyword,

    /// A backslash escape. Only the escaped character is consumed; the
    /// remaining hex digits of a code point escape lex as text.
    #[regex(r"\\[^\r\n]")]
    Escape,

    /// A lone `/` or `@`.
    #[regex(r"[/@]")]
    Delim,

    /// Any other run of characters (identifiers, numbers, combinators, ...).
    #[regex(r#"[^ \t\r\n\x0C"'{}()\[\];:\\/@]+"#)]
    Text,

    /// End of input.
    Eof,

    /// Invalid input, including unterminated strings and comments.
    #[default]
    Error,
}

impl TokenKind {
    /// Returns a human-readable name for this token kind.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Comment => "comment",
            TokenKind::String => "string",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::AtKeyword => "at-keyword",
            TokenKind::Escape => "escape",
            TokenKind::Delim => "delimiter",
            TokenKind::Text => "text",
            TokenKind::Eof => "end of file",
            TokenKind::Error => "invalid token",
        }
    }
}

/// Consumes the body of a comment after its opening `/*`.
fn block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

/// Consumes the body of a quoted string after its opening quote.
fn quoted_string(lex: &mut logos::Lexer<TokenKind>, quote: char) -> bool {
    let rest = lex.remainder();
    let mut chars = rest.char_indices();

    while let Some((offset, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            lex.bump(offset + c.len_utf8());
            return true;
        }
    }

    lex.bump(rest.len());
    false
}

/// A lexer for CSS source text.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
    source: &'src str,
    finished: bool,
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source.
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            source,
            finished: false,
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.inner.next() {
            Some(result) => Some(Token {
                kind: result.unwrap_or(TokenKind::Error),
                span: self.inner.span().into(),
            }),
            None => {
                self.finished = true;
                let end = TextSize::from(self.source.len() as u32);
                Some(Token {
                    kind: TokenKind::Eof,
                    span: Span::empty(end),
                })
            }
        }
    }
}
