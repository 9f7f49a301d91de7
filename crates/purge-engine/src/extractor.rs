//! Selector token extraction.
//!
//! Extraction is deliberately permissive: any run of identifier-like
//! characters counts as evidence that a selector is used. Over-reporting only
//! leaves some unused CSS behind; under-reporting would delete CSS that is
//! still needed.

use crate::markup::body_region;
use camino::Utf8Path;
use logos::Logos;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The set of selector tokens found in content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    tokens: FxHashSet<SmolStr>,
}

impl TokenSet {
    /// Creates an empty token set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token.
    pub fn insert(&mut self, token: &str) {
        if !self.tokens.contains(token) {
            self.tokens.insert(SmolStr::new(token));
        }
    }

    /// Merges another set into this one.
    pub fn merge(&mut self, other: TokenSet) {
        if self.tokens.is_empty() {
            self.tokens = other.tokens;
        } else {
            self.tokens.extend(other.tokens);
        }
    }

    /// Returns true if the exact token is present.
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Returns true if any token satisfies `predicate`.
    pub fn any(&self, predicate: impl Fn(&str) -> bool) -> bool {
        self.tokens.iter().any(|token| predicate(token))
    }

    /// Returns the number of distinct tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if no tokens were found.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for TokenSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}

/// Identifier-like runs: letters, digits, `-`, `_`, `:` and `/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Logos)]
#[logos(skip r"[^A-Za-z0-9_:/\-]+")]
enum Word {
    #[regex(r"[A-Za-z0-9_:/\-]+")]
    Word,
}

/// Why a content unit yielded no tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// An HTML document without a `<body> ... </body>` region.
    #[error("no <body> ... </body> region found")]
    MissingBody,
}

/// How to pull selector tokens out of a file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extractor {
    /// Only the `<body>` element of an HTML document. Styles inlined in the
    /// head are ignored so that not-yet-purged selectors do not count as used.
    HtmlBody,
    /// The whole text (scripts, templates, CSS reference text).
    Whole,
}

impl Extractor {
    /// Extracts the selector tokens from `content`.
    pub fn extract(self, content: &str) -> Result<TokenSet, ExtractError> {
        let region = match self {
            Extractor::HtmlBody => body_region(content).ok_or(ExtractError::MissingBody)?,
            Extractor::Whole => content,
        };
        Ok(extract_words(region))
    }
}

impl FromStr for Extractor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html-body" => Ok(Extractor::HtmlBody),
            "whole" => Ok(Extractor::Whole),
            other => Err(format!(
                "unknown extractor `{}` (expected `html-body` or `whole`)",
                other
            )),
        }
    }
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extractor::HtmlBody => f.write_str("html-body"),
            Extractor::Whole => f.write_str("whole"),
        }
    }
}

/// Extracts every identifier-like word from `text`.
///
/// Words containing `:` or `/` (`md:flex`, `w-1/2`, `color:red`) also
/// contribute their pieces, so a variant prefix never hides the plain name.
pub fn extract_words(text: &str) -> TokenSet {
    let mut tokens = TokenSet::new();
    let mut lexer = Word::lexer(text);

    while let Some(result) = lexer.next() {
        if result.is_err() {
            continue;
        }
        let word = lexer.slice();
        tokens.insert(word);
        if word.contains([':', '/']) {
            for piece in word.split([':', '/']).filter(|p| !p.is_empty()) {
                tokens.insert(piece);
            }
        }
    }

    tokens
}

/// Maps file extensions to extractors.
#[derive(Debug, Clone)]
pub struct ExtractorTable {
    by_extension: FxHashMap<SmolStr, Extractor>,
    fallback: Extractor,
}

impl Default for ExtractorTable {
    fn default() -> Self {
        let mut by_extension = FxHashMap::default();
        for ext in ["html", "htm"] {
            by_extension.insert(SmolStr::new(ext), Extractor::HtmlBody);
        }
        for ext in ["js", "jsx", "ts", "tsx", "mjs", "cjs", "css"] {
            by_extension.insert(SmolStr::new(ext), Extractor::Whole);
        }
        Self {
            by_extension,
            fallback: Extractor::Whole,
        }
    }
}

impl ExtractorTable {
    /// Adds or replaces the extractor for an extension (without the dot).
    pub fn set(&mut self, extension: &str, extractor: Extractor) {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension.insert(SmolStr::new(extension), extractor);
    }

    /// Returns the extractor for an extension (without the dot).
    pub fn for_extension(&self, extension: &str) -> Extractor {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension
            .get(extension.as_str())
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Returns the extractor for a file path.
    pub fn for_path(&self, path: &Utf8Path) -> Extractor {
        path.extension()
            .map_or(self.fallback, |ext| self.for_extension(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_words() {
        let tokens = extract_words(r#"<div class="btn btn-primary_x">Hi</div>"#);
        for token in ["div", "class", "btn", "btn-primary_x", "Hi"] {
            assert!(tokens.contains(token), "missing {}", token);
        }
        assert!(!tokens.contains("btn-primary"));
    }

    #[test]
    fn test_colon_and_slash_words_are_split() {
        let tokens = extract_words("md:flex w-1/2 color:red");
        for token in ["md:flex", "md", "flex", "w-1/2", "w-1", "2", "color:red", "red"] {
            assert!(tokens.contains(token), "missing {}", token);
        }
    }

    #[test]
    fn test_html_body_ignores_head() {
        let html = r#"<html><head><style>.head-only{}</style></head><body class="page"><p class="used">x</p></body></html>"#;
        let tokens = Extractor::HtmlBody.extract(html).unwrap();
        assert!(tokens.contains("used"));
        assert!(tokens.contains("page"));
        assert!(tokens.contains("body"));
        assert!(!tokens.contains("head-only"));
        assert!(!tokens.contains("head"));
    }

    #[test]
    fn test_html_body_is_case_insensitive() {
        let tokens = Extractor::HtmlBody
            .extract("<HTML><BODY><b class=x></b></BODY></HTML>")
            .unwrap();
        assert!(tokens.contains("x"));
    }

    #[test]
    fn test_html_body_skips_lookalike_tags() {
        let html = "<bodyguard>no</bodyguard><body>yes</body>";
        let tokens = Extractor::HtmlBody.extract(html).unwrap();
        assert!(tokens.contains("yes"));
        assert!(!tokens.contains("no"));
    }

    #[test]
    fn test_html_body_ignores_markup_in_scripts_and_comments() {
        let html = "<head><script>document.write('<body class=fake>')</script></head><!-- <body> --><body><p class=real></p></body>";
        let tokens = Extractor::HtmlBody.extract(html).unwrap();
        assert!(tokens.contains("real"));
        assert!(!tokens.contains("fake"));
    }

    #[test]
    fn test_missing_body() {
        assert_eq!(
            Extractor::HtmlBody.extract("<p>fragment</p>"),
            Err(ExtractError::MissingBody)
        );
        assert_eq!(
            Extractor::HtmlBody.extract("</body><body>"),
            Err(ExtractError::MissingBody)
        );
    }

    #[test]
    fn test_whole_extractor() {
        let tokens = Extractor::Whole
            .extract("export const cls = 'mdc-button--raised';")
            .unwrap();
        assert!(tokens.contains("mdc-button--raised"));
    }

    #[test]
    fn test_extractor_table() {
        let mut table = ExtractorTable::default();
        assert_eq!(table.for_path(Utf8Path::new("a/index.html")), Extractor::HtmlBody);
        assert_eq!(table.for_path(Utf8Path::new("a/INDEX.HTM")), Extractor::HtmlBody);
        assert_eq!(table.for_path(Utf8Path::new("lib/button.tsx")), Extractor::Whole);
        assert_eq!(table.for_path(Utf8Path::new("README")), Extractor::Whole);

        table.set(".md", Extractor::HtmlBody);
        assert_eq!(table.for_extension("md"), Extractor::HtmlBody);
    }

    #[test]
    fn test_extractor_from_str() {
        assert_eq!("html-body".parse::<Extractor>(), Ok(Extractor::HtmlBody));
        assert_eq!("whole".parse::<Extractor>(), Ok(Extractor::Whole));
        assert!("regex".parse::<Extractor>().is_err());
        assert_eq!(Extractor::HtmlBody.to_string(), "html-body");
    }
}
