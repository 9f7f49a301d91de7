//! HTML markup scanning using logos.
//!
//! Only tag boundaries matter for purging: the scanner yields start and end
//! tags with their spans and attributes, steps over comments and text, and
//! treats the contents of `<script>` and `<style>` as raw text.

use logos::Logos;
use smol_str::SmolStr;
use text_span::Span;
use thiserror::Error;

/// Elements whose contents are raw text rather than markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Token kinds between tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Logos)]
enum MarkupToken {
    /// `<!-- ... -->`, or everything after an unclosed `<!--`.
    #[token("<!--", comment)]
    Comment,

    /// `</name`
    #[regex(r"</[A-Za-z][A-Za-z0-9:_-]*")]
    EndTagOpen,

    /// `<name`
    #[regex(r"<[A-Za-z][A-Za-z0-9:_-]*")]
    StartTagOpen,

    /// A `<` that opens no tag (`<!DOCTYPE`, `a < b`).
    #[token("<")]
    Lt,

    #[regex(r"[^<]+")]
    Text,
}

fn comment(lex: &mut logos::Lexer<MarkupToken>) {
    let len = lex
        .remainder()
        .find("-->")
        .map_or(lex.remainder().len(), |end| end + 3);
    lex.bump(len);
}

/// Token kinds inside a tag, after its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Logos)]
#[logos(skip r"[ \t\r\n\x0C]+")]
enum AttributeToken {
    #[token(">")]
    End,

    #[token("/>")]
    SelfClose,

    #[token("=")]
    Eq,

    #[regex(r#""[^"]*""#)]
    #[regex(r"'[^']*'")]
    Quoted,

    /// An attribute name or an unquoted value.
    #[regex(r#"[^ \t\r\n\x0C"'=>]+"#)]
    Word,
}

/// Markup whose raw-text elements cannot be delimited.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    /// A `<script>` or `<style>` start tag without its closing `>`.
    #[error("unterminated <{name}> start tag")]
    UnterminatedTag { name: SmolStr, span: Span },

    /// A `<script>` or `<style>` element without a complete end tag.
    #[error("<{name}> has no closing </{name}>")]
    MissingClose { name: SmolStr, span: Span },
}

impl MarkupError {
    /// The start tag the error refers to.
    pub fn span(&self) -> Span {
        match self {
            MarkupError::UnterminatedTag { span, .. } | MarkupError::MissingClose { span, .. } => {
                *span
            }
        }
    }
}

/// A start or end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag<'a> {
    /// The tag name as written.
    pub name: &'a str,
    /// From `<` through `>`.
    pub span: Span,
    /// For `<script>` and `<style>`, the raw text up to the end tag.
    pub content: Option<Span>,
    attributes: Vec<(&'a str, Option<&'a str>)>,
}

impl<'a> Tag<'a> {
    /// Returns true if this tag has the given name, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns an attribute's value (`Some("")` for a valueless attribute).
    /// Names are compared ASCII case-insensitively.
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.unwrap_or(""))
    }
}

/// One tag found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent<'a> {
    /// A start tag. Raw-text elements yield only this event: their end tag
    /// is consumed along with their content.
    Start(Tag<'a>),
    /// An end tag.
    End(Tag<'a>),
}

/// Iterates over the tags of an HTML document.
///
/// Malformed ordinary tags are tolerated. A malformed `<script>` or `<style>`
/// element yields one error and ends the scan.
pub struct MarkupScanner<'a> {
    lexer: logos::Lexer<'a, MarkupToken>,
    source: &'a str,
    finished: bool,
}

impl<'a> MarkupScanner<'a> {
    /// Creates a scanner over `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: MarkupToken::lexer(source),
            source,
            finished: false,
        }
    }

    /// Lexes the rest of a tag whose `<name` ends at the lexer position.
    ///
    /// Returns the attributes and the tag end, or `None` if the input ended
    /// or a quote was left open first.
    fn finish_tag(&mut self, strict: bool) -> Option<(Vec<(&'a str, Option<&'a str>)>, usize)> {
        let rest = self.lexer.remainder();
        let offset = self.lexer.span().end;
        let mut lexer = AttributeToken::lexer(rest);
        let mut attributes: Vec<(&'a str, Option<&'a str>)> = Vec::new();
        let mut expect_value = false;

        loop {
            match lexer.next() {
                None => {
                    self.lexer.bump(rest.len());
                    return None;
                }
                Some(Err(())) if strict => {
                    self.lexer.bump(rest.len());
                    return None;
                }
                Some(Err(())) => expect_value = false,
                Some(Ok(AttributeToken::End | AttributeToken::SelfClose)) => {
                    let end = lexer.span().end;
                    self.lexer.bump(end);
                    return Some((attributes, offset + end));
                }
                Some(Ok(AttributeToken::Eq)) => expect_value = !attributes.is_empty(),
                Some(Ok(token)) => {
                    let text = lexer.slice();
                    let value = match token {
                        AttributeToken::Quoted => &text[1..text.len() - 1],
                        _ => text,
                    };
                    match attributes.last_mut() {
                        Some(last) if expect_value => last.1 = Some(value),
                        _ if token == AttributeToken::Word => attributes.push((value, None)),
                        _ => {}
                    }
                    expect_value = false;
                }
            }
        }
    }

    /// Consumes a raw-text element's content and end tag.
    fn raw_text(&mut self, name: &'a str, start_tag: Span) -> Result<Span, MarkupError> {
        let missing = || MarkupError::MissingClose {
            name: SmolStr::new(name.to_ascii_lowercase()),
            span: start_tag,
        };
        let content_start = self.lexer.span().end;
        let close = raw_text_end(self.lexer.remainder(), name).ok_or_else(missing)?;
        self.lexer.bump(close);
        let content = Span::from_usize(content_start, content_start + close);

        match self.lexer.next() {
            Some(Ok(MarkupToken::EndTagOpen)) => {}
            _ => return Err(missing()),
        }
        self.finish_tag(true).ok_or_else(missing)?;
        Ok(content)
    }

    fn start_tag(&mut self) -> Result<Tag<'a>, MarkupError> {
        let source = self.source;
        let start = self.lexer.span().start;
        let name = &source[start + 1..self.lexer.span().end];
        let raw = RAW_TEXT_ELEMENTS
            .iter()
            .any(|element| name.eq_ignore_ascii_case(element));

        let Some((attributes, end)) = self.finish_tag(raw) else {
            return if raw {
                Err(MarkupError::UnterminatedTag {
                    name: SmolStr::new(name.to_ascii_lowercase()),
                    span: Span::from_usize(start, self.source.len()),
                })
            } else {
                Ok(Tag {
                    name,
                    span: Span::from_usize(start, self.source.len()),
                    content: None,
                    attributes: Vec::new(),
                })
            };
        };
        let span = Span::from_usize(start, end);
        let content = if raw {
            Some(self.raw_text(name, span)?)
        } else {
            None
        };

        Ok(Tag {
            name,
            span,
            content,
            attributes,
        })
    }

    fn end_tag(&mut self) -> Tag<'a> {
        let source = self.source;
        let start = self.lexer.span().start;
        let name = &source[start + 2..self.lexer.span().end];
        let end = self
            .finish_tag(false)
            .map_or(self.source.len(), |(_, end)| end);
        Tag {
            name,
            span: Span::from_usize(start, end),
            content: None,
            attributes: Vec::new(),
        }
    }
}

impl<'a> Iterator for MarkupScanner<'a> {
    type Item = Result<MarkupEvent<'a>, MarkupError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.lexer.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Ok(MarkupToken::StartTagOpen)) => {
                    let tag = self.start_tag();
                    self.finished = tag.is_err();
                    return Some(tag.map(MarkupEvent::Start));
                }
                Some(Ok(MarkupToken::EndTagOpen)) => {
                    return Some(Ok(MarkupEvent::End(self.end_tag())));
                }
                Some(_) => {}
            }
        }
    }
}

/// Finds the `</name` that ends a raw-text element.
fn raw_text_end(text: &str, name: &str) -> Option<usize> {
    text.match_indices("</").map(|(idx, _)| idx).find(|&idx| {
        let after = &text[idx + 2..];
        after
            .get(..name.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
            && after[name.len()..]
                .starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
    })
}

/// Returns the text from the first `<body>` start tag through the last
/// `</body>` end tag, ignoring comments and raw text.
pub(crate) fn body_region(content: &str) -> Option<&str> {
    let mut start = None;
    let mut end = None;

    for event in MarkupScanner::new(content) {
        match event {
            Ok(MarkupEvent::Start(tag)) if start.is_none() && tag.is("body") => {
                start = Some(tag.span.start)
            }
            Ok(MarkupEvent::End(tag)) if start.is_some() && tag.is("body") => {
                end = Some(tag.span.end)
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    Some(Span::new(start?, end?).slice(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tags(source: &str) -> Vec<String> {
        MarkupScanner::new(source)
            .map(|event| match event.unwrap() {
                MarkupEvent::Start(tag) => format!("<{}>", tag.name),
                MarkupEvent::End(tag) => format!("</{}>", tag.name),
            })
            .collect()
    }

    #[test]
    fn test_tags_and_spans() {
        let source = "<!DOCTYPE html><p class=\"a b\">x < y</p >";
        assert_eq!(tags(source), vec!["<p>", "</p>"]);

        let events: Vec<_> = MarkupScanner::new(source).map(Result::unwrap).collect();
        let MarkupEvent::Start(p) = &events[0] else {
            panic!("expected a start tag");
        };
        assert_eq!(p.span.slice(source), "<p class=\"a b\">");
        assert_eq!(p.attribute("CLASS"), Some("a b"));
        let MarkupEvent::End(end) = &events[1] else {
            panic!("expected an end tag");
        };
        assert_eq!(end.span.slice(source), "</p >");
    }

    #[test]
    fn test_attribute_forms() {
        let source = "<input disabled type=text data-x='1' data-href=/a.css value = \"v\"/>";
        let Some(Ok(MarkupEvent::Start(tag))) = MarkupScanner::new(source).next() else {
            panic!("expected a start tag");
        };
        assert_eq!(tag.attribute("disabled"), Some(""));
        assert_eq!(tag.attribute("type"), Some("text"));
        assert_eq!(tag.attribute("data-x"), Some("1"));
        assert_eq!(tag.attribute("data-href"), Some("/a.css"));
        assert_eq!(tag.attribute("value"), Some("v"));
        assert_eq!(tag.attribute("missing"), None);
    }

    #[test]
    fn test_comments_and_raw_text_hide_tags() {
        let source = concat!(
            "<!-- <b> -->",
            "<script>if (a </b) document.write('<i>')</script>",
            "<STYLE media=print>.x > p{}</STYLE>",
            "<stylesheet-viewer></stylesheet-viewer>",
        );
        assert_eq!(
            tags(source),
            vec!["<script>", "<STYLE>", "<stylesheet-viewer>", "</stylesheet-viewer>"]
        );

        let styles: Vec<_> = MarkupScanner::new(source)
            .filter_map(|event| match event.unwrap() {
                MarkupEvent::Start(tag) if tag.is("style") => tag.content,
                _ => None,
            })
            .collect();
        assert_eq!(styles.len(), 1);
        assert_eq!(styles[0].slice(source), ".x > p{}");
    }

    #[test]
    fn test_unclosed_comment_hides_rest() {
        assert_eq!(tags("<a></a><!-- <b></b>"), vec!["<a>", "</a>"]);
    }

    #[test]
    fn test_malformed_raw_text_elements() {
        let source = "<p>\n<style data-href=\"/a.css";
        let errors: Vec<_> = MarkupScanner::new(source).filter_map(Result::err).collect();
        assert_eq!(
            errors,
            vec![MarkupError::UnterminatedTag {
                name: "style".into(),
                span: Span::from_usize(4, source.len()),
            }]
        );

        let err = MarkupScanner::new("<style>.a{}</style")
            .find_map(Result::err)
            .unwrap();
        assert_eq!(err.to_string(), "<style> has no closing </style>");
        assert_eq!(err.span(), Span::from_usize(0, 7));
    }

    #[test]
    fn test_malformed_ordinary_tags_are_tolerated() {
        assert_eq!(tags("<div class=x"), vec!["<div>"]);
        assert_eq!(tags("<a href=x></a><img src=y"), vec!["<a>", "</a>", "<img>"]);
    }

    #[test]
    fn test_body_region() {
        let html = "<head><script>'</body>'</script></head><BODY class=x>hi</BODY></html>";
        assert_eq!(body_region(html), Some("<BODY class=x>hi</BODY>"));
        assert_eq!(body_region("<bodyguard>no</bodyguard>"), None);
        assert_eq!(body_region("</body><body>"), None);
    }
}
