//! Recursive parser for CSS rule lists.

use crate::ast::*;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Lexer, Token, TokenKind};
use smol_str::SmolStr;
use text_size::TextSize;
use text_span::Span;

/// The block a rule list is nested in, for error reporting.
struct Owner {
    context: String,
    open: Span,
}

/// The CSS parser.
pub struct Parser<'src> {
    /// The source being parsed.
    source: &'src str,
    /// The token stream, always terminated by `Eof`.
    tokens: Vec<Token>,
    /// Current position in the token stream.
    pos: usize,
    /// EOF token for when we're past the end.
    eof_token: Token,
}

impl<'src> Parser<'src> {
    /// Creates a new parser.
    pub fn new(source: &'src str) -> Self {
        let tokens: Vec<Token> = Lexer::new(source).collect();
        let eof_token = Token {
            kind: TokenKind::Eof,
            span: Span::empty(TextSize::from(source.len() as u32)),
        };
        Self {
            source,
            tokens,
            pos: 0,
            eof_token,
        }
    }

    /// Parses the source into a stylesheet.
    pub fn parse(mut self) -> Result<Stylesheet, ParseError> {
        self.check_lex_errors()?;

        let (nodes, end) = self.parse_nodes(TextSize::from(0), None)?;
        Ok(Stylesheet {
            nodes,
            trailing: Span::new(end, TextSize::from(self.source.len() as u32)),
        })
    }

    // === Token helpers ===

    fn current(&self) -> Token {
        *self.tokens.get(self.pos).unwrap_or(&self.eof_token)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn text(&self, span: Span) -> &'src str {
        span.slice(self.source)
    }

    /// Reports the first token the lexer could not make sense of.
    fn check_lex_errors(&self) -> Result<(), ParseError> {
        let Some(token) = self.tokens.iter().find(|t| t.kind == TokenKind::Error) else {
            return Ok(());
        };

        let text = self.text(token.span);
        let kind = if text.starts_with("/*") {
            ParseErrorKind::UnterminatedComment
        } else if text.starts_with('"') || text.starts_with('\'') {
            ParseErrorKind::UnterminatedString
        } else {
            ParseErrorKind::UnexpectedToken {
                expected: "a CSS token".to_string(),
                found: format!("{:?}", text),
            }
        };
        Err(ParseError::new(kind, token.span))
    }

    // === Rule lists ===

    /// Parses nodes until end of input (top level) or the owner's `}`.
    ///
    /// Returns the nodes and the offset where the last node ended.
    fn parse_nodes(
        &mut self,
        start: TextSize,
        owner: Option<&Owner>,
    ) -> Result<(Vec<Node>, TextSize), ParseError> {
        let mut nodes = Vec::new();
        let mut leading_start = start;

        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Eof => {
                    if let Some(owner) = owner {
                        return Err(ParseError::new(
                            ParseErrorKind::UnclosedBlock {
                                context: owner.context.clone(),
                            },
                            owner.open,
                        ));
                    }
                    break;
                }
                TokenKind::RBrace => {
                    if owner.is_some() {
                        break;
                    }
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedCloseBrace,
                        token.span,
                    ));
                }
                TokenKind::Comment => {
                    self.advance();
                    nodes.push(Node::Comment(Comment {
                        span: Span::new(leading_start, token.span.end),
                    }));
                    leading_start = token.span.end;
                }
                // Stray semicolons become part of the next node's leading text.
                TokenKind::Semicolon => self.advance(),
                TokenKind::AtKeyword => {
                    let at_rule = self.parse_at_rule(leading_start)?;
                    leading_start = at_rule.span.end;
                    nodes.push(Node::AtRule(at_rule));
                }
                _ => {
                    let rule = self.parse_style_rule(leading_start)?;
                    leading_start = rule.span.end;
                    nodes.push(Node::Rule(rule));
                }
            }
        }

        let end = nodes.last().map_or(start, |node| node.span().end);
        Ok((nodes, end))
    }

    fn parse_style_rule(&mut self, leading_start: TextSize) -> Result<StyleRule, ParseError> {
        let prelude_start = self.current().span.start;
        let mut prelude_end = prelude_start;
        let mut depth = 0u32;

        loop {
            let token = self.current();
            match token.kind {
                TokenKind::LBrace => break,
                TokenKind::Eof | TokenKind::RBrace => {
                    let prelude = Span::new(prelude_start, prelude_end);
                    return Err(ParseError::new(
                        ParseErrorKind::MissingBlock {
                            prelude: self.text(prelude).to_string(),
                        },
                        prelude,
                    ));
                }
                TokenKind::Semicolon if depth == 0 => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedToken {
                            expected: "'{'".to_string(),
                            found: token.kind.name().to_string(),
                        },
                        token.span,
                    ));
                }
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            prelude_end = token.span.end;
            self.advance();
        }

        let prelude = Span::new(prelude_start, prelude_end);
        let block = self.parse_block(self.text(prelude))?;

        Ok(StyleRule {
            span: Span::new(leading_start, block.span.end),
            leading: Span::new(leading_start, prelude_start),
            prelude,
            block,
        })
    }

    fn parse_at_rule(&mut self, leading_start: TextSize) -> Result<AtRule, ParseError> {
        let at = self.current();
        self.advance();

        let name = SmolStr::new(self.text(at.span)[1..].to_ascii_lowercase());
        let prelude_start = self.current().span.start;
        let mut prelude_end = prelude_start;
        let mut depth = 0u32;

        loop {
            let token = self.current();
            match token.kind {
                TokenKind::LBrace => break,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return Ok(AtRule {
                        span: Span::new(leading_start, token.span.end),
                        leading: Span::new(leading_start, at.span.start),
                        name,
                        prelude: Span::new(prelude_start, prelude_end),
                        body: AtRuleBody::Statement,
                    });
                }
                // A statement missing its semicolon at the end of a list.
                TokenKind::RBrace | TokenKind::Eof => {
                    let end = std::cmp::max(at.span.end, prelude_end);
                    return Ok(AtRule {
                        span: Span::new(leading_start, end),
                        leading: Span::new(leading_start, at.span.start),
                        name,
                        prelude: Span::new(prelude_start, std::cmp::max(prelude_start, prelude_end)),
                        body: AtRuleBody::Statement,
                    });
                }
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            prelude_end = token.span.end;
            self.advance();
        }

        let prelude = Span::new(prelude_start, prelude_end);
        let context = format!("@{} {}", name, self.text(prelude))
            .trim_end()
            .to_string();

        let body = if is_grouping_at_rule(&name) || is_keyframes_at_rule(&name) {
            let open = self.current();
            self.advance();

            let owner = Owner {
                context,
                open: open.span,
            };
            let (nodes, last_end) = self.parse_nodes(open.span.end, Some(&owner))?;

            // parse_nodes only returns inside a block when it reached `}`.
            let close = self.current();
            self.advance();

            let list = RuleList {
                header: Span::new(at.span.start, open.span.end),
                nodes,
                close: Span::new(std::cmp::max(last_end, open.span.end), close.span.end),
            };
            if is_keyframes_at_rule(&name) {
                AtRuleBody::Keyframes(list)
            } else {
                AtRuleBody::Rules(list)
            }
        } else {
            AtRuleBody::Declarations(self.parse_block(&context)?)
        };

        let end = match &body {
            AtRuleBody::Rules(list) | AtRuleBody::Keyframes(list) => list.close.end,
            AtRuleBody::Declarations(block) => block.span.end,
            AtRuleBody::Statement => prelude.end,
        };

        Ok(AtRule {
            span: Span::new(leading_start, end),
            leading: Span::new(leading_start, at.span.start),
            name,
            prelude,
            body,
        })
    }

    // === Declaration blocks ===

    /// Parses a `{ ... }` declaration block. The current token must be `{`.
    fn parse_block(&mut self, context: &str) -> Result<Block, ParseError> {
        let open = self.current();
        self.advance();

        let mut declarations = Vec::new();
        let mut decl_start: Option<usize> = None;
        let mut colon: Option<usize> = None;
        let mut depth = 0u32;

        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Eof => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnclosedBlock {
                            context: context.to_string(),
                        },
                        open.span,
                    ));
                }
                TokenKind::RBrace => {
                    self.push_declaration(decl_start, colon, self.pos, &mut declarations);
                    self.advance();
                    return Ok(Block {
                        span: Span::new(open.span.start, token.span.end),
                        declarations,
                    });
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.push_declaration(decl_start, colon, self.pos, &mut declarations);
                    decl_start = None;
                    colon = None;
                    self.advance();
                    continue;
                }
                // A nested rule (`&:hover { ... }`) or nested at-rule.
                TokenKind::LBrace => {
                    self.skip_nested_block(context)?;
                    decl_start = None;
                    colon = None;
                    continue;
                }
                TokenKind::Comment => {
                    self.advance();
                    continue;
                }
                TokenKind::Colon if depth == 0 && colon.is_none() => colon = Some(self.pos),
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                _ => {}
            }

            if decl_start.is_none() {
                decl_start = Some(self.pos);
            }
            self.advance();
        }
    }

    /// Records the declaration spanning tokens `start..end`, if it has a property.
    fn push_declaration(
        &self,
        start: Option<usize>,
        colon: Option<usize>,
        end: usize,
        declarations: &mut Vec<Declaration>,
    ) {
        let (Some(start), Some(colon)) = (start, colon) else {
            return;
        };
        if start >= colon {
            return;
        }

        let property_span = Span::new(self.tokens[start].span.start, self.tokens[colon].span.start);
        let property = self.text(property_span).trim();
        if property.is_empty() {
            return;
        }

        let value_start = self.tokens[colon].span.end;
        let value_end = if end > colon + 1 {
            self.tokens[end - 1].span.end
        } else {
            value_start
        };

        declarations.push(Declaration {
            property: SmolStr::new(property.to_ascii_lowercase()),
            value: Span::new(value_start, value_end),
        });
    }

    /// Skips a balanced `{ ... }` group. The current token must be `{`.
    fn skip_nested_block(&mut self, context: &str) -> Result<(), ParseError> {
        let open = self.current();
        let mut depth = 0u32;

        loop {
            let token = self.current();
            match token.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                }
                TokenKind::Eof => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnclosedBlock {
                            context: context.to_string(),
                        },
                        open.span,
                    ));
                }
                _ => {}
            }
            self.advance();
        }
    }
}
