//! Selector analysis: what a selector needs to find in content to be kept.

use smol_str::SmolStr;

/// One identifier a selector depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// `.name`
    Class(SmolStr),
    /// `#name`
    Id(SmolStr),
    /// `name`
    Tag(SmolStr),
    /// `[name]`, `[name=value]`, `[name^=value]`, ...
    Attribute {
        /// The attribute name.
        name: SmolStr,
        /// The operator and value, if any.
        matcher: Option<(AttributeOp, SmolStr)>,
    },
}

/// Attribute selector operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOp {
    /// `=`
    Equals,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    /// `^=`
    Prefix,
    /// `$=`
    Suffix,
    /// `*=`
    Substring,
}

/// A single complex selector from a selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector<'a> {
    /// The selector text, trimmed.
    pub text: &'a str,
    /// Everything the selector needs.
    pub requirements: Vec<Requirement>,
}

/// Splits a selector list on top-level commas and analyses each selector.
pub fn parse_selector_list(prelude: &str) -> Vec<Selector<'_>> {
    split_top_level(prelude)
        .into_iter()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| Selector {
            text,
            requirements: requirements(text),
        })
        .collect()
}

/// Splits on commas outside parentheses, brackets, strings and comments.
fn split_top_level(list: &str) -> Vec<&str> {
    let bytes = list.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0u32;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    parts.push(&list[start..]);
    parts
}

/// Returns the index of the closing quote of the string opening at `open`.
fn skip_string(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            c if c == quote => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Returns the index of the `/` closing the comment opening at `open`.
fn skip_comment(bytes: &[u8], open: usize) -> usize {
    let mut i = open + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Collects the requirements of one complex selector.
fn requirements(selector: &str) -> Vec<Requirement> {
    let mut scanner = Scanner::new(selector);
    let mut found = Vec::new();

    while let Some(c) = scanner.peek() {
        match c {
            '.' => {
                scanner.bump();
                let name = scanner.ident();
                if !name.is_empty() {
                    found.push(Requirement::Class(name.into()));
                }
            }
            '#' => {
                scanner.bump();
                let name = scanner.ident();
                if !name.is_empty() {
                    found.push(Requirement::Id(name.into()));
                }
            }
            '[' => {
                scanner.bump();
                if let Some(requirement) = scanner.attribute() {
                    found.push(requirement);
                }
            }
            // Pseudo-classes and pseudo-elements, with any arguments, never
            // require anything.
            ':' => {
                while scanner.peek() == Some(':') {
                    scanner.bump();
                }
                scanner.ident();
                if scanner.peek() == Some('(') {
                    scanner.skip_balanced();
                }
            }
            '/' if scanner.peek_second() == Some('*') => scanner.skip_comment(),
            c if is_ident_start(c) => {
                let name = scanner.ident();
                if !name.is_empty() {
                    found.push(Requirement::Tag(name.into()));
                }
            }
            _ => {
                scanner.bump();
            }
        }
    }

    found
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

/// A character cursor over a selector.
struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.rest.chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.rest = &self.rest[c.len_utf8()..];
        Some(c)
    }

    /// Reads an identifier, decoding CSS escapes.
    fn ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                if let Some(decoded) = self.escape() {
                    name.push(decoded);
                }
            } else if is_ident_char(c) {
                self.bump();
                name.push(c);
            } else {
                break;
            }
        }
        name
    }

    /// Decodes the escape after a consumed backslash.
    fn escape(&mut self) -> Option<char> {
        let first = self.peek()?;
        if !first.is_ascii_hexdigit() {
            return self.bump();
        }

        let mut code = 0u32;
        let mut digits = 0;
        while digits < 6 {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(d) => {
                    code = code * 16 + d;
                    digits += 1;
                    self.bump();
                }
                None => break,
            }
        }
        if self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.bump();
        }
        Some(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// Skips a parenthesised group, the current char being `(`.
    fn skip_balanced(&mut self) {
        let mut depth = 0u32;
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '"' | '\'' => self.skip_quoted(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn skip_quoted(&mut self, quote: char) {
        while let Some(c) = self.bump() {
            if c == '\\' {
                self.bump();
            } else if c == quote {
                return;
            }
        }
    }

    fn skip_comment(&mut self) {
        self.bump();
        self.bump();
        let mut previous = '\0';
        while let Some(c) = self.bump() {
            if previous == '*' && c == '/' {
                return;
            }
            previous = c;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    /// Parses the inside of `[...]`, the `[` already consumed.
    fn attribute(&mut self) -> Option<Requirement> {
        self.skip_whitespace();
        let mut name = self.ident();

        // `[ns|attr]` or `[*|attr]`
        if self.peek() == Some('*') && self.peek_second() == Some('|') {
            self.bump();
        }
        if self.peek() == Some('|') && self.peek_second() != Some('=') {
            self.bump();
            name = self.ident();
        }
        self.skip_whitespace();

        let op = match self.peek() {
            Some('=') => {
                self.bump();
                Some(AttributeOp::Equals)
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) if self.peek_second() == Some('=') => {
                self.bump();
                self.bump();
                Some(match c {
                    '~' => AttributeOp::Includes,
                    '|' => AttributeOp::DashMatch,
                    '^' => AttributeOp::Prefix,
                    '$' => AttributeOp::Suffix,
                    _ => AttributeOp::Substring,
                })
            }
            _ => None,
        };

        let matcher = match op {
            Some(op) => {
                self.skip_whitespace();
                let value = match self.peek() {
                    Some(quote @ ('"' | '\'')) => {
                        self.bump();
                        self.quoted_value(quote)
                    }
                    _ => self.ident(),
                };
                Some((op, SmolStr::new(value)))
            }
            None => None,
        };

        // Flags (`i`, `s`) and the closing bracket.
        while let Some(c) = self.bump() {
            if c == ']' {
                break;
            }
        }

        if name.is_empty() {
            None
        } else {
            Some(Requirement::Attribute {
                name: name.into(),
                matcher,
            })
        }
    }

    /// Reads a quoted value, the opening quote already consumed.
    fn quoted_value(&mut self, quote: char) -> String {
        let mut value = String::new();
        while let Some(c) = self.bump() {
            if c == quote {
                break;
            }
            if c == '\\' {
                if let Some(decoded) = self.escape() {
                    value.push(decoded);
                }
            } else {
                value.push(c);
            }
        }
        value
    }
}
