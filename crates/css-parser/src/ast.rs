//! Stylesheet tree types.
//!
//! Every node records the span of the text it was parsed from. A node's
//! `span` starts where the previous sibling ended, so it owns the whitespace
//! in front of it; emitting the spans of all nodes followed by the
//! stylesheet's `trailing` span reproduces the input exactly.

use smol_str::SmolStr;
use text_span::Span;

/// At-rules whose block holds nested rules.
const GROUPING_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "document",
    "layer",
    "container",
    "scope",
    "starting-style",
];

/// A parsed stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    /// Top-level nodes in source order.
    pub nodes: Vec<Node>,
    /// Whitespace (and stray semicolons) after the last node.
    pub trailing: Span,
}

impl Stylesheet {
    /// Counts style rules at every nesting level, keyframe blocks excluded.
    pub fn style_rule_count(&self) -> usize {
        count_style_rules(&self.nodes)
    }
}

fn count_style_rules(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Rule(_) => 1,
            Node::AtRule(AtRule {
                body: AtRuleBody::Rules(list),
                ..
            }) => count_style_rules(&list.nodes),
            _ => 0,
        })
        .sum()
}

/// A node in a rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A style rule (`.a, .b { ... }`).
    Rule(StyleRule),
    /// An at-rule (`@media ...`, `@import ...;`).
    AtRule(AtRule),
    /// A comment between rules.
    Comment(Comment),
}

impl Node {
    /// Returns the full span of the node, including its leading whitespace.
    pub fn span(&self) -> Span {
        match self {
            Node::Rule(rule) => rule.span,
            Node::AtRule(at_rule) => at_rule.span,
            Node::Comment(comment) => comment.span,
        }
    }
}

/// A comment that sits between rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// The comment including its leading whitespace.
    pub span: Span,
}

/// A style rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    /// The whole rule, leading whitespace through the closing brace.
    pub span: Span,
    /// The leading whitespace.
    pub leading: Span,
    /// The selector list, up to the last token before `{`.
    pub prelude: Span,
    /// The declaration block.
    pub block: Block,
}

impl StyleRule {
    /// Returns the text between the prelude and the opening brace.
    pub fn gap(&self) -> Span {
        Span::new(self.prelude.end, self.block.span.start)
    }
}

/// A `{ ... }` block of declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The block from `{` through `}`.
    pub span: Span,
    /// The declarations directly inside the block. Nested rules are skipped.
    pub declarations: Vec<Declaration>,
}

/// A `property: value` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// The property name, ASCII-lowercased.
    pub property: SmolStr,
    /// The value, from after the colon to before the terminating `;` or `}`.
    pub value: Span,
}

/// An at-rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    /// The whole at-rule, leading whitespace through its end.
    pub span: Span,
    /// The leading whitespace.
    pub leading: Span,
    /// The at-rule name without `@`, ASCII-lowercased (`media`, `-webkit-keyframes`).
    pub name: SmolStr,
    /// The prelude between the name and the block or semicolon.
    pub prelude: Span,
    /// The body.
    pub body: AtRuleBody,
}

impl AtRule {
    /// Returns the name with any vendor prefix removed.
    pub fn unprefixed_name(&self) -> &str {
        unprefixed(&self.name)
    }
}

/// The body of an at-rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtRuleBody {
    /// No block (`@import url(a.css);`).
    Statement,
    /// A declaration block (`@font-face { ... }`).
    Declarations(Block),
    /// Nested rules (`@media screen { ... }`).
    Rules(RuleList),
    /// Keyframe blocks (`@keyframes spin { from { ... } }`).
    Keyframes(RuleList),
}

/// A braced list of nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleList {
    /// From the owning at-rule's `@` through `{`.
    pub header: Span,
    /// The nested nodes.
    pub nodes: Vec<Node>,
    /// From the end of the last nested node through `}`.
    pub close: Span,
}

/// Removes a vendor prefix such as `-webkit-` from a name.
pub fn unprefixed(name: &str) -> &str {
    if let Some(rest) = name.strip_prefix('-') {
        if let Some(idx) = rest.find('-') {
            return &rest[idx + 1..];
        }
    }
    name
}

/// Returns true if an at-rule with this name holds nested rules.
pub fn is_grouping_at_rule(name: &str) -> bool {
    GROUPING_AT_RULES.contains(&unprefixed(name))
}

/// Returns true if an at-rule with this name holds keyframe blocks.
pub fn is_keyframes_at_rule(name: &str) -> bool {
    unprefixed(name) == "keyframes"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprefixed() {
        assert_eq!(unprefixed("-webkit-keyframes"), "keyframes");
        assert_eq!(unprefixed("-moz-document"), "document");
        assert_eq!(unprefixed("media"), "media");
    }

    #[test]
    fn test_at_rule_classes() {
        assert!(is_grouping_at_rule("media"));
        assert!(is_grouping_at_rule("-moz-document"));
        assert!(!is_grouping_at_rule("font-face"));
        assert!(is_keyframes_at_rule("-webkit-keyframes"));
    }
}
