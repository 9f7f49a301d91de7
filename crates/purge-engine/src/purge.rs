//! Rule retention and stylesheet re-emission.
//!
//! Purging runs in two passes over the parsed tree. The first decides, for
//! every style rule, which of its selectors are evidenced by the content, and
//! records the animation names and font families used by the rules that
//! survive. The second emits the surviving text, resolving `@keyframes` and
//! `@font-face` rules against what the first pass recorded.

use crate::extractor::TokenSet;
use crate::selector::{parse_selector_list, AttributeOp, Requirement};
use crate::PurgeOptions;
use css_parser::{unprefixed, AtRule, AtRuleBody, Declaration, Node, Stylesheet};
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

/// Counters describing one purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    /// Style rules before purging.
    pub rules_before: usize,
    /// Style rules after purging.
    pub rules_after: usize,
    /// Stylesheet size before purging.
    pub bytes_before: usize,
    /// Stylesheet size after purging.
    pub bytes_after: usize,
}

/// The purged text of one stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgedCss {
    /// The retained CSS.
    pub css: String,
    /// Removed selectors, when `PurgeOptions::rejected` is set.
    pub rejected: Vec<String>,
    /// Before/after counters.
    pub stats: PurgeStats,
}

/// What to do with one node.
enum Decision {
    Keep,
    Drop,
    /// Keep the rule with only these selectors.
    Selectors(Vec<String>),
    /// A grouping at-rule and the decisions for its children.
    Group(Vec<Decision>),
    /// `@keyframes` with this (lowercased) name.
    Keyframes(SmolStr),
    /// `@font-face` with this (lowercased) family, if declared.
    FontFace(Option<SmolStr>),
}

/// Animation names and font families referenced by retained rules.
#[derive(Default)]
struct Usage {
    animations: FxHashSet<SmolStr>,
    fonts: FxHashSet<SmolStr>,
    /// A `var()` hides which animations are used.
    animations_dynamic: bool,
    /// A `var()` hides which fonts are used.
    fonts_dynamic: bool,
}

struct Purge<'a> {
    source: &'a str,
    tokens: &'a TokenSet,
    options: &'a PurgeOptions,
    usage: Usage,
    rejected: Vec<String>,
    rules_after: usize,
}

/// Removes every rule of `sheet` whose selectors are not evidenced by `tokens`.
pub(crate) fn purge_stylesheet(
    source: &str,
    sheet: &Stylesheet,
    tokens: &TokenSet,
    options: &PurgeOptions,
) -> PurgedCss {
    let mut purge = Purge {
        source,
        tokens,
        options,
        usage: Usage::default(),
        rejected: Vec::new(),
        rules_after: 0,
    };

    let decisions = purge.decide(&sheet.nodes);
    let mut css = String::with_capacity(source.len());
    purge.emit(&sheet.nodes, &decisions, &mut css);
    css.push_str(sheet.trailing.slice(source));

    PurgedCss {
        stats: PurgeStats {
            rules_before: sheet.style_rule_count(),
            rules_after: purge.rules_after,
            bytes_before: source.len(),
            bytes_after: css.len(),
        },
        css,
        rejected: purge.rejected,
    }
}

impl<'a> Purge<'a> {
    // === Pass 1: decisions ===

    fn decide(&mut self, nodes: &[Node]) -> Vec<Decision> {
        nodes.iter().map(|node| self.decide_node(node)).collect()
    }

    fn decide_node(&mut self, node: &Node) -> Decision {
        match node {
            Node::Comment(_) => Decision::Keep,
            Node::Rule(rule) => {
                let selectors = parse_selector_list(rule.prelude.slice(self.source));
                let total = selectors.len();
                let mut kept = Vec::with_capacity(total);

                for selector in selectors {
                    if self.is_evidenced(&selector.requirements) {
                        kept.push(selector.text.to_string());
                    } else if self.options.rejected {
                        self.rejected.push(collapse_whitespace(selector.text));
                    }
                }

                if kept.is_empty() {
                    return Decision::Drop;
                }
                self.record_usage(&rule.block.declarations);
                if kept.len() == total {
                    Decision::Keep
                } else {
                    Decision::Selectors(kept)
                }
            }
            Node::AtRule(at_rule) => match &at_rule.body {
                AtRuleBody::Statement => Decision::Keep,
                AtRuleBody::Rules(list) => Decision::Group(self.decide(&list.nodes)),
                AtRuleBody::Keyframes(_) => Decision::Keyframes(self.keyframes_name(at_rule)),
                AtRuleBody::Declarations(block) if at_rule.unprefixed_name() == "font-face" => {
                    let family = block
                        .declarations
                        .iter()
                        .find(|decl| decl.property == "font-family")
                        .map(|decl| {
                            let value = without_important(decl.value.slice(self.source));
                            SmolStr::new(unquote(value).to_lowercase())
                        });
                    Decision::FontFace(family)
                }
                AtRuleBody::Declarations(_) => Decision::Keep,
            },
        }
    }

    fn is_evidenced(&self, requirements: &[Requirement]) -> bool {
        requirements.iter().all(|requirement| self.satisfies(requirement))
    }

    fn satisfies(&self, requirement: &Requirement) -> bool {
        let safelist = &self.options.safelist;
        let known = |name: &str| self.tokens.contains(name) || safelist.contains(name);

        match requirement {
            Requirement::Class(name) | Requirement::Id(name) | Requirement::Tag(name) => {
                known(name)
            }
            Requirement::Attribute { name, matcher } => {
                if !known(name) {
                    return false;
                }
                let Some((op, value)) = matcher else {
                    return true;
                };
                if safelist.contains(value) {
                    return true;
                }
                match op {
                    AttributeOp::Equals | AttributeOp::Includes | AttributeOp::DashMatch => {
                        self.tokens.contains(value)
                    }
                    AttributeOp::Prefix => self.tokens.any(|t| t.starts_with(value.as_str())),
                    AttributeOp::Suffix => self.tokens.any(|t| t.ends_with(value.as_str())),
                    AttributeOp::Substring => self.tokens.any(|t| t.contains(value.as_str())),
                }
            }
        }
    }

    fn keyframes_name(&self, at_rule: &AtRule) -> SmolStr {
        SmolStr::new(unquote(at_rule.prelude.slice(self.source)).to_lowercase())
    }

    /// Records the animations and fonts a retained rule refers to.
    fn record_usage(&mut self, declarations: &[Declaration]) {
        for decl in declarations {
            let value = without_important(decl.value.slice(self.source));
            match unprefixed(&decl.property) {
                "animation" | "animation-name" => {
                    if value.contains("var(") {
                        self.usage.animations_dynamic = true;
                    }
                    for word in value.split(|c: char| c == ',' || c.is_whitespace()) {
                        let word = unquote(word);
                        if !word.is_empty() {
                            self.usage.animations.insert(SmolStr::new(word.to_lowercase()));
                        }
                    }
                }
                "font-family" | "font" => {
                    if value.contains("var(") {
                        self.usage.fonts_dynamic = true;
                    }
                    for family in value.split(',') {
                        // `font: bold 12px Open Sans` names the family last, so
                        // every word suffix is a candidate.
                        let words: Vec<&str> = unquote(family).split_whitespace().collect();
                        for start in 0..words.len() {
                            let candidate = unquote(&words[start..].join(" ")).to_lowercase();
                            self.usage.fonts.insert(SmolStr::new(candidate));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    // === Pass 2: emission ===

    /// Emits retained nodes into `out` and returns how many non-comment nodes were kept.
    fn emit(&mut self, nodes: &[Node], decisions: &[Decision], out: &mut String) -> usize {
        let mut kept = 0;

        for (node, decision) in nodes.iter().zip(decisions) {
            match (node, decision) {
                (_, Decision::Drop) => {}
                (Node::Comment(comment), _) => out.push_str(comment.span.slice(self.source)),
                (Node::Rule(rule), Decision::Selectors(selectors)) => {
                    out.push_str(rule.leading.slice(self.source));
                    out.push_str(&selectors.join(","));
                    out.push_str(rule.gap().slice(self.source));
                    out.push_str(rule.block.span.slice(self.source));
                    self.rules_after += 1;
                    kept += 1;
                }
                (Node::AtRule(at_rule), Decision::Group(children)) => {
                    let AtRuleBody::Rules(list) = &at_rule.body else {
                        continue;
                    };
                    let mut inner = String::new();
                    let retained = self.emit(&list.nodes, children, &mut inner);
                    let had_rules = list.nodes.iter().any(|n| !matches!(n, Node::Comment(_)));
                    if retained == 0 && had_rules {
                        continue;
                    }
                    out.push_str(at_rule.leading.slice(self.source));
                    out.push_str(list.header.slice(self.source));
                    out.push_str(&inner);
                    out.push_str(list.close.slice(self.source));
                    kept += 1;
                }
                (Node::AtRule(at_rule), Decision::Keyframes(name)) => {
                    let used = !self.options.keyframes
                        || self.usage.animations_dynamic
                        || self.usage.animations.contains(name);
                    if used {
                        out.push_str(at_rule.span.slice(self.source));
                        kept += 1;
                    } else if self.options.rejected {
                        self.rejected.push(format!("@{} {}", at_rule.name, name));
                    }
                }
                (Node::AtRule(at_rule), Decision::FontFace(family)) => {
                    let used = !self.options.font_face
                        || self.usage.fonts_dynamic
                        || family
                            .as_ref()
                            .map_or(true, |family| self.usage.fonts.contains(family));
                    if used {
                        out.push_str(at_rule.span.slice(self.source));
                        kept += 1;
                    } else if self.options.rejected {
                        let family = family.as_deref().unwrap_or_default();
                        self.rejected.push(format!("@font-face {}", family));
                    }
                }
                (node, _) => {
                    out.push_str(node.span().slice(self.source));
                    if matches!(node, Node::Rule(_)) {
                        self.rules_after += 1;
                    }
                    kept += 1;
                }
            }
        }

        kept
    }
}

/// Trims whitespace and one pair of matching quotes.
fn unquote(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

/// Cuts a value at its first top-level `!`, dropping `!important`.
fn without_important(value: &str) -> &str {
    let mut quote = None;
    let mut depth = 0usize;
    for (i, c) in value.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, '!') if depth == 0 => return value[..i].trim_end(),
            _ => {}
        }
    }
    value
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract_words;
    use crate::Safelist;
    use pretty_assertions::assert_eq;

    fn purge_with(css: &str, content: &str, options: &PurgeOptions) -> PurgedCss {
        let sheet = css_parser::parse(css).unwrap();
        purge_stylesheet(css, &sheet, &extract_words(content), options)
    }

    fn purge(css: &str, content: &str) -> String {
        purge_with(css, content, &PurgeOptions::default()).css
    }

    #[test]
    fn test_used_and_unused() {
        insta::assert_snapshot!(
            purge(".used{color:red}.unused{color:blue}", "<p class=used>"),
            @".used{color:red}"
        );
    }

    #[test]
    fn test_formatting_is_preserved() {
        let css = "/* theme */\n.a {\n  color: red;\n}\n\n.b {\n  color: blue;\n}\n";
        assert_eq!(
            purge(css, "a"),
            "/* theme */\n.a {\n  color: red;\n}\n"
        );
    }

    #[test]
    fn test_partial_selector_list() {
        assert_eq!(
            purge(".a, .b, .c { margin: 0 }", "a c"),
            ".a,.c { margin: 0 }"
        );
    }

    #[test]
    fn test_pseudo_and_compound() {
        let css = ".btn:hover{}.btn.active{}.btn .icon{}";
        assert_eq!(purge(css, "btn active"), ".btn:hover{}.btn.active{}");
    }

    #[test]
    fn test_empty_media_is_removed() {
        let css = "@media (min-width: 600px) { .x { a: b } }\n@media print { .y { a: b } }";
        assert_eq!(purge(css, "y"), "\n@media print { .y { a: b } }");
    }

    #[test]
    fn test_nested_groups() {
        let css = "@supports (display: grid) { @media screen { .a {} .b {} } }";
        assert_eq!(
            purge(css, "a"),
            "@supports (display: grid) { @media screen { .a {} } }"
        );
    }

    #[test]
    fn test_statements_are_kept() {
        let css = "@charset \"utf-8\";\n@import url(base.css);\n.gone {}";
        assert_eq!(purge(css, ""), "@charset \"utf-8\";\n@import url(base.css);");
    }

    #[test]
    fn test_attribute_selectors() {
        let css = "[disabled]{}[type=text]{}[type=radio]{}[class^=col-]{}[class$=-end]{}[data-x]{}";
        let content = r#"<input disabled type="text" class="col-6 row-end">"#;
        assert_eq!(
            purge(css, content),
            "[disabled]{}[type=text]{}[class^=col-]{}[class$=-end]{}"
        );
    }

    #[test]
    fn test_universal_and_root_are_kept() {
        assert_eq!(purge("*{}:root{--x:1}.z{}", ""), "*{}:root{--x:1}");
    }

    #[test]
    fn test_escaped_class() {
        assert_eq!(purge(r".md\:flex{}.lg\:flex{}", "md:flex"), r".md\:flex{}");
    }

    #[test]
    fn test_safelist() {
        let options = PurgeOptions {
            safelist: Safelist::new(["html", "*-upgraded"]).unwrap(),
            ..Default::default()
        };
        let result = purge_with("html{}.mdc-upgraded{}.other{}", "", &options);
        assert_eq!(result.css, "html{}.mdc-upgraded{}");
    }

    #[test]
    fn test_font_face_removed_when_unused() {
        let css = "@font-face{font-family:\"Roboto\";src:url(r.woff)}@font-face{font-family:Lato}.a{font:bold 12px Roboto, sans-serif}";
        let result = purge(css, "a");
        assert_eq!(
            result,
            "@font-face{font-family:\"Roboto\";src:url(r.woff)}.a{font:bold 12px Roboto, sans-serif}"
        );
    }

    #[test]
    fn test_font_face_used_only_by_dropped_rule() {
        let css = "@font-face{font-family:Lato}.gone{font-family:Lato}";
        assert_eq!(purge(css, ""), "");

        let options = PurgeOptions {
            font_face: false,
            ..Default::default()
        };
        assert_eq!(
            purge_with(css, "", &options).css,
            "@font-face{font-family:Lato}"
        );
    }

    #[test]
    fn test_font_face_used_with_important() {
        let css = "@font-face{font-family:Roboto;src:url(r.woff)}.a{font-family:Roboto !important}";
        assert_eq!(purge(css, "a"), css);

        let css = "@font-face{font-family:\"Open Sans\"}.a{font:12px \"Open Sans\"!important}";
        assert_eq!(purge(css, "a"), css);
    }

    #[test]
    fn test_without_important() {
        assert_eq!(without_important("Roboto !important"), "Roboto");
        assert_eq!(without_important("spin 1s!important"), "spin 1s");
        assert_eq!(without_important("\"A!B\", serif"), "\"A!B\", serif");
        assert_eq!(without_important("Lato"), "Lato");
    }

    #[test]
    fn test_font_face_with_variable_family() {
        let css = "@font-face{font-family:Lato}.a{font-family:var(--font)}";
        assert_eq!(purge(css, "a"), css);
    }

    #[test]
    fn test_keyframes_off_by_default() {
        let css = "@keyframes spin{from{a:b}to{a:c}}.a{}";
        assert_eq!(purge(css, "a"), css);
    }

    #[test]
    fn test_keyframes_option() {
        let options = PurgeOptions {
            keyframes: true,
            rejected: true,
            ..Default::default()
        };
        let css = "@keyframes spin{from{a:b}}@-webkit-keyframes fade{from{a:b}}.a{animation:spin 1s linear infinite}";
        let result = purge_with(css, "a", &options);
        assert_eq!(
            result.css,
            "@keyframes spin{from{a:b}}.a{animation:spin 1s linear infinite}"
        );
        assert_eq!(result.rejected, vec!["@-webkit-keyframes fade".to_string()]);
    }

    #[test]
    fn test_keyframes_used_with_important() {
        let options = PurgeOptions {
            keyframes: true,
            ..Default::default()
        };
        let css = "@keyframes spin{from{a:b}}.a{animation-name:spin !important}";
        assert_eq!(purge_with(css, "a", &options).css, css);
    }

    #[test]
    fn test_rejected_selectors() {
        let options = PurgeOptions {
            rejected: true,
            ..Default::default()
        };
        let result = purge_with(".a, .b  .c {}\n.d{}", "a", &options);
        assert_eq!(result.css, ".a {}");
        assert_eq!(result.rejected, vec![".b .c".to_string(), ".d".to_string()]);
    }

    #[test]
    fn test_stats() {
        let result = purge_with(
            ".a{}@media print{.b{}.c{}}",
            "a c",
            &PurgeOptions::default(),
        );
        assert_eq!(result.css, ".a{}@media print{.c{}}");
        assert_eq!(result.stats.rules_before, 3);
        assert_eq!(result.stats.rules_after, 2);
        assert_eq!(result.stats.bytes_before, 26);
        assert_eq!(result.stats.bytes_after, result.css.len());
    }

    #[test]
    fn test_idempotent() {
        let css = "/* x */\n.a, .b { color: red }\n@media print { .c {} .d {} }\n@font-face { font-family: X }\n";
        let content = "a d";
        let once = purge(css, content);
        let twice = purge(&once, content);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_keyframe_blocks_are_not_selector_purged() {
        let css = "@keyframes k{0%{a:b}50%{a:c}}";
        assert_eq!(purge(css, ""), css);
    }
}
