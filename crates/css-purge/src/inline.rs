//! Inline `<style>` blocks: discovery and purging against their stylesheet.
//!
//! Blocks are located in one immutable pass over the document. Each block
//! that names a purged stylesheet is purged against the selector tokens of
//! that stylesheet's purged text, and every changed block is spliced back in
//! a single pass over the original text.

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use purge_engine::{MarkupError, MarkupEvent, MarkupScanner, PurgeError, Purger, Tag, TokenSet};
use text_span::{apply_edits, EditError, LineCol, LineIndex, TextEdit};
use thiserror::Error;

/// A document whose style markup cannot be delimited.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} at {}:{}", .location.line + 1, .location.col + 1)]
pub struct ScanError {
    /// What is malformed.
    pub error: MarkupError,
    /// Where the offending start tag begins.
    pub location: LineCol,
}

/// Finds every `<style>` element, skipping comments and script bodies.
pub fn find_style_blocks(html: &str) -> Result<Vec<Tag<'_>>, ScanError> {
    let mut blocks = Vec::new();

    for event in MarkupScanner::new(html) {
        match event {
            Ok(MarkupEvent::Start(tag)) if tag.is("style") => blocks.push(tag),
            Ok(_) => {}
            Err(error) => {
                let location = LineIndex::new(html)
                    .line_col(error.span().start)
                    .unwrap_or_default();
                return Err(ScanError { error, location });
            }
        }
    }

    Ok(blocks)
}

/// The file name a stylesheet reference points at: the text after the last
/// `/`, without query string or fragment.
pub fn reference_basename(href: &str) -> &str {
    let href = href.trim();
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.rsplit('/').next().unwrap_or(path)
}

/// A purged stylesheet, as seen by inline purging.
#[derive(Debug, Clone)]
pub struct StylesheetRecord {
    /// The stylesheet file.
    pub path: Utf8PathBuf,
    /// Selector tokens of its purged text.
    pub tokens: TokenSet,
}

/// Purged stylesheets keyed by file name.
pub type StylesheetTable = IndexMap<String, StylesheetRecord>;

/// Why a document's inline styles could not be purged.
#[derive(Debug, Error)]
pub enum InlineError {
    /// The style markup is malformed; the document is left alone.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A block's CSS could not be parsed.
    #[error(transparent)]
    Purge(#[from] PurgeError),

    /// The purged blocks could not be spliced back.
    #[error("failed to splice purged styles: {0}")]
    Edit(#[from] EditError),
}

/// The result of purging one document's inline styles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlinePurge {
    /// The document text with every purged block substituted.
    pub html: String,
    /// Blocks whose text changed.
    pub changed_blocks: usize,
    /// References that matched no stylesheet.
    pub unmatched: Vec<String>,
    /// Removed selectors, when enabled.
    pub rejected: Vec<String>,
}

impl InlinePurge {
    /// Returns true if any block changed.
    pub fn is_changed(&self) -> bool {
        self.changed_blocks > 0
    }
}

/// Purges every inline style block of `html` that names a stylesheet in
/// `table` through `attribute`. `origin` names the document in errors.
pub fn purge_inline_styles(
    origin: &str,
    html: &str,
    table: &StylesheetTable,
    purger: &Purger,
    attribute: &str,
) -> Result<InlinePurge, InlineError> {
    let mut edits = Vec::new();
    let mut result = InlinePurge::default();

    for block in find_style_blocks(html)? {
        let Some(reference) = block.attribute(attribute) else {
            continue;
        };
        let Some(record) = table.get(reference_basename(reference)) else {
            result.unmatched.push(reference.to_string());
            continue;
        };

        let Some(content) = block.content else {
            continue;
        };
        let css = content.slice(html);
        if css.trim().is_empty() {
            continue;
        }

        let block_origin = format!("{} <style {}=\"{}\">", origin, attribute, reference);
        let purged = purger.purge_css(&block_origin, css, &record.tokens)?;
        result.rejected.extend(purged.rejected);
        if purged.css != css {
            edits.push(TextEdit::new(content, purged.css));
        }
    }

    result.changed_blocks = edits.len();
    result.html = if edits.is_empty() {
        html.to_string()
    } else {
        apply_edits(html, edits)?
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use purge_engine::{extract_words, PurgeOptions};
    use pretty_assertions::assert_eq;

    fn table(entries: &[(&str, &str)]) -> StylesheetTable {
        entries
            .iter()
            .map(|(name, css)| {
                (
                    name.to_string(),
                    StylesheetRecord {
                        path: Utf8PathBuf::from(format!("public/{}", name)),
                        tokens: extract_words(css),
                    },
                )
            })
            .collect()
    }

    fn content<'a>(html: &'a str, block: &Tag<'_>) -> &'a str {
        block.content.unwrap().slice(html)
    }

    fn purge(html: &str, table: &StylesheetTable) -> Result<InlinePurge, InlineError> {
        let purger = Purger::new(PurgeOptions {
            font_face: false,
            ..Default::default()
        });
        purge_inline_styles("index.html", html, table, &purger, "data-href")
    }

    #[test]
    fn test_find_blocks_and_attributes() {
        let html = r#"<head><STYLE data-href="/bundle.css" media=print>.a{}</STYLE><style amp-custom>.b{}</style ></head>"#;
        let blocks = find_style_blocks(html).unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(content(html, &blocks[0]), ".a{}");
        assert_eq!(blocks[0].attribute("data-href"), Some("/bundle.css"));
        assert_eq!(blocks[0].attribute("MEDIA"), Some("print"));
        assert_eq!(content(html, &blocks[1]), ".b{}");
        assert_eq!(blocks[1].attribute("amp-custom"), Some(""));
        assert_eq!(blocks[1].attribute("data-href"), None);
    }

    #[test]
    fn test_single_quoted_and_unquoted_values() {
        let html = "<style data-href='/a.css'></style><style data-href=/b.css></style>";
        let blocks = find_style_blocks(html).unwrap();
        assert_eq!(blocks[0].attribute("data-href"), Some("/a.css"));
        assert_eq!(blocks[1].attribute("data-href"), Some("/b.css"));
        assert_eq!(content(html, &blocks[1]), "");
    }

    #[test]
    fn test_comments_and_scripts_are_skipped() {
        let html = concat!(
            "<!-- <style data-href=\"/x.css\">.x{}</style> -->",
            "<script>const s = '<style>.y{}</style>';</script>",
            "<stylesheet-viewer></stylesheet-viewer>",
            "<style>.z{}</style>",
        );
        let blocks = find_style_blocks(html).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(content(html, &blocks[0]), ".z{}");
    }

    #[test]
    fn test_malformed_blocks() {
        let err = find_style_blocks("<p>\n<style data-href=\"/a.css\"").unwrap_err();
        assert!(matches!(err.error, MarkupError::UnterminatedTag { .. }));
        assert_eq!(err.location, LineCol::new(1, 0));
        assert_eq!(err.to_string(), "unterminated <style> start tag at 2:1");

        let err = find_style_blocks("<style>.a{}").unwrap_err();
        assert_eq!(err.to_string(), "<style> has no closing </style> at 1:1");
    }

    #[test]
    fn test_reference_basename() {
        assert_eq!(reference_basename("/bundle.css"), "bundle.css");
        assert_eq!(reference_basename("bundle.css"), "bundle.css");
        assert_eq!(reference_basename("/static/css/app.css?v=3#x"), "app.css");
        assert_eq!(reference_basename(" /theme.css "), "theme.css");
    }

    #[test]
    fn test_block_purged_against_stylesheet() {
        let table = table(&[("bundle.css", ".a{}")]);
        let html = r#"<html><head><style data-href="/bundle.css">.a{}.b{}</style></head><body></body></html>"#;
        let result = purge(html, &table).unwrap();
        assert_eq!(
            result.html,
            r#"<html><head><style data-href="/bundle.css">.a{}</style></head><body></body></html>"#
        );
        assert_eq!(result.changed_blocks, 1);
    }

    #[test]
    fn test_unmatched_reference_is_unchanged() {
        let table = table(&[("bundle.css", ".a{}")]);
        let html = r#"<style data-href="/other.css">.a{}.b{}</style>"#;
        let result = purge(html, &table).unwrap();
        assert_eq!(result.html, html);
        assert!(!result.is_changed());
        assert_eq!(result.unmatched, vec!["/other.css".to_string()]);
    }

    #[test]
    fn test_untagged_and_empty_blocks_are_unchanged() {
        let table = table(&[("bundle.css", ".a{}")]);
        let html = r#"<style>.b{}</style><style data-href="/bundle.css">
  </style>"#;
        let result = purge(html, &table).unwrap();
        assert_eq!(result.html, html);
        assert!(!result.is_changed());
    }

    #[test]
    fn test_multiple_blocks_of_different_lengths() {
        let table = table(&[("a.css", ".keep{}"), ("b.css", ".x{}.y{}")]);
        let html = concat!(
            "<style data-href=\"/a.css\">.gone{color:red}.keep{}.gone2{}</style>",
            "<p>between</p>",
            "<style data-href=\"/b.css\">.x{}.y{}.z{}</style>",
        );
        let result = purge(html, &table).unwrap();
        insta::assert_snapshot!(
            result.html,
            @r#"<style data-href="/a.css">.keep{}</style><p>between</p><style data-href="/b.css">.x{}.y{}</style>"#
        );
        assert_eq!(result.changed_blocks, 2);
    }

    #[test]
    fn test_block_parse_error() {
        let table = table(&[("bundle.css", ".a{}")]);
        let html = r#"<style data-href="/bundle.css">.a{</style>"#;
        let err = purge(html, &table).unwrap_err();
        assert!(matches!(err, InlineError::Purge(_)));
        assert!(err.to_string().starts_with("index.html <style data-href=\"/bundle.css\">:1:3"));
    }

    #[test]
    fn test_malformed_document_is_scan_error() {
        let table = table(&[("bundle.css", ".a{}")]);
        let err = purge("<style data-href=\"/bundle.css\">.a{}", &table).unwrap_err();
        assert!(matches!(
            err,
            InlineError::Scan(ScanError {
                error: MarkupError::MissingClose { .. },
                ..
            })
        ));
    }
}
