//! The purge entry point: content sources in, purged stylesheets out.

use crate::extractor::{ExtractError, Extractor, ExtractorTable, TokenSet};
use crate::purge::{purge_stylesheet, PurgeStats, PurgedCss};
use crate::{PurgeError, Safelist};
use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use std::fs;

/// Purge toggles.
#[derive(Debug, Clone)]
pub struct PurgeOptions {
    /// Remove `@keyframes` not referenced by a retained animation.
    pub keyframes: bool,
    /// Remove `@font-face` not referenced by a retained font declaration.
    pub font_face: bool,
    /// Record removed selectors.
    pub rejected: bool,
    /// Names always considered used.
    pub safelist: Safelist,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            keyframes: false,
            font_face: true,
            rejected: false,
            safelist: Safelist::default(),
        }
    }
}

/// Text searched for selector usage.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// A file; its extension picks the extractor.
    File(Utf8PathBuf),
    /// In-memory text with the extractor given directly.
    Raw {
        /// The text.
        text: String,
        /// How to extract tokens from it.
        extractor: Extractor,
    },
}

impl ContentSource {
    fn origin(&self) -> String {
        match self {
            ContentSource::File(path) => path.to_string(),
            ContentSource::Raw { .. } => "<raw content>".to_string(),
        }
    }
}

/// A stylesheet to purge.
#[derive(Debug, Clone)]
pub enum CssSource {
    /// A file on disk.
    File(Utf8PathBuf),
    /// In-memory CSS.
    Raw(String),
}

/// A content unit that contributed no tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedContent {
    /// The file path, or `<raw content>`.
    pub origin: String,
    /// Why it was skipped.
    pub reason: ExtractError,
}

/// Tokens gathered from all content sources.
#[derive(Debug, Clone, Default)]
pub struct ContentScan {
    /// The union of all extracted tokens.
    pub tokens: TokenSet,
    /// Units skipped because extraction failed.
    pub skipped: Vec<SkippedContent>,
}

/// One purged stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeResult {
    /// The source file, `None` for raw CSS.
    pub file: Option<Utf8PathBuf>,
    /// The retained CSS.
    pub css: String,
    /// Removed selectors, when enabled.
    pub rejected: Vec<String>,
    /// Before/after counters.
    pub stats: PurgeStats,
}

/// Everything a purge produced.
#[derive(Debug, Clone, Default)]
pub struct PurgeOutput {
    /// One result per stylesheet, in input order.
    pub results: Vec<PurgeResult>,
    /// The content scan the results were computed from.
    pub scan: ContentScan,
}

/// Purges stylesheets against content.
#[derive(Debug, Clone, Default)]
pub struct Purger {
    options: PurgeOptions,
    extractors: ExtractorTable,
}

impl Purger {
    /// Creates a purger with the default extractor table.
    pub fn new(options: PurgeOptions) -> Self {
        Self {
            options,
            extractors: ExtractorTable::default(),
        }
    }

    /// Replaces the extractor table.
    pub fn with_extractors(mut self, extractors: ExtractorTable) -> Self {
        self.extractors = extractors;
        self
    }

    /// Reads and tokenises all content sources in parallel.
    ///
    /// A source whose extractor rejects it (an HTML file without a body) is
    /// recorded in `skipped`; an unreadable file is an error.
    pub fn collect_tokens(&self, content: &[ContentSource]) -> Result<ContentScan, PurgeError> {
        let scanned: Vec<Result<TokenSet, ExtractError>> = content
            .par_iter()
            .map(|source| -> Result<_, PurgeError> {
                match source {
                    ContentSource::File(path) => {
                        let text = read(path)?;
                        Ok(self.extractors.for_path(path).extract(&text))
                    }
                    ContentSource::Raw { text, extractor } => Ok(extractor.extract(text)),
                }
            })
            .collect::<Result<_, PurgeError>>()?;

        let mut scan = ContentScan::default();
        for (source, result) in content.iter().zip(scanned) {
            match result {
                Ok(tokens) => scan.tokens.merge(tokens),
                Err(reason) => scan.skipped.push(SkippedContent {
                    origin: source.origin(),
                    reason,
                }),
            }
        }
        Ok(scan)
    }

    /// Purges one stylesheet's text. `origin` names it in errors.
    pub fn purge_css(
        &self,
        origin: &str,
        css: &str,
        tokens: &TokenSet,
    ) -> Result<PurgedCss, PurgeError> {
        let sheet = css_parser::parse(css).map_err(|e| PurgeError::parse(origin, css, e))?;
        Ok(purge_stylesheet(css, &sheet, tokens, &self.options))
    }

    /// Purges one stylesheet file without writing it.
    pub fn purge_file(
        &self,
        path: &Utf8Path,
        tokens: &TokenSet,
    ) -> Result<PurgeResult, PurgeError> {
        let css = read(path)?;
        let purged = self.purge_css(path.as_str(), &css, tokens)?;
        Ok(PurgeResult {
            file: Some(path.to_path_buf()),
            css: purged.css,
            rejected: purged.rejected,
            stats: purged.stats,
        })
    }

    /// Collects tokens from `content`, then purges every stylesheet in parallel.
    ///
    /// Fails on the first unreadable file or unparsable stylesheet; nothing is
    /// written either way.
    pub fn purge(
        &self,
        content: &[ContentSource],
        css: &[CssSource],
    ) -> Result<PurgeOutput, PurgeError> {
        let scan = self.collect_tokens(content)?;

        let results = css
            .par_iter()
            .map(|source| -> Result<PurgeResult, PurgeError> {
                match source {
                    CssSource::File(path) => self.purge_file(path, &scan.tokens),
                    CssSource::Raw(text) => {
                        let purged = self.purge_css("<raw css>", text, &scan.tokens)?;
                        Ok(PurgeResult {
                            file: None,
                            css: purged.css,
                            rejected: purged.rejected,
                            stats: purged.stats,
                        })
                    }
                }
            })
            .collect::<Result<Vec<_>, PurgeError>>()?;

        Ok(PurgeOutput { results, scan })
    }
}

fn read(path: &Utf8Path) -> Result<String, PurgeError> {
    fs::read_to_string(path).map_err(|source| PurgeError::Read {
        path: path.to_path_buf(),
        source,
    })
}
