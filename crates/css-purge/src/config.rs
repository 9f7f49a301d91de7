//! Configuration loading.

use crate::cli::Args;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use purge_engine::{Extractor, ExtractorTable, PurgeOptions, Safelist};
use serde::Deserialize;
use std::fs;
use thiserror::Error;

/// The config file looked up in the workspace when `--config` is not given.
pub const CONFIG_FILE: &str = "css-purge.json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for this schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An `extractors` entry names an unknown extractor.
    #[error("invalid extractor for `{extension}`: {message}")]
    InvalidExtractor { extension: String, message: String },

    /// A safelist entry is not a valid pattern.
    #[error("invalid safelist pattern: {0}")]
    InvalidSafelist(#[from] globset::Error),
}

/// css-purge configuration (`css-purge.json`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PurgeConfig {
    /// Output root whose HTML files get their inline styles purged.
    pub public: Utf8PathBuf,

    /// Globs of files searched for selector usage.
    pub content: Vec<String>,

    /// Globs excluded from `content`.
    pub content_ignore: Vec<String>,

    /// Globs of stylesheets to purge.
    pub css: Vec<String>,

    /// Extension to extractor name (`html-body` or `whole`).
    pub extractors: IndexMap<String, String>,

    /// Names or globs always kept.
    pub safelist: Vec<String>,

    /// Remove unused `@keyframes`.
    pub keyframes: bool,

    /// Remove unused `@font-face`.
    pub font_face: bool,

    /// Report removed selectors.
    pub rejected: bool,

    /// Purge inline style blocks after the stylesheets.
    pub inline_styles: bool,

    /// The attribute linking an inline style block to its stylesheet.
    pub inline_style_attribute: String,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            public: Utf8PathBuf::from("public"),
            content: vec![
                "public/**/*.html".to_string(),
                "node_modules/@material/**/*.{js,jsx,ts,tsx}".to_string(),
            ],
            content_ignore: vec![
                "node_modules/@material/react-*/**".to_string(),
                "**/*.d.ts".to_string(),
            ],
            css: vec!["public/**/*.css".to_string()],
            extractors: IndexMap::new(),
            safelist: vec!["html".to_string(), "body".to_string()],
            keyframes: false,
            font_face: true,
            rejected: false,
            inline_styles: true,
            inline_style_attribute: "data-href".to_string(),
        }
    }
}

impl PurgeConfig {
    /// Loads the configuration.
    ///
    /// An explicit path must load. The implicit `css-purge.json` is optional;
    /// if it exists but cannot be loaded, a warning is printed and the
    /// defaults are used.
    pub fn load(workspace: &Utf8Path, explicit: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let path = if path.is_relative() {
                workspace.join(path)
            } else {
                path.to_path_buf()
            };
            return Self::parse_file(&path);
        }

        let path = workspace.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        match Self::parse_file(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!("Warning: {}; using defaults", e);
                Ok(Self::default())
            }
        }
    }

    fn parse_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses configuration JSON, tolerating comments.
    pub fn parse_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(&remove_json_comments(content))
    }

    /// Applies command-line overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(public) = &args.public {
            self.public = public.clone();
        }
        if !args.content.is_empty() {
            self.content = args.content.clone();
        }
        if !args.css.is_empty() {
            self.css = args.css.clone();
        }
        self.safelist.extend(args.safelist.iter().cloned());
        if args.keyframes {
            self.keyframes = true;
        }
        if args.no_font_face {
            self.font_face = false;
        }
        if args.rejected {
            self.rejected = true;
        }
        if args.skip_inline {
            self.inline_styles = false;
        }
    }

    /// Builds the extractor table: built-in mappings plus configured overrides.
    pub fn extractor_table(&self) -> Result<ExtractorTable, ConfigError> {
        let mut table = ExtractorTable::default();
        for (extension, name) in &self.extractors {
            let extractor: Extractor = name.parse().map_err(|message| {
                ConfigError::InvalidExtractor {
                    extension: extension.clone(),
                    message,
                }
            })?;
            table.set(extension, extractor);
        }
        Ok(table)
    }

    /// Options for purging stylesheet files.
    pub fn purge_options(&self) -> Result<PurgeOptions, ConfigError> {
        Ok(PurgeOptions {
            keyframes: self.keyframes,
            font_face: self.font_face,
            rejected: self.rejected,
            safelist: Safelist::new(&self.safelist)?,
        })
    }

    /// Options for purging inline style blocks.
    ///
    /// Blocks are checked against their stylesheet's selectors only. At-rule
    /// pruning stays off and nothing is safelisted, so a selector survives only
    /// if the purged stylesheet still names it.
    pub fn inline_purge_options(&self) -> Result<PurgeOptions, ConfigError> {
        Ok(PurgeOptions {
            keyframes: false,
            font_face: false,
            safelist: Safelist::default(),
            ..self.purge_options()?
        })
    }
}

/// Removes single-line and multi-line comments from JSON.
fn remove_json_comments(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut chars = json.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if c == '"' {
                in_string = false;
            } else if c == '\\' {
                if let Some(next) = chars.next() {
                    result.push(next);
                }
            }
        } else if c == '"' {
            result.push(c);
            in_string = true;
        } else if c == '/' {
            match chars.peek() {
                Some('/') => {
                    chars.next();
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        chars.next();
                    }
                }
                Some('*') => {
                    chars.next();
                    while let Some(next) = chars.next() {
                        if next == '*' && chars.peek() == Some(&'/') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => result.push(c),
            }
        } else {
            result.push(c);
        }
    }

    result
}
