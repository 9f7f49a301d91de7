//! CLI argument parsing.

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};

/// Removes unused CSS from a static site's stylesheets and inline style blocks.
#[derive(Debug, Parser)]
#[command(name = "css-purge")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Working directory; globs and the config file are relative to it
    #[arg(long, default_value = ".")]
    pub workspace: Utf8PathBuf,

    /// Path to the config file (default: css-purge.json in the workspace)
    #[arg(long)]
    pub config: Option<Utf8PathBuf>,

    /// Output root whose HTML files get their inline styles purged
    #[arg(long)]
    pub public: Option<Utf8PathBuf>,

    /// Content glob searched for selector usage (replaces the configured list)
    #[arg(long)]
    pub content: Vec<String>,

    /// Stylesheet glob to purge (replaces the configured list)
    #[arg(long)]
    pub css: Vec<String>,

    /// Glob patterns to ignore
    #[arg(long)]
    pub ignore: Vec<String>,

    /// Selector name or glob that is always kept
    #[arg(long)]
    pub safelist: Vec<String>,

    /// Remove unused @keyframes
    #[arg(long)]
    pub keyframes: bool,

    /// Keep unused @font-face rules
    #[arg(long = "no-font-face")]
    pub no_font_face: bool,

    /// Report removed selectors
    #[arg(long)]
    pub rejected: bool,

    /// Only purge stylesheet files, not inline style blocks
    #[arg(long = "skip-inline")]
    pub skip_inline: bool,

    /// Compute and report everything without writing files
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Print timing breakdowns
    #[arg(long)]
    pub timings: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output
    Json,
}
