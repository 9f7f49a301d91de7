//! Main orchestration logic.
//!
//! A run has two phases separated by a full barrier. Phase 1 purges every
//! stylesheet in memory, then writes them all; phase 2 starts only once every
//! write has succeeded and purges the inline style blocks of each HTML
//! document against the stylesheet it was copied from.

use crate::cli::Args;
use crate::config::{ConfigError, PurgeConfig};
use crate::inline::{purge_inline_styles, InlineError, StylesheetRecord, StylesheetTable};
use crate::output::{
    DocumentReport, FailureReport, Formatter, Phase, RunSummary, SkippedReport, StylesheetReport,
};
use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use purge_engine::{extract_words, ContentSource, CssSource, PurgeError, PurgeResult, Purger};
use rayon::prelude::*;
use std::fs;
use std::time::{Duration, Instant};
use thiserror::Error;
use walkdir::WalkDir;

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The workspace directory could not be resolved.
    #[error("invalid workspace: {0}")]
    Workspace(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid glob pattern.
    #[error("invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// Purging the stylesheets failed; nothing was written.
    #[error(transparent)]
    Purge(#[from] PurgeError),
}

/// Per-phase durations.
#[derive(Debug, Default)]
struct Timings {
    file_scan: Duration,
    purge: Duration,
    write: Duration,
    inline: Option<Duration>,
}

/// What phase 2 did with one document.
enum DocumentOutcome {
    Unchanged,
    Rewritten(DocumentReport),
    Skipped(String),
    Failed(String),
}

/// Runs both purge phases and prints the report.
pub fn run(args: Args) -> Result<RunSummary, OrchestratorError> {
    let total_start = Instant::now();
    let workspace = resolve_workspace(&args.workspace)?;

    let mut config = PurgeConfig::load(&workspace, args.config.as_deref())?;
    config.apply_args(&args);

    let timings_enabled = args.timings || read_env_bool("CSS_PURGE_TIMINGS").unwrap_or(false);
    let mut timings = Timings::default();

    // Find content and stylesheets
    let scan_start = Instant::now();
    let ignore = build_globset(&args.ignore)?;
    let content_ignore = build_globset(config.content_ignore.iter().chain(&args.ignore))?;
    let content_files = discover(&workspace, &config.content, &content_ignore)?;
    let css_files = discover(&workspace, &config.css, &ignore)?;
    timings.file_scan = scan_start.elapsed();

    if css_files.is_empty() {
        eprintln!("Warning: no stylesheets matched {}", config.css.join(", "));
    }

    // Phase 1: purge every stylesheet in memory; any failure aborts before writing
    let purge_start = Instant::now();
    let purger = Purger::new(config.purge_options()?).with_extractors(config.extractor_table()?);
    let content: Vec<ContentSource> = content_files
        .iter()
        .cloned()
        .map(ContentSource::File)
        .collect();
    let css: Vec<CssSource> = css_files.iter().cloned().map(CssSource::File).collect();
    let output = purger.purge(&content, &css)?;
    timings.purge = purge_start.elapsed();

    let mut summary = RunSummary {
        dry_run: args.dry_run,
        content_files: content_files.len(),
        ..Default::default()
    };

    for skipped in &output.scan.skipped {
        let file = relative(&workspace, Utf8Path::new(&skipped.origin));
        eprintln!("Warning: ignoring {} as content: {}", file, skipped.reason);
        summary.skipped.push(SkippedReport {
            file,
            reason: skipped.reason.to_string(),
        });
    }

    // Phase 1: write; collecting every write is the barrier before phase 2
    let write_start = Instant::now();
    let writes: Vec<std::io::Result<()>> = output
        .results
        .par_iter()
        .map(|result| write_stylesheet(result, args.dry_run))
        .collect();
    timings.write = write_start.elapsed();

    for (result, write) in output.results.iter().zip(writes) {
        let Some(path) = &result.file else {
            continue;
        };
        let file = relative(&workspace, path);
        match write {
            Ok(()) => summary.stylesheets.push(StylesheetReport {
                file,
                rules_before: result.stats.rules_before,
                rules_after: result.stats.rules_after,
                bytes_before: result.stats.bytes_before,
                bytes_after: result.stats.bytes_after,
                written: !args.dry_run,
                rejected: result.rejected.clone(),
            }),
            Err(e) => {
                eprintln!("Error: failed to write {}: {}", file, e);
                summary.failures.push(FailureReport {
                    file,
                    phase: Phase::Stylesheets,
                    error: e.to_string(),
                });
            }
        }
    }

    // Phase 2: inline styles, only against a fully written set of stylesheets
    if config.inline_styles && summary.has_failures() {
        eprintln!(
            "Warning: inline styles not purged because {} stylesheet(s) could not be written",
            summary.failures.len()
        );
    } else if config.inline_styles {
        let inline_start = Instant::now();
        purge_documents(&workspace, &config, &ignore, &output.results, &mut summary)?;
        summary.inline_purged = true;
        timings.inline = Some(inline_start.elapsed());
    }

    if timings_enabled {
        eprintln!("=== css-purge timings ===");
        eprintln!(
            "file scan: {:?} ({} content files, {} stylesheets)",
            timings.file_scan,
            content_files.len(),
            css_files.len()
        );
        eprintln!("purge: {:?}", timings.purge);
        eprintln!("write: {:?}", timings.write);
        if let Some(inline) = timings.inline {
            eprintln!("inline styles: {:?}", inline);
        }
        eprintln!("total: {:?}", total_start.elapsed());
    }

    print!("{}", Formatter::new(args.output).format(&summary));
    Ok(summary)
}

/// Purges the inline style blocks of every HTML document under the public root.
fn purge_documents(
    workspace: &Utf8Path,
    config: &PurgeConfig,
    ignore: &GlobSet,
    results: &[PurgeResult],
    summary: &mut RunSummary,
) -> Result<(), OrchestratorError> {
    let table = stylesheet_table(workspace, results);
    let purger = Purger::new(config.inline_purge_options()?);
    let pattern = config.public.join("**/*.{html,htm}");
    let documents = discover(workspace, &[pattern.to_string()], ignore)?;
    let dry_run = summary.dry_run;

    let outcomes: Vec<(String, DocumentOutcome)> = documents
        .par_iter()
        .map(|path| {
            let file = relative(workspace, path);
            let outcome = purge_document(path, &file, &table, &purger, config, dry_run);
            (file, outcome)
        })
        .collect();

    for (file, outcome) in outcomes {
        match outcome {
            DocumentOutcome::Unchanged => {}
            DocumentOutcome::Rewritten(report) => summary.documents.push(report),
            DocumentOutcome::Skipped(reason) => {
                eprintln!("Warning: skipping inline styles of {}: {}", file, reason);
                summary.skipped.push(SkippedReport { file, reason });
            }
            DocumentOutcome::Failed(error) => {
                eprintln!("Error: {}", error);
                summary.failures.push(FailureReport {
                    file,
                    phase: Phase::Inline,
                    error,
                });
            }
        }
    }

    Ok(())
}

/// Reads, purges and (unless `dry_run`) rewrites one document.
fn purge_document(
    path: &Utf8Path,
    file: &str,
    table: &StylesheetTable,
    purger: &Purger,
    config: &PurgeConfig,
    dry_run: bool,
) -> DocumentOutcome {
    let html = match fs::read_to_string(path) {
        Ok(html) => html,
        Err(e) => return DocumentOutcome::Failed(format!("failed to read {}: {}", file, e)),
    };

    let purged = match purge_inline_styles(
        file,
        &html,
        table,
        purger,
        &config.inline_style_attribute,
    ) {
        Ok(purged) => purged,
        Err(InlineError::Scan(e)) => return DocumentOutcome::Skipped(e.to_string()),
        Err(e) => return DocumentOutcome::Failed(e.to_string()),
    };

    for reference in &purged.unmatched {
        eprintln!(
            "Warning: {}: no purged stylesheet matches inline style {}",
            file, reference
        );
    }

    if !purged.is_changed() {
        return DocumentOutcome::Unchanged;
    }
    if !dry_run {
        if let Err(e) = fs::write(path, &purged.html) {
            return DocumentOutcome::Failed(format!("failed to write {}: {}", file, e));
        }
    }

    DocumentOutcome::Rewritten(DocumentReport {
        file: file.to_string(),
        blocks: purged.changed_blocks,
        bytes_before: html.len(),
        bytes_after: purged.html.len(),
        written: !dry_run,
        rejected: purged.rejected,
    })
}

/// Builds the file-name lookup of purged stylesheets. The first stylesheet
/// with a given file name wins.
fn stylesheet_table(workspace: &Utf8Path, results: &[PurgeResult]) -> StylesheetTable {
    let mut table = StylesheetTable::new();
    for result in results {
        let Some(path) = &result.file else {
            continue;
        };
        let Some(name) = path.file_name() else {
            continue;
        };
        if let Some(existing) = table.get(name) {
            eprintln!(
                "Warning: {} and {} share the file name {}; inline styles use the first",
                relative(workspace, &existing.path),
                relative(workspace, path),
                name
            );
            continue;
        }
        table.insert(
            name.to_string(),
            StylesheetRecord {
                path: path.clone(),
                tokens: extract_words(&result.css),
            },
        );
    }
    table
}

fn write_stylesheet(result: &PurgeResult, dry_run: bool) -> std::io::Result<()> {
    match &result.file {
        Some(path) if !dry_run => fs::write(path, &result.css),
        _ => Ok(()),
    }
}

fn resolve_workspace(workspace: &Utf8Path) -> Result<Utf8PathBuf, OrchestratorError> {
    if workspace.is_absolute() {
        return Ok(workspace.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| OrchestratorError::Workspace(e.to_string()))?;
    let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| OrchestratorError::Workspace(e.to_string()))?;
    Ok(cwd.join(workspace))
}

fn build_globset<I, S>(patterns: I) -> Result<GlobSet, OrchestratorError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(glob(pattern.as_ref())?);
    }
    builder
        .build()
        .map_err(|e| OrchestratorError::InvalidGlob(e.to_string()))
}

fn glob(pattern: &str) -> Result<globset::Glob, OrchestratorError> {
    GlobBuilder::new(normalize_pattern(pattern))
        .literal_separator(true)
        .build()
        .map_err(|e| OrchestratorError::InvalidGlob(e.to_string()))
}

/// Strips leading `./` components, which never appear in walked paths.
fn normalize_pattern(pattern: &str) -> &str {
    let mut pattern = pattern;
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest.trim_start_matches('/');
    }
    pattern
}

/// Returns the leading components of `pattern` that contain no glob syntax.
fn literal_prefix(pattern: &str) -> Utf8PathBuf {
    let mut prefix = Utf8PathBuf::new();
    let components: Vec<&str> = pattern.split('/').collect();
    // The last component names files, never a directory to walk.
    for component in &components[..components.len().saturating_sub(1)] {
        if component.contains(['*', '?', '[', '{']) {
            break;
        }
        if component.is_empty() && prefix.as_str().is_empty() {
            prefix.push("/");
            continue;
        }
        prefix.push(component);
    }
    prefix
}

/// Finds the files matching any of `patterns`, minus `ignore`, sorted and
/// deduplicated. Relative patterns match paths relative to the workspace.
fn discover(
    workspace: &Utf8Path,
    patterns: &[String],
    ignore: &GlobSet,
) -> Result<Vec<Utf8PathBuf>, OrchestratorError> {
    let mut files = Vec::new();

    for pattern in patterns {
        let matcher = glob(pattern)?.compile_matcher();
        let pattern = normalize_pattern(pattern);
        let absolute = Utf8Path::new(pattern).is_absolute();
        let root = workspace.join(literal_prefix(pattern));
        if !root.is_dir() {
            continue;
        }

        files.extend(
            WalkDir::new(&root)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| Utf8PathBuf::try_from(e.into_path()).ok())
                .filter(|p| {
                    let candidate = if absolute {
                        p.as_path()
                    } else {
                        p.strip_prefix(workspace).unwrap_or(p)
                    };
                    matcher.is_match(candidate.as_str()) && !ignore.is_match(candidate.as_str())
                }),
        );
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Formats `path` relative to the workspace when it is inside it.
fn relative(workspace: &Utf8Path, path: &Utf8Path) -> String {
    path.strip_prefix(workspace).unwrap_or(path).to_string()
}

fn read_env_bool(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn workspace(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    fn touch(root: &Utf8Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    fn names(root: &Utf8Path, files: &[Utf8PathBuf]) -> Vec<String> {
        files.iter().map(|f| relative(root, f)).collect()
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("public/**/*.css"), Utf8PathBuf::from("public"));
        assert_eq!(
            literal_prefix("node_modules/@material/**/*.js"),
            Utf8PathBuf::from("node_modules/@material")
        );
        assert_eq!(literal_prefix("*.html"), Utf8PathBuf::from(""));
        assert_eq!(literal_prefix("public/index.html"), Utf8PathBuf::from("public"));
        assert_eq!(literal_prefix("/srv/site/*.css"), Utf8PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_discover_default_content_globs() {
        let dir = TempDir::new().unwrap();
        let root = workspace(&dir);
        for file in [
            "public/index.html",
            "public/blog/post.html",
            "public/bundle.css",
            "node_modules/@material/button/index.js",
            "node_modules/@material/button/index.d.ts",
            "node_modules/@material/react-button/index.js",
            "node_modules/other/index.js",
        ] {
            touch(&root, file);
        }

        let config = PurgeConfig::default();
        let ignore = build_globset(&config.content_ignore).unwrap();
        let files = discover(&root, &config.content, &ignore).unwrap();
        assert_eq!(
            names(&root, &files),
            vec![
                "node_modules/@material/button/index.js",
                "public/blog/post.html",
                "public/index.html",
            ]
        );

        let css = discover(&root, &config.css, &GlobSet::empty()).unwrap();
        assert_eq!(names(&root, &css), vec!["public/bundle.css"]);
    }

    #[test]
    fn test_discover_missing_root_and_duplicates() {
        let dir = TempDir::new().unwrap();
        let root = workspace(&dir);
        touch(&root, "public/a.css");

        let files = discover(
            &root,
            &[
                "public/*.css".to_string(),
                "public/**/*.css".to_string(),
                "dist/**/*.css".to_string(),
            ],
            &GlobSet::empty(),
        )
        .unwrap();
        assert_eq!(names(&root, &files), vec!["public/a.css"]);
    }

    #[test]
    fn test_discover_dot_slash_patterns() {
        let dir = TempDir::new().unwrap();
        let root = workspace(&dir);
        touch(&root, "public/a.css");
        touch(&root, "public/vendor/b.css");

        let ignore = build_globset(["./public/vendor/**"]).unwrap();
        let files = discover(&root, &["./public/**/*.css".to_string()], &ignore).unwrap();
        assert_eq!(names(&root, &files), vec!["public/a.css"]);

        assert_eq!(normalize_pattern("././public/*.css"), "public/*.css");
        assert_eq!(normalize_pattern("/srv/*.css"), "/srv/*.css");
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_follows_symlinked_packages() {
        let dir = TempDir::new().unwrap();
        let root = workspace(&dir);
        touch(&root, "store/button/index.js");
        fs::create_dir_all(root.join("node_modules/@material")).unwrap();
        std::os::unix::fs::symlink(
            root.join("store/button"),
            root.join("node_modules/@material/button"),
        )
        .unwrap();

        let config = PurgeConfig::default();
        let ignore = build_globset(&config.content_ignore).unwrap();
        let files = discover(&root, &config.content, &ignore).unwrap();
        assert_eq!(
            names(&root, &files),
            vec!["node_modules/@material/button/index.js"]
        );
    }

    #[test]
    fn test_invalid_glob() {
        let err = build_globset(["public/[*.css"]).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidGlob(_)));
    }

    #[test]
    fn test_stylesheet_table_first_name_wins() {
        let result = |path: &str, css: &str| PurgeResult {
            file: Some(Utf8PathBuf::from(path)),
            css: css.to_string(),
            rejected: Vec::new(),
            stats: Default::default(),
        };
        let table = stylesheet_table(
            Utf8Path::new("/site"),
            &[
                result("/site/public/bundle.css", ".a{}"),
                result("/site/public/blog/bundle.css", ".b{}"),
                result("/site/public/theme.css", ".c{}"),
            ],
        );

        assert_eq!(table.len(), 2);
        let bundle = &table["bundle.css"];
        assert_eq!(bundle.path, Utf8PathBuf::from("/site/public/bundle.css"));
        assert!(bundle.tokens.contains("a"));
        assert!(!bundle.tokens.contains("b"));
    }

    #[test]
    fn test_read_env_bool() {
        std::env::set_var("CSS_PURGE_TEST_BOOL", "Yes");
        assert_eq!(read_env_bool("CSS_PURGE_TEST_BOOL"), Some(true));
        std::env::set_var("CSS_PURGE_TEST_BOOL", "off");
        assert_eq!(read_env_bool("CSS_PURGE_TEST_BOOL"), Some(false));
        std::env::set_var("CSS_PURGE_TEST_BOOL", "maybe");
        assert_eq!(read_env_bool("CSS_PURGE_TEST_BOOL"), None);
        std::env::remove_var("CSS_PURGE_TEST_BOOL");
        assert_eq!(read_env_bool("CSS_PURGE_TEST_BOOL"), None);
    }
}
