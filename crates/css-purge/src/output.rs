//! Output formatting.

use crate::cli::OutputFormat;
use serde::Serialize;

/// One purged stylesheet file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StylesheetReport {
    /// Path relative to the workspace.
    pub file: String,
    pub rules_before: usize,
    pub rules_after: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,
    /// Whether the file was written.
    pub written: bool,
    /// Removed selectors, when requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

/// One document whose inline styles changed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DocumentReport {
    /// Path relative to the workspace.
    pub file: String,
    /// Number of inline blocks that changed.
    pub blocks: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,
    /// Whether the file was written.
    pub written: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

/// A file left alone because its input was malformed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedReport {
    pub file: String,
    pub reason: String,
}

/// Which phase a failure happened in.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Purging stylesheet files.
    Stylesheets,
    /// Purging inline style blocks.
    Inline,
}

/// A file that could not be processed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailureReport {
    pub file: String,
    pub phase: Phase,
    pub error: String,
}

/// Summary of a purge run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    /// Nothing was written.
    pub dry_run: bool,
    /// Whether inline styles were purged.
    pub inline_purged: bool,
    /// Number of content files searched for selectors.
    pub content_files: usize,
    pub stylesheets: Vec<StylesheetReport>,
    pub documents: Vec<DocumentReport>,
    pub skipped: Vec<SkippedReport>,
    pub failures: Vec<FailureReport>,
}

impl RunSummary {
    /// Returns true if any file failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Formats the summary line.
    pub fn format(&self) -> String {
        let rules_before: usize = self.stylesheets.iter().map(|s| s.rules_before).sum();
        let rules_after: usize = self.stylesheets.iter().map(|s| s.rules_after).sum();

        let mut line = format!(
            "====================================\ncss-purge kept {} of {} {} in {} {} and purged inline styles in {} {}",
            rules_after,
            rules_before,
            plural(rules_before, "rule", "rules"),
            self.stylesheets.len(),
            plural(self.stylesheets.len(), "stylesheet", "stylesheets"),
            self.documents.len(),
            plural(self.documents.len(), "document", "documents"),
        );
        if !self.skipped.is_empty() || !self.failures.is_empty() {
            line.push_str(&format!(
                " ({} skipped, {} failed)",
                self.skipped.len(),
                self.failures.len()
            ));
        }
        if self.dry_run {
            line.push_str(" [dry run, nothing written]");
        }
        line
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

/// Formats run summaries for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a run summary.
    pub fn format(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Human => self.format_human(summary),
            OutputFormat::Json => self.format_json(summary),
        }
    }

    /// Formats as human-readable output.
    fn format_human(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        for sheet in &summary.stylesheets {
            output.push_str(&format!(
                "{}: {} -> {} rules, {} -> {} bytes\n",
                sheet.file, sheet.rules_before, sheet.rules_after, sheet.bytes_before, sheet.bytes_after
            ));
            for selector in &sheet.rejected {
                output.push_str(&format!("  removed {}\n", selector));
            }
        }

        for doc in &summary.documents {
            output.push_str(&format!(
                "{}: {} inline {} purged, {} -> {} bytes\n",
                doc.file,
                doc.blocks,
                plural(doc.blocks, "block", "blocks"),
                doc.bytes_before,
                doc.bytes_after
            ));
            for selector in &doc.rejected {
                output.push_str(&format!("  removed {}\n", selector));
            }
        }

        for skipped in &summary.skipped {
            output.push_str(&format!("Skipped {}: {}\n", skipped.file, skipped.reason));
        }

        for failure in &summary.failures {
            output.push_str(&format!("Failed {}: {}\n", failure.file, failure.error));
        }

        if !summary.inline_purged && summary.has_failures() {
            output.push_str("Inline styles were not purged because stylesheets failed\n");
        }

        output.push_str(&summary.format());
        output.push('\n');
        output
    }

    /// Formats as JSON output.
    fn format_json(&self, summary: &RunSummary) -> String {
        let mut json = serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string());
        json.push('\n');
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            dry_run: false,
            inline_purged: true,
            content_files: 3,
            stylesheets: vec![StylesheetReport {
                file: "public/bundle.css".into(),
                rules_before: 10,
                rules_after: 4,
                bytes_before: 900,
                bytes_after: 300,
                written: true,
                rejected: vec![".unused".into()],
            }],
            documents: vec![DocumentReport {
                file: "public/index.html".into(),
                blocks: 1,
                bytes_before: 2000,
                bytes_after: 1500,
                written: true,
                rejected: Vec::new(),
            }],
            skipped: vec![SkippedReport {
                file: "public/partial.html".into(),
                reason: "no <body> ... </body> region found".into(),
            }],
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_format_human() {
        let output = Formatter::new(OutputFormat::Human).format(&summary());
        assert!(output.contains("public/bundle.css: 10 -> 4 rules, 900 -> 300 bytes"));
        assert!(output.contains("  removed .unused"));
        assert!(output.contains("public/index.html: 1 inline block purged, 2000 -> 1500 bytes"));
        assert!(output.contains("Skipped public/partial.html: no <body>"));
    }

    #[test]
    fn test_format_json() {
        let output = Formatter::new(OutputFormat::Json).format(&summary());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["stylesheets"][0]["file"], "public/bundle.css");
        assert_eq!(value["stylesheets"][0]["rules_after"], 4);
        assert_eq!(value["documents"][0].get("rejected"), None);
        assert_eq!(value["failures"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_summary_line() {
        let mut summary = summary();
        insta::assert_snapshot!(summary.format(), @r"
        ====================================
        css-purge kept 4 of 10 rules in 1 stylesheet and purged inline styles in 1 document (1 skipped, 0 failed)
        ");

        summary.dry_run = true;
        summary.skipped.clear();
        summary.failures.push(FailureReport {
            file: "public/theme.css".into(),
            phase: Phase::Stylesheets,
            error: "permission denied".into(),
        });
        assert!(summary.has_failures());
        assert!(summary
            .format()
            .ends_with("(0 skipped, 1 failed) [dry run, nothing written]"));
    }
}
