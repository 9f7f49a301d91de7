//! Names that are always treated as used.

use globset::{Glob, GlobSet, GlobSetBuilder};
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

/// Selector names (class, id, tag or attribute names) kept regardless of content.
///
/// Entries containing glob metacharacters (`*`, `?`, `[`, `{`) are matched as
/// patterns; anything else must match exactly.
#[derive(Debug, Clone, Default)]
pub struct Safelist {
    names: FxHashSet<SmolStr>,
    patterns: GlobSet,
    pattern_count: usize,
}

impl Safelist {
    /// Builds a safelist from exact names and glob patterns.
    pub fn new<I, S>(entries: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = FxHashSet::default();
        let mut builder = GlobSetBuilder::new();
        let mut pattern_count = 0;

        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            if entry.contains(['*', '?', '[', '{']) {
                builder.add(Glob::new(entry)?);
                pattern_count += 1;
            } else {
                names.insert(SmolStr::new(entry));
            }
        }

        Ok(Self {
            names,
            patterns: builder.build()?,
            pattern_count,
        })
    }

    /// Returns true if `name` is safelisted.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name) || (self.pattern_count > 0 && self.patterns.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_names() {
        let safelist = Safelist::new(["html", "body"]).unwrap();
        assert!(safelist.contains("html"));
        assert!(!safelist.contains("htm"));
    }

    #[test]
    fn test_patterns() {
        let safelist = Safelist::new(["*-upgraded", "mdc-ripple*"]).unwrap();
        assert!(safelist.contains("mdc-button-upgraded"));
        assert!(safelist.contains("mdc-ripple-surface"));
        assert!(!safelist.contains("mdc-button"));
    }

    #[test]
    fn test_empty() {
        let safelist = Safelist::new(["", "  "]).unwrap();
        assert!(!safelist.contains(""));
        assert!(!Safelist::default().contains("anything"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Safelist::new(["a[b"]).is_err());
    }
}
