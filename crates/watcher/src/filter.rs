//! Filter chain deciding which paths may be tracked and reported
//!
//! Rules are evaluated in a fixed order:
//! 1. Hidden files (base name only, cheapest)
//! 2. Exact ignore set (full path equality)
//! 3. Pattern hooks (regex on full path or base name)
//!
//! Rules are additive: a path is excluded if any rule rejects it.

use crate::error::WatchError;
use crate::platform;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A rule that can be registered on a [`FilterChain`]
#[derive(Debug, Clone)]
pub enum FilterRule {
    /// Reject dot-files and dot-directories
    HiddenFiles,
    /// Reject these exact paths (and, during enumeration, their subtrees)
    IgnorePaths(Vec<PathBuf>),
    /// Regex hook
    Pattern(PatternRule),
}

/// Compiled regex hook
///
/// By default a hook admits only paths that match it. With `exclude` set the
/// meaning flips and matching paths are rejected.
#[derive(Debug, Clone)]
pub struct PatternRule {
    regex: Regex,
    full_path: bool,
    exclude: bool,
}

impl PatternRule {
    /// Compile a hook; a malformed pattern fails the registration
    pub fn new(pattern: &str, full_path: bool, exclude: bool) -> Result<Self, WatchError> {
        let regex = Regex::new(pattern).map_err(|source| WatchError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            full_path,
            exclude,
        })
    }

    /// Whether this hook lets `path` through
    pub fn admits(&self, path: &Path) -> bool {
        let matched = if self.full_path {
            self.regex.is_match(&path.to_string_lossy())
        } else {
            path.file_name()
                .map(|name| self.regex.is_match(&name.to_string_lossy()))
                .unwrap_or(false)
        };
        matched != self.exclude
    }
}

/// Ordered set of rejection rules
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    ignore_hidden: bool,
    ignored: HashSet<PathBuf>,
    patterns: Vec<PatternRule>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. Rules never shrink.
    pub fn add_rule(&mut self, rule: FilterRule) {
        match rule {
            FilterRule::HiddenFiles => self.ignore_hidden = true,
            FilterRule::IgnorePaths(paths) => self.ignored.extend(paths),
            FilterRule::Pattern(pattern) => self.patterns.push(pattern),
        }
    }

    /// Whether `path` may appear in a snapshot
    pub fn is_allowed(&self, path: &Path) -> bool {
        if self.is_hidden(path) {
            return false;
        }
        if self.ignored.contains(path) {
            return false;
        }
        self.patterns.iter().all(|pattern| pattern.admits(path))
    }

    /// Whether enumeration should skip `path` and everything below it
    ///
    /// Pattern hooks only reject the entry itself, so a directory failing a
    /// hook is still descended into.
    pub fn prunes(&self, path: &Path) -> bool {
        self.is_hidden(path) || self.ignored.contains(path)
    }

    /// Whether `path` or one of its ancestors is in the ignore set
    pub fn is_ignored(&self, path: &Path) -> bool {
        path.ancestors().any(|p| self.ignored.contains(p))
    }

    /// Get number of active rules
    pub fn active_rules(&self) -> usize {
        let mut count = self.patterns.len();
        if self.ignore_hidden {
            count += 1;
        }
        if !self.ignored.is_empty() {
            count += 1;
        }
        count
    }

    fn is_hidden(&self, path: &Path) -> bool {
        self.ignore_hidden
            && path
                .file_name()
                .map(|name| platform::is_hidden(&name.to_string_lossy()))
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chain_allows_everything() {
        let chain = FilterChain::new();
        assert!(chain.is_allowed(Path::new("/w/.env")));
        assert!(chain.is_allowed(Path::new("/w/src/main.rs")));
        assert_eq!(chain.active_rules(), 0);
    }

    #[test]
    fn test_hidden_rule_checks_base_name_only() {
        let mut chain = FilterChain::new();
        chain.add_rule(FilterRule::HiddenFiles);

        assert!(!chain.is_allowed(Path::new("/w/.env")));
        assert!(chain.prunes(Path::new("/w/.git")));
        // A hidden ancestor does not reject the entry by itself; enumeration prunes it
        assert!(chain.is_allowed(Path::new("/w/.git/config")));
        assert!(chain.is_allowed(Path::new("/w/src/main.rs")));
    }

    #[test]
    fn test_ignore_set_is_exact() {
        let mut chain = FilterChain::new();
        chain.add_rule(FilterRule::IgnorePaths(vec![PathBuf::from("/w/secret.txt")]));

        assert!(!chain.is_allowed(Path::new("/w/secret.txt")));
        assert!(chain.is_allowed(Path::new("/w/secret.txt.bak")));
        assert!(chain.is_ignored(Path::new("/w/secret.txt")));
        assert!(!chain.is_ignored(Path::new("/w/other.txt")));
    }

    #[test]
    fn test_ignored_directory_covers_descendants() {
        let mut chain = FilterChain::new();
        chain.add_rule(FilterRule::IgnorePaths(vec![PathBuf::from("/w/build")]));

        assert!(chain.prunes(Path::new("/w/build")));
        assert!(chain.is_ignored(Path::new("/w/build/out/app")));
    }

    #[test]
    fn test_pattern_hook_admits_matches() {
        let mut chain = FilterChain::new();
        chain.add_rule(FilterRule::Pattern(PatternRule::new(r"\.txt$", false, false).unwrap()));

        assert!(chain.is_allowed(Path::new("/w/a.txt")));
        assert!(!chain.is_allowed(Path::new("/w/a.rs")));
        // Hooks never prune
        assert!(!chain.prunes(Path::new("/w/dir")));
    }

    #[test]
    fn test_pattern_hook_full_path_and_exclude() {
        let full = PatternRule::new(r"^/w/src/", true, false).unwrap();
        assert!(full.admits(Path::new("/w/src/lib.rs")));
        assert!(!full.admits(Path::new("/w/docs/lib.rs")));

        let base_only = PatternRule::new(r"^/w/src/", false, false).unwrap();
        assert!(!base_only.admits(Path::new("/w/src/lib.rs")));

        let exclude = PatternRule::new(r"\.log$", false, true).unwrap();
        assert!(!exclude.admits(Path::new("/w/debug.log")));
        assert!(exclude.admits(Path::new("/w/main.rs")));
    }

    #[test]
    fn test_malformed_pattern_is_config_error() {
        let err = PatternRule::new("([unclosed", false, false).unwrap_err();
        assert!(matches!(err, WatchError::InvalidPattern { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_rules_are_additive() {
        let mut chain = FilterChain::new();
        chain.add_rule(FilterRule::HiddenFiles);
        chain.add_rule(FilterRule::IgnorePaths(vec![PathBuf::from("/w/a.txt")]));
        chain.add_rule(FilterRule::Pattern(PatternRule::new(r"\.tmp$", false, true).unwrap()));

        assert_eq!(chain.active_rules(), 3);
        assert!(!chain.is_allowed(Path::new("/w/.hidden")));
        assert!(!chain.is_allowed(Path::new("/w/a.txt")));
        assert!(!chain.is_allowed(Path::new("/w/x.tmp")));
        assert!(chain.is_allowed(Path::new("/w/b.txt")));
    }
}
