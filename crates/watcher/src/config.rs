//! Start-up configuration for a watcher

use crate::error::WatchError;
use crate::event::{Op, OpFilter};
use crate::filter::{FilterChain, FilterRule, PatternRule};
use crate::snapshot::MovePairing;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Watch configuration
///
/// Field names follow the start payload of the command channel. The older
/// single-path form (`path`, `interval`, `filters`) is accepted as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    /// Roots to watch
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Single root (legacy form of `paths`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Watch roots recursively (default: false)
    #[serde(default)]
    pub recursive: bool,

    /// Poll interval; must be positive
    #[serde(alias = "interval")]
    pub interval_millis: i64,

    /// Skip dot-files (default: false)
    #[serde(default)]
    pub ignore_hidden_files: bool,

    /// Exact paths to ignore
    #[serde(default)]
    pub ignore_paths: Vec<PathBuf>,

    /// Regex hooks
    #[serde(default)]
    pub filter_hooks: Vec<FilterHook>,

    /// Only emit these ops (empty: all)
    #[serde(default, alias = "filters")]
    pub op_filters: Vec<Op>,

    /// Move pairing heuristic (default: identity)
    #[serde(default)]
    pub move_pairing: MovePairing,
}

/// Regex hook as sent by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterHook {
    #[serde(alias = "reg")]
    pub pattern: String,

    /// Match against the full path instead of the base name
    #[serde(default)]
    pub use_full_path: bool,

    /// Reject matching paths instead of admitting only them
    #[serde(default)]
    pub exclude: bool,
}

impl WatchConfig {
    /// Parse a JSON start payload
    pub fn from_json(text: &str) -> Result<Self, WatchError> {
        serde_json::from_str(text).map_err(|e| WatchError::Config(e.to_string()))
    }

    /// Poll interval, rejecting zero and negative values
    pub fn interval(&self) -> Result<Duration, WatchError> {
        if self.interval_millis <= 0 {
            return Err(WatchError::InvalidInterval(self.interval_millis));
        }
        Ok(Duration::from_millis(self.interval_millis as u64))
    }

    /// All roots, legacy `path` first
    pub fn roots(&self) -> Vec<PathBuf> {
        self.path
            .iter()
            .chain(self.paths.iter())
            .cloned()
            .collect()
    }

    /// Compile the filter chain; fails on the first malformed pattern
    ///
    /// Ignore paths are kept as given here; the watch state makes them
    /// absolute when it registers them.
    pub fn filter_chain(&self) -> Result<FilterChain, WatchError> {
        let mut chain = FilterChain::new();
        if self.ignore_hidden_files {
            chain.add_rule(FilterRule::HiddenFiles);
        }
        for hook in &self.filter_hooks {
            let rule = PatternRule::new(&hook.pattern, hook.use_full_path, hook.exclude)?;
            chain.add_rule(FilterRule::Pattern(rule));
        }
        Ok(chain)
    }

    pub fn op_filter(&self) -> OpFilter {
        OpFilter::new(self.op_filters.iter().copied())
    }

    /// Validate everything that can be checked without touching the file system
    pub fn validate(&self) -> Result<(), WatchError> {
        self.interval()?;
        self.filter_chain()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatchConfig::from_json(r#"{"paths": ["/tmp/w"], "intervalMillis": 100}"#).unwrap();

        assert!(!config.recursive);
        assert!(!config.ignore_hidden_files);
        assert!(config.ignore_paths.is_empty());
        assert!(config.filter_hooks.is_empty());
        assert!(config.op_filters.is_empty());
        assert_eq!(config.move_pairing, MovePairing::Identity);
        assert_eq!(config.interval().unwrap(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_legacy_field_names() {
        let config = WatchConfig::from_json(
            r#"{
                "path": "/home/me/Documents",
                "interval": 250,
                "recursive": true,
                "filters": ["create", "write"],
                "filterHooks": [{"reg": "\\.md$", "useFullPath": false}]
            }"#,
        )
        .unwrap();

        assert_eq!(config.roots(), vec![PathBuf::from("/home/me/Documents")]);
        assert_eq!(config.interval_millis, 250);
        assert_eq!(config.op_filters, vec![Op::Create, Op::Write]);
        assert_eq!(config.filter_hooks[0].pattern, "\\.md$");
        assert!(!config.op_filter().admits(Op::Remove));
    }

    #[test]
    fn test_non_positive_interval_rejected() {
        for interval in [0, -5] {
            let config = WatchConfig::from_json(&format!(
                r#"{{"paths": ["/tmp/w"], "intervalMillis": {}}}"#,
                interval
            ))
            .unwrap();
            let err = config.validate().unwrap_err();
            assert!(matches!(err, WatchError::InvalidInterval(_)));
        }
    }

    #[test]
    fn test_missing_interval_is_config_error() {
        let err = WatchConfig::from_json(r#"{"paths": ["/tmp/w"]}"#).unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
    }

    #[test]
    fn test_bad_hook_fails_validation() {
        let config = WatchConfig::from_json(
            r#"{"paths": ["/tmp/w"], "intervalMillis": 10, "filterHooks": [{"pattern": "(["}]}"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate().unwrap_err(),
            WatchError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn test_roots_can_be_added_later() {
        let config = WatchConfig::from_json(r#"{"intervalMillis": 10}"#).unwrap();
        assert!(config.roots().is_empty());
        assert!(config.validate().is_ok());
    }
}
