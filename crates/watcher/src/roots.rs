//! Watch set: which roots are watched and how deep

use crate::error::WatchError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A user-registered root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    pub path: PathBuf,
    /// Walk the whole subtree instead of direct children only
    pub recursive: bool,
}

/// Set of watched roots keyed by absolute path
#[derive(Debug, Clone, Default)]
pub struct WatchSet {
    roots: BTreeMap<PathBuf, bool>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root. Idempotent; a recursive registration upgrades an
    /// existing single-level root but never the other way round.
    ///
    /// Returns true if the set changed.
    pub fn insert(&mut self, root: WatchRoot) -> bool {
        match self.roots.get_mut(&root.path) {
            Some(recursive) if *recursive || !root.recursive => false,
            Some(recursive) => {
                *recursive = true;
                true
            }
            None => {
                self.roots.insert(root.path, root.recursive);
                true
            }
        }
    }

    /// Unregister exactly this root
    pub fn remove(&mut self, path: &Path) -> Result<WatchRoot, WatchError> {
        self.roots
            .remove(path)
            .map(|recursive| WatchRoot {
                path: path.to_path_buf(),
                recursive,
            })
            .ok_or_else(|| WatchError::NotWatched(path.to_path_buf()))
    }

    /// Unregister this root and every root below it
    pub fn remove_recursive(&mut self, path: &Path) -> Result<Vec<WatchRoot>, WatchError> {
        let doomed: Vec<PathBuf> = self
            .roots
            .keys()
            .filter(|root| root.starts_with(path))
            .cloned()
            .collect();

        if doomed.is_empty() {
            return Err(WatchError::NotWatched(path.to_path_buf()));
        }

        Ok(doomed
            .into_iter()
            .filter_map(|root| {
                self.roots
                    .remove(&root)
                    .map(|recursive| WatchRoot { path: root, recursive })
            })
            .collect())
    }

    /// Roots in path order
    pub fn iter(&self) -> impl Iterator<Item = WatchRoot> + '_ {
        self.roots.iter().map(|(path, recursive)| WatchRoot {
            path: path.clone(),
            recursive: *recursive,
        })
    }

    /// Whether some root would enumerate `path`
    pub fn covers(&self, path: &Path) -> bool {
        self.roots.iter().any(|(root, recursive)| {
            path == root
                || (*recursive && path.starts_with(root))
                || (!*recursive && path.parent() == Some(root.as_path()))
        })
    }

    #[cfg(test)]
    pub fn contains(&self, path: &Path) -> bool {
        self.roots.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Make `path` absolute without touching the file system
pub fn absolute(path: &Path) -> Result<PathBuf, WatchError> {
    std::path::absolute(path).map_err(|source| WatchError::NotFound {
        path: path.to_path_buf(),
        source,
    })
}

/// Absolute form of `path`, which must exist
pub fn resolve(path: &Path) -> Result<PathBuf, WatchError> {
    let path = absolute(path)?;
    fs::symlink_metadata(&path).map_err(|source| WatchError::NotFound {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
