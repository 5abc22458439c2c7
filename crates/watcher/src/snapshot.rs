//! Point-in-time snapshots of watched roots and the diff between two of them

use crate::entry::{FileIdentity, WatchedEntry};
use crate::error::WatchError;
use crate::event::{Event, Op};
use crate::filter::FilterChain;
use crate::roots::{WatchRoot, WatchSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// How a Remove and a Create within the same tick are recognised as one move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePairing {
    /// Same device + inode, plus size and mtime for files; falls back to
    /// `Metadata` where the platform has no file identity
    #[default]
    Identity,
    /// Same kind, size, mode and mtime (a rename preserves all four)
    Metadata,
    /// Never pair; removes and creates are reported separately
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PairKey {
    /// Inodes are reused as soon as they are freed, so files also carry the
    /// size and mtime a rename leaves untouched
    Identity {
        identity: FileIdentity,
        is_dir: bool,
        content: Option<(u64, DateTime<Utc>)>,
    },
    Metadata {
        is_dir: bool,
        size: u64,
        mode: u32,
        mod_time: DateTime<Utc>,
    },
}

impl MovePairing {
    fn key(self, entry: &WatchedEntry) -> Option<PairKey> {
        let metadata = || PairKey::Metadata {
            is_dir: entry.is_dir,
            size: entry.size,
            mode: entry.mode,
            mod_time: entry.mod_time,
        };

        match self {
            MovePairing::Off => None,
            MovePairing::Identity => Some(
                entry
                    .identity
                    .map(|identity| PairKey::Identity {
                        identity,
                        is_dir: entry.is_dir,
                        content: (!entry.is_dir).then_some((entry.size, entry.mod_time)),
                    })
                    .unwrap_or_else(metadata),
            ),
            MovePairing::Metadata => Some(metadata()),
        }
    }
}

/// Complete state of every watched path at one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Ordered so that diffs and listings are deterministic
    entries: BTreeMap<PathBuf, WatchedEntry>,
}

impl Snapshot {
    /// Enumerate every root through the filter chain
    ///
    /// Fails only when a root itself cannot be read; unreadable entries below
    /// a root are skipped.
    pub fn build(roots: &WatchSet, filters: &FilterChain) -> Result<Self, WatchError> {
        let mut snapshot = Snapshot::default();
        for root in roots.iter() {
            snapshot.scan_root(&root, filters)?;
        }
        Ok(snapshot)
    }

    /// Add the entries of a single root
    ///
    /// Recursive roots walk the subtree; single-level roots yield the root
    /// plus its direct children.
    pub fn scan_root(&mut self, root: &WatchRoot, filters: &FilterChain) -> Result<(), WatchError> {
        let max_depth = if root.recursive { usize::MAX } else { 1 };

        let walker = WalkDir::new(&root.path)
            .follow_links(false)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| !filters.prunes(e.path()));

        for item in walker {
            let dir_entry = match item {
                Ok(dir_entry) => dir_entry,
                Err(err) if err.depth() == 0 => {
                    return Err(WatchError::RootUnavailable {
                        path: root.path.clone(),
                        source: err.into(),
                    });
                }
                Err(err) => {
                    debug!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };

            if !filters.is_allowed(dir_entry.path()) {
                continue;
            }

            match dir_entry.metadata() {
                Ok(meta) => {
                    let path = dir_entry.path();
                    self.entries
                        .insert(path.to_path_buf(), WatchedEntry::from_metadata(path, &meta));
                }
                Err(err) if dir_entry.depth() == 0 => {
                    return Err(WatchError::RootUnavailable {
                        path: root.path.clone(),
                        source: err.into(),
                    });
                }
                Err(err) => {
                    // Vanished between listing and stat
                    debug!("Skipping {}: {}", dir_entry.path().display(), err);
                }
            }
        }

        Ok(())
    }

    /// Events turning `self` (previous tick) into `current`
    ///
    /// Directories never report Write. Output is sorted by op rank, then path.
    pub fn diff(&self, current: &Snapshot, pairing: MovePairing) -> Vec<Event> {
        let mut events = Vec::new();
        let mut removed: Vec<&WatchedEntry> = Vec::new();
        let mut created: Vec<&WatchedEntry> = Vec::new();

        for (path, old) in &self.entries {
            match current.entries.get(path) {
                None => removed.push(old),
                Some(new) if new.is_dir != old.is_dir => {
                    removed.push(old);
                    created.push(new);
                }
                Some(new) => {
                    if !new.is_dir && new.content_changed(old) {
                        events.push(Event::new(Op::Write, new.clone()));
                    } else if new.mode_changed(old) {
                        events.push(Event::new(Op::Chmod, new.clone()));
                    }
                }
            }
        }

        created.extend(
            current
                .entries
                .iter()
                .filter(|(path, _)| !self.entries.contains_key(*path))
                .map(|(_, entry)| entry),
        );
        created.sort_by(|a, b| a.path.cmp(&b.path));

        let mut candidates: HashMap<PairKey, VecDeque<usize>> = HashMap::new();
        for (idx, entry) in created.iter().enumerate() {
            if let Some(key) = pairing.key(entry) {
                candidates.entry(key).or_default().push_back(idx);
            }
        }

        let mut paired = vec![false; created.len()];
        for old in removed {
            let slot = pairing
                .key(old)
                .and_then(|key| candidates.get_mut(&key))
                .and_then(|queue| queue.pop_front());

            match slot {
                Some(idx) => {
                    paired[idx] = true;
                    events.push(Event::moved(created[idx].clone(), old.path.clone()));
                }
                None => events.push(Event::new(Op::Remove, old.clone())),
            }
        }

        for (idx, entry) in created.iter().enumerate() {
            if !paired[idx] {
                events.push(Event::new(Op::Create, (*entry).clone()));
            }
        }

        events.sort_by(|a, b| {
            a.op.rank()
                .cmp(&b.op.rank())
                .then_with(|| a.path().cmp(b.path()))
        });
        events
    }

    /// Merge entries from another snapshot, replacing duplicates
    pub fn merge(&mut self, other: Snapshot) {
        self.entries.extend(other.entries);
    }

    /// Keep only the paths for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        self.entries.retain(|path, _| keep(path));
    }

    #[cfg(test)]
    pub fn get(&self, path: &Path) -> Option<&WatchedEntry> {
        self.entries.get(path)
    }

    #[cfg(test)]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    #[cfg(test)]
    pub fn entries(&self) -> impl Iterator<Item = &WatchedEntry> {
        self.entries.values()
    }

    /// Entries in path order
    pub fn to_vec(&self) -> Vec<WatchedEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
