//! Metadata recorded for every watched path

use crate::platform;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Platform file identity (device + inode on unix)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub device: u64,
    pub inode: u64,
}

/// Last-known state of a single watched file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedEntry {
    /// Absolute path (snapshot key)
    pub path: PathBuf,
    /// Base name of `path`
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    /// Permission bits
    pub mode: u32,
    /// Used for move pairing only, never sent over the wire
    #[serde(skip)]
    pub identity: Option<FileIdentity>,
}

impl WatchedEntry {
    /// Build an entry from `lstat`-style metadata
    pub fn from_metadata(path: &Path, meta: &Metadata) -> Self {
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        Self {
            path: path.to_path_buf(),
            name: base_name(path),
            is_dir: meta.is_dir(),
            size: meta.len(),
            mod_time: DateTime::<Utc>::from(modified),
            mode: platform::mode(meta),
            identity: platform::identity(meta),
        }
    }

    /// Content changed between two observations of the same path
    pub fn content_changed(&self, other: &WatchedEntry) -> bool {
        self.size != other.size || self.mod_time != other.mod_time
    }

    /// Permission bits changed between two observations of the same path
    pub fn mode_changed(&self, other: &WatchedEntry) -> bool {
        self.mode != other.mode
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
