//! Platform-specific metadata helpers

use crate::entry::FileIdentity;
use std::fs::Metadata;

/// Device + inode pair for the file behind `meta`
#[cfg(unix)]
pub fn identity(meta: &Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;

    Some(FileIdentity {
        device: meta.dev(),
        inode: meta.ino(),
    })
}

/// No stable identity is exposed through std on this platform
#[cfg(not(unix))]
pub fn identity(_meta: &Metadata) -> Option<FileIdentity> {
    None
}

/// Permission bits as reported by the OS
#[cfg(unix)]
pub fn mode(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    meta.permissions().mode()
}

/// Synthesized permission bits (read-only flag only)
#[cfg(not(unix))]
pub fn mode(meta: &Metadata) -> u32 {
    let base = if meta.permissions().readonly() { 0o444 } else { 0o666 };
    if meta.is_dir() {
        base | 0o111
    } else {
        base
    }
}

/// Dot-files are hidden; `.` and `..` are not names
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}
