//! Polling file system watcher
//!
//! This crate provides the watch core used by the `fsw` process:
//! - Snapshots of watched roots (recursive or single level)
//! - Snapshot diffing into typed events, with move pairing
//! - Filter chain (hidden files, ignore set, regex hooks)
//! - A poll engine that runs the tick loop on tokio

pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod event;
pub mod filter;
pub mod platform;
pub mod roots;
pub mod snapshot;

// Re-exports
pub use config::{FilterHook, WatchConfig};
pub use engine::{EngineStatus, PollEngine, Signal, WatchState};
pub use entry::{FileIdentity, WatchedEntry};
pub use error::{ErrorKind, WatchError};
pub use event::{Event, Op, OpFilter};
pub use filter::{FilterChain, FilterRule, PatternRule};
pub use roots::{WatchRoot, WatchSet};
pub use snapshot::{MovePairing, Snapshot};

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;
