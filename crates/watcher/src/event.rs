//! Change events produced by a snapshot diff

use crate::entry::WatchedEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Kind of transition observed between two ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Create,
    Write,
    Remove,
    Rename,
    Move,
    Chmod,
}

impl Op {
    /// Emission order within a tick: removals and moves first, so a consumer
    /// never sees a Create for a path that is about to be reported gone
    pub fn rank(self) -> u8 {
        match self {
            Op::Remove => 0,
            Op::Rename => 1,
            Op::Move => 2,
            Op::Create => 3,
            Op::Write => 4,
            Op::Chmod => 5,
        }
    }
}

/// A single change, emitted fire-and-forget to the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub op: Op,
    pub entry: WatchedEntry,
    /// Previous path, set only for Rename/Move
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<PathBuf>,
}

impl Event {
    pub fn new(op: Op, entry: WatchedEntry) -> Self {
        Self {
            op,
            entry,
            old_path: None,
        }
    }

    pub fn moved(entry: WatchedEntry, old_path: PathBuf) -> Self {
        Self {
            op: Op::Move,
            entry,
            old_path: Some(old_path),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.entry.path
    }
}

/// Restricts which ops reach the consumer; empty admits everything
#[derive(Debug, Clone, Default)]
pub struct OpFilter {
    ops: HashSet<Op>,
}

impl OpFilter {
    pub fn new(ops: impl IntoIterator<Item = Op>) -> Self {
        Self {
            ops: ops.into_iter().collect(),
        }
    }

    /// `rename` and `move` are one class: pairing only ever yields Move
    pub fn admits(&self, op: Op) -> bool {
        if self.ops.is_empty() || self.ops.contains(&op) {
            return true;
        }
        match op {
            Op::Move => self.ops.contains(&Op::Rename),
            Op::Rename => self.ops.contains(&Op::Move),
            _ => false,
        }
    }
}
