//! Command surface for the `fsw` watcher process
//!
//! Requests arrive as JSON lines on stdin; replies and pushes leave as JSON
//! lines on stdout. The watch core lives in the `watcher` crate.

pub mod config;
pub mod daemon;
pub mod ipc;
pub mod protocol;
