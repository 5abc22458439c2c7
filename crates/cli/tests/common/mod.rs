//! Common utilities for integration tests

pub mod process;

// Re-export commonly used items
pub use process::FswProcess;
