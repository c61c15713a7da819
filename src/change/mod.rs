// src/change/mod.rs

//! Change detection for incremental builds.
//!
//! - [`hash`] hashes project folders with `blake3`.
//! - [`state`] persists the last successful fingerprint per operation.
//! - [`analyzer`] combines both into the [`ChangeAnalyzer`] used by shell
//!   runners.

pub mod analyzer;
pub mod hash;
pub mod state;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use analyzer::{ChangeAnalyzer, ProjectChangeAnalyzer};
pub use hash::{compute_file_hash, compute_tree_hash};
pub use state::{FileStateStore, MemoryStateStore, StateStore};

/// Opaque summary of an operation's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
