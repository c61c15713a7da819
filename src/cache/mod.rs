// src/cache/mod.rs

//! Build cache: reuse of results recorded by earlier successful operations.
//!
//! Caching is an optimisation only. Callers treat every error coming out of
//! a [`BuildCacheStore`] as a miss (on read) or a warning (on write).

pub mod store;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::BuildCacheSection;
use crate::types::CacheMode;

pub use store::{BuildCacheStore, CachedResult, FileBuildCacheStore, MemoryBuildCacheStore};

/// Default cache directory, relative to the workspace root.
pub const DEFAULT_CACHE_DIR: &str = ".phasegraph/cache";

/// Shared build cache configuration handed to every shell runner.
#[derive(Clone)]
pub struct BuildCacheConfiguration {
    pub mode: CacheMode,
    pub store: Arc<dyn BuildCacheStore>,
}

impl fmt::Debug for BuildCacheConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildCacheConfiguration")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl BuildCacheConfiguration {
    pub fn new(mode: CacheMode, store: Arc<dyn BuildCacheStore>) -> Self {
        Self { mode, store }
    }

    /// Build the configuration for `[settings.build_cache]`.
    pub fn from_settings(root: &Path, section: &BuildCacheSection) -> Self {
        let store: Arc<dyn BuildCacheStore> = match section.mode {
            CacheMode::File => {
                let dir = section.dir.as_deref().unwrap_or(DEFAULT_CACHE_DIR);
                Arc::new(FileBuildCacheStore::new(root.join(dir)))
            }
            CacheMode::Memory => Arc::new(MemoryBuildCacheStore::new()),
        };
        Self::new(section.mode, store)
    }
}
