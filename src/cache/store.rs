// src/cache/store.rs

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::change::Fingerprint;

/// What a successful operation leaves behind for later reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResult {
    pub project: String,
    pub phase: String,
    pub exit_code: i32,
    /// Combined stdout/stderr captured when the entry was produced.
    pub output: String,
}

/// Fingerprint-keyed store of [`CachedResult`]s.
///
/// Each fingerprint is unique to one (project, phase, inputs) combination,
/// so concurrent writes from different operations never share a key.
pub trait BuildCacheStore: Send + Sync {
    fn try_restore(&self, fingerprint: &Fingerprint) -> Result<Option<CachedResult>>;
    fn store(&self, fingerprint: &Fingerprint, result: &CachedResult) -> Result<()>;
}

/// One JSON file per fingerprint under `dir`.
pub struct FileBuildCacheStore {
    dir: PathBuf,
}

impl FileBuildCacheStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint.as_str()))
    }
}

impl BuildCacheStore for FileBuildCacheStore {
    fn try_restore(&self, fingerprint: &Fingerprint) -> Result<Option<CachedResult>> {
        let path = self.entry_path(fingerprint);
        if !path.is_file() {
            debug!(%fingerprint, "build cache miss (file)");
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading cache entry {:?}", path))?;
        let entry: CachedResult = serde_json::from_str(&contents)
            .with_context(|| format!("parsing cache entry {:?}", path))?;
        debug!(%fingerprint, "build cache hit (file)");
        Ok(Some(entry))
    }

    fn store(&self, fingerprint: &Fingerprint, result: &CachedResult) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating cache directory {:?}", self.dir))?;

        // Write next to the final path, then rename, so readers never observe
        // a partially written entry.
        let path = self.entry_path(fingerprint);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(result).context("serializing cache entry")?;
        fs::write(&tmp, contents).with_context(|| format!("writing cache entry {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("moving cache entry to {:?}", path))?;

        info!(%fingerprint, project = %result.project, phase = %result.phase, "stored build cache entry (file)");
        Ok(())
    }
}

/// Keeps cache entries in memory only.
#[derive(Default)]
pub struct MemoryBuildCacheStore {
    entries: Mutex<HashMap<Fingerprint, CachedResult>>,
}

impl MemoryBuildCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BuildCacheStore for MemoryBuildCacheStore {
    fn try_restore(&self, fingerprint: &Fingerprint) -> Result<Option<CachedResult>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("build cache lock poisoned"))?;
        Ok(entries.get(fingerprint).cloned())
    }

    fn store(&self, fingerprint: &Fingerprint, result: &CachedResult) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("build cache lock poisoned"))?;
        entries.insert(fingerprint.clone(), result.clone());
        info!(%fingerprint, project = %result.project, phase = %result.phase, "stored build cache entry (memory)");
        Ok(())
    }
}
