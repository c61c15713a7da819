// src/change/state.rs

//! Persistence of "last successful fingerprint" per (project, phase).

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing::info;

/// Relative path (from the workspace root) to the state file.
pub const STATE_FILE_PATH: &str = ".phasegraph/state";

/// Abstract storage for last-successful fingerprints.
///
/// Keys are produced by [`state_key`]. Implementations use interior
/// mutability because the store is shared by concurrently executing runners.
pub trait StateStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, fingerprint: &str) -> Result<()>;
}

/// Key under which an operation's state is stored.
pub fn state_key(project: &str, phase: &str) -> String {
    format!("{project}#{phase}")
}

/// Stores fingerprints in `<root>/.phasegraph/state`, one `key hash` per line.
///
/// Writes are read-modify-write of the whole file, serialized by a mutex.
pub struct FileStateStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            lock: Mutex::new(()),
        }
    }

    fn path(&self) -> PathBuf {
        self.root.join(STATE_FILE_PATH)
    }
}

impl StateStore for FileStateStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("state store lock poisoned"))?;
        let map = load_all(&self.path())?;
        Ok(map.get(key).cloned())
    }

    fn save(&self, key: &str, fingerprint: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| anyhow!("state store lock poisoned"))?;
        let path = self.path();
        let mut map = load_all(&path)?;
        map.insert(key.to_string(), fingerprint.to_string());
        save_all(&path, &map)?;
        info!(key = %key, fingerprint = %fingerprint, "stored operation state (file)");
        Ok(())
    }
}

/// Stores fingerprints in memory only.
#[derive(Default)]
pub struct MemoryStateStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.lock().map_err(|_| anyhow!("state store lock poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn save(&self, key: &str, fingerprint: &str) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| anyhow!("state store lock poisoned"))?;
        map.insert(key.to_string(), fingerprint.to_string());
        info!(key = %key, fingerprint = %fingerprint, "stored operation state (memory)");
        Ok(())
    }
}

fn load_all(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let file = File::open(path).with_context(|| format!("opening state file at {:?}", path))?;
    let reader = BufReader::new(file);

    let mut map = HashMap::new();
    for line_res in reader.lines() {
        let line = line_res?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((key, hash)) = trimmed.split_once(char::is_whitespace) {
            map.insert(key.to_string(), hash.trim().to_string());
        }
    }

    Ok(map)
}

fn save_all(path: &Path, map: &HashMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating state directory at {:?}", parent))?;
    }

    let file = File::create(path).with_context(|| format!("creating state file at {:?}", path))?;
    let mut writer = BufWriter::new(file);

    let mut entries: Vec<_> = map.iter().collect();
    entries.sort();
    for (key, hash) in entries {
        writeln!(writer, "{} {}", key, hash)?;
    }

    writer.flush()?;
    Ok(())
}
