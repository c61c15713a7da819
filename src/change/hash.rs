// src/change/hash.rs

//! Content hashing for project fingerprints.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, trace};

/// Directory names never descended into when fingerprinting.
pub const ALWAYS_EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", ".phasegraph"];

/// Compute the hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Compile `fingerprint_exclude` patterns into a matcher.
pub fn build_exclude_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid fingerprint_exclude pattern '{}'", pattern))?;
        builder.add(glob);
    }
    builder.build().context("building fingerprint_exclude matcher")
}

/// List every file under `root` (relative to it), skipping
/// [`ALWAYS_EXCLUDED_DIRS`] and anything matched by `excludes`.
///
/// The result is sorted so that hashing is independent of directory
/// iteration order.
pub fn collect_project_files(root: &Path, excludes: &GlobSet) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![PathBuf::new()];

    while let Some(rel_dir) = stack.pop() {
        let abs_dir = root.join(&rel_dir);
        let entries = fs::read_dir(&abs_dir)
            .with_context(|| format!("reading directory {:?}", abs_dir))?;

        for entry in entries {
            let entry = entry?;
            let rel = rel_dir.join(entry.file_name());
            let file_type = entry.file_type()?;

            if excludes.is_match(&rel) {
                trace!(path = ?rel, "excluded from fingerprint");
                continue;
            }

            if file_type.is_dir() {
                let name = entry.file_name();
                if ALWAYS_EXCLUDED_DIRS.iter().any(|d| name == *d) {
                    continue;
                }
                stack.push(rel);
            } else if file_type.is_file() {
                files.push(rel);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Hash the contents of every fingerprinted file under `root`.
///
/// Both the relative path and the content hash of each file contribute, so
/// renames change the result too.
pub fn compute_tree_hash(root: &Path, excludes: &GlobSet) -> Result<String> {
    let mut hasher = Hasher::new();

    if root.is_dir() {
        for rel in collect_project_files(root, excludes)? {
            let file_hash = compute_file_hash(&root.join(&rel))?;
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            hasher.update(file_hash.as_bytes());
        }
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(root = ?root, hash = %hash, "computed project tree hash");
    Ok(hash)
}

/// Aggregate hash over a list of string parts, each length-prefixed.
pub fn compute_aggregate_hash<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Hasher::new();
    for part in parts {
        let part = part.as_ref();
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
