// src/workspace/project.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Result of looking a script up in a project.
///
/// The four states are kept apart on purpose: a missing or null script may be
/// a configuration error, an empty one is an explicit no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLookup<'a> {
    /// No key for this script.
    Missing,
    /// The key exists with a `null` value.
    Null,
    /// The key exists with an empty string.
    Empty,
    Command(&'a str),
}

/// A buildable unit of the monorepo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    /// Absolute project folder; processes run with this as their cwd.
    pub folder: PathBuf,
    /// Local projects this one depends on directly.
    pub dependencies: BTreeSet<String>,
    pub scripts: BTreeMap<String, Option<String>>,
}

impl Project {
    pub fn new(name: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            dependencies: BTreeSet::new(),
            scripts: BTreeMap::new(),
        }
    }

    pub fn script(&self, script_name: &str) -> ScriptLookup<'_> {
        match self.scripts.get(script_name) {
            None => ScriptLookup::Missing,
            Some(None) => ScriptLookup::Null,
            Some(Some(cmd)) if cmd.is_empty() => ScriptLookup::Empty,
            Some(Some(cmd)) => ScriptLookup::Command(cmd.as_str()),
        }
    }
}
