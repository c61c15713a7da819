// src/config/package_json.rs

//! Minimal `package.json` reader used for project scripts and local
//! dependencies.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::Result;

pub const PACKAGE_JSON: &str = "package.json";

/// The parts of a `package.json` that the workspace model consumes.
///
/// Script values are `Option<String>` so that `"build": null` stays
/// distinguishable from a missing key and from `"build": ""`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub scripts: BTreeMap<String, Option<String>>,

    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageJson {
    /// Names of every declared dependency, regular and dev.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .map(|s| s.as_str())
    }
}

/// Read `<folder>/package.json`, returning `None` if it does not exist.
pub fn read_package_json(folder: &Path) -> Result<Option<PackageJson>> {
    let path = folder.join(PACKAGE_JSON);
    if !path.is_file() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path)?;
    let parsed: PackageJson = serde_json::from_str(&contents)?;
    Ok(Some(parsed))
}
