//! Package manifest (`package.json`) reading and entry-point selection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{GraphError, GraphResult};
use crate::indexer::imports::probe_file;

pub const MANIFEST_NAME: &str = "package.json";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub main: Option<String>,
    pub module: Option<String>,
    pub exports: Option<serde_json::Value>,
    pub dependencies: BTreeMap<String, String>,
    pub peer_dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Read `<dir>/package.json`.  `Ok(None)` when the file does not exist.
    pub fn read(dir: &Path) -> GraphResult<Option<Self>> {
        let path = dir.join(MANIFEST_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|err| GraphError::io(&path, err))?;
        let manifest = serde_json::from_str(&content).map_err(|err| GraphError::json(&path, err))?;
        Ok(Some(manifest))
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.peer_dependencies.contains_key(name)
    }

    /// Entry-point candidates in preference order: `module`, `main`, then
    /// the root `exports` target.
    pub fn entry_candidates(&self) -> Vec<String> {
        let mut candidates = Vec::new();
        candidates.extend(self.module.clone());
        candidates.extend(self.main.clone());
        if let Some(exports) = &self.exports {
            candidates.extend(root_export_target(exports));
        }
        candidates
    }
}

fn root_export_target(exports: &serde_json::Value) -> Option<String> {
    match exports {
        serde_json::Value::String(target) => Some(target.clone()),
        serde_json::Value::Object(map) => match map.get(".") {
            Some(root) => conditional_target(root),
            None => conditional_target(exports),
        },
        _ => None,
    }
}

fn conditional_target(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(target) => Some(target.clone()),
        serde_json::Value::Object(map) => ["import", "module", "browser", "default", "require"]
            .iter()
            .find_map(|condition| map.get(*condition).and_then(conditional_target)),
        _ => None,
    }
}

/// Resolve the entry file of the package rooted at `root`.
pub fn resolve_entry_point(root: &Path, manifest: Option<&PackageManifest>) -> Option<PathBuf> {
    manifest
        .map(PackageManifest::entry_candidates)
        .unwrap_or_default()
        .iter()
        .find_map(|candidate| probe_file(&root.join(candidate)))
        .or_else(|| probe_file(&root.join("index")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_entry_prefers_module_over_main() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "package.json",
            r#"{"name":"pkg","main":"dist/index.cjs","module":"dist/index.mjs"}"#,
        );
        write(tmp.path(), "dist/index.cjs", "");
        write(tmp.path(), "dist/index.mjs", "");
        let manifest = PackageManifest::read(tmp.path()).unwrap();
        assert_eq!(
            resolve_entry_point(tmp.path(), manifest.as_ref()),
            Some(tmp.path().join("dist/index.mjs"))
        );
    }

    #[test]
    fn test_entry_from_conditional_exports() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "package.json",
            r#"{"exports":{".":{"import":"./esm/main.js","require":"./cjs/main.js"}}}"#,
        );
        write(tmp.path(), "esm/main.js", "");
        let manifest = PackageManifest::read(tmp.path()).unwrap();
        assert_eq!(
            resolve_entry_point(tmp.path(), manifest.as_ref()),
            Some(tmp.path().join("esm/main.js"))
        );
    }

    #[test]
    fn test_entry_falls_back_to_index() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "index.js", "");
        assert_eq!(
            resolve_entry_point(tmp.path(), None),
            Some(tmp.path().join("index.js"))
        );
    }

    #[test]
    fn test_manifest_dependencies() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "package.json",
            r#"{"dependencies":{"a":"1"},"peerDependencies":{"@hotwired/stimulus":"^3"}}"#,
        );
        let manifest = PackageManifest::read(tmp.path()).unwrap().unwrap();
        assert!(manifest.depends_on("@hotwired/stimulus"));
        assert!(manifest.depends_on("a"));
        assert!(!manifest.depends_on("b"));
    }

    #[test]
    fn test_invalid_manifest_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "package.json", "{");
        assert!(PackageManifest::read(tmp.path()).is_err());
    }
}
