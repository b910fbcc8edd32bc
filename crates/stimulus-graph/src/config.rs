//! Analyzer configuration.
//!
//! Settings come from the optional `analyzer` object of
//! `.stimulus-lsp/config.json` in the project root, then environment
//! overrides.  Every field has a default so an empty project needs no file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, GraphResult};
use crate::query::guards::{clamp_package_files, clamp_workers};

pub const CONFIG_PATH: &str = ".stimulus-lsp/config.json";

pub const ENV_CONTROLLER_ROOTS: &str = "STIMULUS_GRAPH_CONTROLLER_ROOTS";
pub const ENV_MAX_PACKAGE_FILES: &str = "STIMULUS_GRAPH_MAX_PACKAGE_FILES";
pub const ENV_SCAN_WORKERS: &str = "STIMULUS_GRAPH_SCAN_WORKERS";

const DEFAULT_CONTROLLER_ROOTS: &[&str] = &[
    "app/javascript/controllers",
    "app/javascript",
    "app/frontend/controllers",
    "app/frontend/javascript/controllers",
    "app/assets/javascripts/controllers",
    "resources/js/controllers",
    "src/controllers",
];

const DEFAULT_FRAMEWORK_PACKAGES: &[&str] = &["@hotwired/stimulus", "stimulus"];

const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "tmp",
    "log",
    "public",
    "coverage",
    "vendor",
    "builds",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerConfig {
    /// Directories (relative to the project root) holding controller files.
    pub controller_roots: Vec<String>,
    /// Explicit registration entry points; empty means use the defaults.
    pub registration_entry_points: Vec<String>,
    pub framework_packages: Vec<String>,
    pub root_class_name: String,
    /// Bare-specifier prefix to directory mappings, checked before
    /// `node_modules`.
    pub import_aliases: BTreeMap<String, String>,
    pub excluded_dirs: Vec<String>,
    pub max_package_files: usize,
    pub scan_workers: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let mut import_aliases = BTreeMap::new();
        import_aliases.insert(
            "controllers".to_string(),
            DEFAULT_CONTROLLER_ROOTS[0].to_string(),
        );
        Self {
            controller_roots: to_strings(DEFAULT_CONTROLLER_ROOTS),
            registration_entry_points: Vec::new(),
            framework_packages: to_strings(DEFAULT_FRAMEWORK_PACKAGES),
            root_class_name: "Controller".to_string(),
            import_aliases,
            excluded_dirs: to_strings(DEFAULT_EXCLUDED_DIRS),
            max_package_files: 2000,
            scan_workers: 4,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    analyzer: Option<AnalyzerConfig>,
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl AnalyzerConfig {
    /// Load configuration for `root`, applying environment overrides.
    ///
    /// A missing config file is not an error; a malformed one is.
    pub fn load(root: &Path) -> GraphResult<Self> {
        let path = root.join(CONFIG_PATH);
        let mut config = if path.is_file() {
            let content =
                std::fs::read_to_string(&path).map_err(|err| GraphError::io(&path, err))?;
            let file: ConfigFile =
                serde_json::from_str(&content).map_err(|err| GraphError::json(&path, err))?;
            file.analyzer.unwrap_or_default()
        } else {
            AnalyzerConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config.normalized())
    }

    /// Apply `STIMULUS_GRAPH_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> GraphResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_CONTROLLER_ROOTS) {
            let roots: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|root| !root.is_empty())
                .map(str::to_string)
                .collect();
            if !roots.is_empty() {
                self.controller_roots = roots;
            }
        }
        if let Some(raw) = lookup(ENV_MAX_PACKAGE_FILES) {
            self.max_package_files = parse_count(ENV_MAX_PACKAGE_FILES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SCAN_WORKERS) {
            self.scan_workers = parse_count(ENV_SCAN_WORKERS, &raw)?;
        }
        Ok(())
    }

    /// Clamp numeric settings and strip trailing separators from paths.
    pub fn normalized(mut self) -> Self {
        self.max_package_files = clamp_package_files(self.max_package_files as i64);
        self.scan_workers = clamp_workers(self.scan_workers as i64);
        for root in &mut self.controller_roots {
            *root = root.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn is_framework_package(&self, name: &str) -> bool {
        self.framework_packages.iter().any(|package| package == name)
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|dir| dir == name)
    }
}

fn parse_count(key: &str, raw: &str) -> GraphResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| GraphError::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AnalyzerConfig::load(tmp.path()).unwrap();
        assert_eq!(config.root_class_name, "Controller");
        assert!(config.is_framework_package("@hotwired/stimulus"));
        assert!(config.is_excluded_dir("node_modules"));
        assert_eq!(
            config.import_aliases.get("controllers").map(String::as_str),
            Some("app/javascript/controllers")
        );
    }

    #[test]
    fn test_load_analyzer_section() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".stimulus-lsp")).unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_PATH),
            r#"{
                "ignoredControllerIdentifiers": ["x"],
                "analyzer": { "controllerRoots": ["web/controllers/"], "maxPackageFiles": 10 }
            }"#,
        )
        .unwrap();
        let config = AnalyzerConfig::load(tmp.path()).unwrap();
        assert_eq!(config.controller_roots, vec!["web/controllers".to_string()]);
        assert_eq!(config.max_package_files, 10);
        assert_eq!(config.scan_workers, 4);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".stimulus-lsp")).unwrap();
        std::fs::write(tmp.path().join(CONFIG_PATH), "{ not json").unwrap();
        let err = AnalyzerConfig::load(tmp.path()).unwrap_err();
        assert!(matches!(err, GraphError::Json { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_CONTROLLER_ROOTS, "a/controllers, b/controllers"),
            (ENV_SCAN_WORKERS, "0"),
        ]
        .into_iter()
        .collect();
        let mut config = AnalyzerConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        let config = config.normalized();
        assert_eq!(config.controller_roots, vec!["a/controllers", "b/controllers"]);
        assert_eq!(config.scan_workers, 1);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = AnalyzerConfig::default();
        let err = config
            .apply_env_overrides(|key| (key == ENV_MAX_PACKAGE_FILES).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }
}
