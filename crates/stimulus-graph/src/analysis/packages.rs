//! Package discovery: installed dependencies that may ship controllers.
//!
//! Candidates come from the host manifest's runtime `dependencies`, not from
//! imports, so a package shows up before the application uses it.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::analysis::identifiers::{dasherize, package_identifier};
use crate::analysis::inheritance::{InheritanceResolver, ResolvedReference};
use crate::indexer::filesystem::{detect_language, relative_posix};
use crate::indexer::graph::DeclarationGraph;
use crate::indexer::imports::find_package_root;
use crate::indexer::manifest::{resolve_entry_point, PackageManifest};
use crate::models::{DetectedPackage, ExportTarget, ModuleResolution, PackageExport};

#[derive(Clone, Debug)]
pub struct PackageCandidate {
    pub name: String,
    pub root: PathBuf,
    pub version: Option<String>,
    pub entry_point: Option<PathBuf>,
}

/// A dependency plausibly exposes controllers when it depends on (or
/// peer-depends on) a framework package, or carries "stimulus" in its name.
fn is_plausible(name: &str, manifest: Option<&PackageManifest>, framework_packages: &[String]) -> bool {
    name.contains("stimulus")
        || manifest.is_some_and(|manifest| {
            framework_packages
                .iter()
                .any(|framework| manifest.depends_on(framework))
        })
}

/// Read the host manifest under `root` and locate candidate packages.
pub fn discover_candidates(root: &Path, framework_packages: &[String]) -> Vec<PackageCandidate> {
    let host = match PackageManifest::read(root) {
        Ok(Some(manifest)) => manifest,
        Ok(None) => return Vec::new(),
        Err(err) => {
            warn!(error = %err, "host package manifest unreadable; skipping package discovery");
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    for name in host.dependencies.keys() {
        if framework_packages.iter().any(|framework| framework == name) {
            continue;
        }
        let Some(package_root) = find_package_root(root, name) else {
            debug!(package = %name, "declared dependency is not installed");
            continue;
        };
        let manifest = match PackageManifest::read(&package_root) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(package = %name, error = %err, "package manifest unreadable");
                None
            }
        };
        if !is_plausible(name, manifest.as_ref(), framework_packages) {
            continue;
        }
        candidates.push(PackageCandidate {
            name: name.clone(),
            version: manifest.as_ref().and_then(|m| m.version.clone()),
            entry_point: resolve_entry_point(&package_root, manifest.as_ref()),
            root: package_root,
        });
    }
    debug!(count = candidates.len(), "package candidates");
    candidates
}

/// Names exported by `path`, expanding `export *` one hop.
fn exported_names(graph: &DeclarationGraph, path: &Path) -> Vec<String> {
    let Some(file) = graph.file(path) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for export in &file.exports {
        match &export.target {
            ExportTarget::Star { source } => {
                if let Some(ModuleResolution::Resolved(target)) = graph.resolution(path, source) {
                    if let Some(target_file) = graph.file(target) {
                        names.extend(
                            target_file
                                .exports
                                .iter()
                                .map(|e| e.exported.clone())
                                .filter(|name| name != "default" && name != "*"),
                        );
                    }
                }
            }
            _ => names.push(export.exported.clone()),
        }
    }
    let mut seen = std::collections::HashSet::new();
    names.retain(|name| seen.insert(name.clone()));
    names
}

fn export_identifier(candidate: &PackageCandidate, exported: &str, class_path: &Path) -> String {
    let rel = relative_posix(class_path, &candidate.root).unwrap_or_default();
    let stem = Path::new(&rel)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    if stem == "index" && exported != "default" {
        let base = exported.strip_suffix("Controller").unwrap_or(exported);
        return dasherize(base).trim_start_matches('-').to_string();
    }
    package_identifier(&candidate.name, &rel)
}

/// Describe one candidate using the already linked graph.
pub fn describe_package(
    candidate: &PackageCandidate,
    graph: &DeclarationGraph,
    resolver: &InheritanceResolver<'_>,
) -> DetectedPackage {
    let mut controller_exports = Vec::new();
    if let Some(entry) = candidate
        .entry_point
        .as_ref()
        .filter(|entry| detect_language(entry).is_some())
    {
        for exported in exported_names(graph, entry) {
            let ResolvedReference::Class(class) = resolver.resolve_export_of(entry, &exported) else {
                continue;
            };
            if !resolver.chain(&class).is_complete() {
                continue;
            }
            let identifier = export_identifier(candidate, &exported, &class.path);
            controller_exports.push(PackageExport {
                exported,
                class,
                identifier,
            });
        }
    }

    let files = graph
        .files()
        .filter(|file| file.path.starts_with(&candidate.root))
        .map(|file| file.path.clone())
        .collect();

    DetectedPackage {
        name: candidate.name.clone(),
        root: candidate.root.clone(),
        version: candidate.version.clone(),
        entry_point: candidate.entry_point.clone(),
        controller_exports,
        files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::graph::LinkOptions;
    use crate::indexer::imports::ResolveOptions;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn frameworks() -> Vec<String> {
        vec!["@hotwired/stimulus".to_string(), "stimulus".to_string()]
    }

    fn fixture(root: &Path) {
        write(
            root,
            "package.json",
            r#"{"dependencies":{"@hotwired/stimulus":"^3","lodash":"4","tailwindcss-stimulus-components":"4","ghost":"1"}}"#,
        );
        write(root, "node_modules/lodash/package.json", r#"{"name":"lodash","main":"index.js"}"#);
        write(root, "node_modules/lodash/index.js", "export default {}");
        write(
            root,
            "node_modules/tailwindcss-stimulus-components/package.json",
            r#"{"name":"tailwindcss-stimulus-components","version":"4.0.1","module":"src/index.js"}"#,
        );
        write(
            root,
            "node_modules/tailwindcss-stimulus-components/src/index.js",
            r#"export { default as Dropdown } from "./dropdown"
export { default as Modal } from "./modal"
export const helper = () => {}"#,
        );
        write(
            root,
            "node_modules/tailwindcss-stimulus-components/src/dropdown.js",
            r#"import { Controller } from "@hotwired/stimulus"
export default class extends Controller { static targets = ["menu"] }"#,
        );
        write(
            root,
            "node_modules/tailwindcss-stimulus-components/src/modal.js",
            "export default class Modal {}",
        );
    }

    #[test]
    fn test_discover_candidates_filters_and_skips_missing() {
        let tmp = tempfile::tempdir().unwrap();
        fixture(tmp.path());
        let candidates = discover_candidates(tmp.path(), &frameworks());
        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["tailwindcss-stimulus-components"]);
        assert_eq!(candidates[0].version.as_deref(), Some("4.0.1"));
        assert_eq!(
            candidates[0].entry_point,
            Some(tmp.path().join("node_modules/tailwindcss-stimulus-components/src/index.js"))
        );
    }

    #[test]
    fn test_describe_package_keeps_only_controller_exports() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fixture(root);
        let candidates = discover_candidates(root, &frameworks());
        let mut graph = DeclarationGraph::new();
        let options = LinkOptions {
            resolve: ResolveOptions::new(root.to_path_buf(), Vec::new(), frameworks()),
            max_package_files: 50,
            workers: 1,
        };
        graph.load_and_link(vec![candidates[0].entry_point.clone().unwrap()], &options);

        let resolver = InheritanceResolver::new(&graph, "Controller");
        let package = describe_package(&candidates[0], &graph, &resolver);
        assert_eq!(package.controller_exports.len(), 1);
        assert_eq!(package.controller_exports[0].exported, "Dropdown");
        assert_eq!(package.controller_exports[0].identifier, "dropdown");
        assert_eq!(package.files.len(), 3);
    }

    #[test]
    fn test_no_manifest_means_no_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_candidates(tmp.path(), &frameworks()).is_empty());
    }

    #[test]
    fn test_package_without_entry_is_still_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "package.json", r#"{"dependencies":{"stimulus-empty":"1"}}"#);
        write(root, "node_modules/stimulus-empty/package.json", r#"{"main":"gone.js"}"#);
        let candidates = discover_candidates(root, &frameworks());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].entry_point, None);

        let graph = DeclarationGraph::new();
        let resolver = InheritanceResolver::new(&graph, "Controller");
        let package = describe_package(&candidates[0], &graph, &resolver);
        assert!(!package.has_controllers());
    }
}
