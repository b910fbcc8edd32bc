//! The declaration graph: parsed files plus resolved module edges.
//!
//! Cross-file references are stored as `(file, specifier) -> resolution`
//! lookups, never as pointers, so replacing one file only invalidates the
//! edges that mention it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::indexer::filesystem::origin_for_path;
use crate::indexer::imports::{resolve_module, ResolveOptions};
use crate::indexer::pipeline::parallel_extract;
use crate::models::{
    ClassDeclaration, ClassKey, ModuleResolution, SourceFile, UnresolvedImport, UnresolvedReason,
};
use crate::query::guards::MAX_LINK_WAVES;

#[derive(Clone, Debug, Default)]
pub struct LinkOptions {
    pub resolve: ResolveOptions,
    pub max_package_files: usize,
    pub workers: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub files_loaded: usize,
    pub package_files_loaded: usize,
    pub load_failures: usize,
    pub budget_exhausted: bool,
}

impl LinkStats {
    pub fn absorb(&mut self, other: LinkStats) {
        self.files_loaded += other.files_loaded;
        self.package_files_loaded += other.package_files_loaded;
        self.load_failures += other.load_failures;
        self.budget_exhausted |= other.budget_exhausted;
    }
}

/// Module edges of one file, keyed by specifier in source order.
pub type ModuleEdges = IndexMap<String, ModuleResolution>;

#[derive(Clone, Debug, Default)]
pub struct DeclarationGraph {
    files: BTreeMap<PathBuf, Arc<SourceFile>>,
    edges: HashMap<PathBuf, ModuleEdges>,
}

impl DeclarationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Files --------------------------------------------------------------

    pub fn insert(&mut self, file: SourceFile) -> Option<Arc<SourceFile>> {
        let path = file.path.clone();
        self.edges.remove(&path);
        self.files.insert(path, Arc::new(file))
    }

    pub fn remove(&mut self, path: &Path) -> Option<Arc<SourceFile>> {
        self.edges.remove(path);
        self.files.remove(path)
    }

    pub fn file(&self, path: &Path) -> Option<&Arc<SourceFile>> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &Arc<SourceFile>> {
        self.files.values()
    }

    pub fn file_map(&self) -> &BTreeMap<PathBuf, Arc<SourceFile>> {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn package_file_count(&self) -> usize {
        self.files.values().filter(|file| file.is_package_file()).count()
    }

    pub fn class(&self, key: &ClassKey) -> Option<&ClassDeclaration> {
        self.files.get(&key.path)?.class_at(key.offset)
    }

    // -- Edges --------------------------------------------------------------

    pub fn resolution(&self, from: &Path, specifier: &str) -> Option<&ModuleResolution> {
        self.edges.get(from)?.get(specifier)
    }

    pub fn edges(&self, from: &Path) -> Option<&ModuleEdges> {
        self.edges.get(from)
    }

    /// Resolve every specifier of `path` and return resolved targets.
    fn link_file(&mut self, path: &Path, options: &ResolveOptions) -> Vec<PathBuf> {
        let Some(file) = self.files.get(path) else {
            return Vec::new();
        };
        let mut edges = ModuleEdges::new();
        for specifier in file.specifiers() {
            let resolution = resolve_module(path, specifier, options);
            debug!(from = %path.display(), specifier, ?resolution, "module edge");
            edges.insert(specifier.to_string(), resolution);
        }
        let targets = edges
            .values()
            .filter_map(|resolution| match resolution {
                ModuleResolution::Resolved(target) => Some(target.clone()),
                _ => None,
            })
            .collect();
        self.edges.insert(path.to_path_buf(), edges);
        targets
    }

    fn downgrade_edges_to(&mut self, target: &Path, reason: UnresolvedReason) {
        for edges in self.edges.values_mut() {
            for resolution in edges.values_mut() {
                if matches!(resolution, ModuleResolution::Resolved(path) if path == target) {
                    *resolution = ModuleResolution::Unresolved(reason.clone());
                }
            }
        }
    }

    /// Link `paths`, loading newly reached files in waves until the import
    /// closure is complete or a guard trips.
    pub fn link<I>(&mut self, paths: I, options: &LinkOptions) -> LinkStats
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut stats = LinkStats::default();
        let mut pending: Vec<PathBuf> = paths.into_iter().collect();
        let mut failed: BTreeSet<PathBuf> = BTreeSet::new();
        let mut package_files = self.package_file_count();

        for wave in 0..MAX_LINK_WAVES {
            if pending.is_empty() {
                break;
            }
            let mut missing = BTreeSet::new();
            for path in &pending {
                for target in self.link_file(path, &options.resolve) {
                    if !self.files.contains_key(&target) && !failed.contains(&target) {
                        missing.insert(target);
                    }
                }
            }

            let mut to_load = Vec::new();
            for target in missing {
                if origin_for_path(&target).is_package() {
                    if package_files >= options.max_package_files {
                        stats.budget_exhausted = true;
                        self.downgrade_edges_to(&target, UnresolvedReason::DepthLimit);
                        continue;
                    }
                    package_files += 1;
                }
                to_load.push(target);
            }
            debug!(wave, loading = to_load.len(), "link wave");

            pending.clear();
            for result in parallel_extract(&to_load, options.workers) {
                match result.file {
                    Some(file) => {
                        stats.files_loaded += 1;
                        if file.is_package_file() {
                            stats.package_files_loaded += 1;
                        }
                        pending.push(file.path.clone());
                        self.insert(file);
                    }
                    None => {
                        stats.load_failures += 1;
                        failed.insert(result.path);
                    }
                }
            }
        }

        if stats.budget_exhausted {
            warn!(
                limit = options.max_package_files,
                "package file budget exhausted; some imports left unresolved"
            );
        }
        stats
    }

    /// Load any of `paths` not yet in the graph, then link all of them.
    /// Package files count against the package budget.
    pub fn load_and_link(&mut self, paths: Vec<PathBuf>, options: &LinkOptions) -> LinkStats {
        let mut stats = LinkStats::default();
        let mut package_files = self.package_file_count();
        let mut to_load = Vec::new();
        for path in paths.iter().filter(|path| !self.files.contains_key(*path)) {
            if origin_for_path(path).is_package() {
                if package_files >= options.max_package_files {
                    stats.budget_exhausted = true;
                    continue;
                }
                package_files += 1;
            }
            to_load.push(path.clone());
        }
        for result in parallel_extract(&to_load, options.workers) {
            match result.file {
                Some(file) => {
                    stats.files_loaded += 1;
                    if file.is_package_file() {
                        stats.package_files_loaded += 1;
                    }
                    self.insert(file);
                }
                None => stats.load_failures += 1,
            }
        }
        let present: Vec<PathBuf> = paths
            .into_iter()
            .filter(|path| self.files.contains_key(path))
            .collect();
        stats.absorb(self.link(present, options));
        stats
    }

    /// Re-resolve the edges of every loaded file.
    pub fn relink_all(&mut self, options: &LinkOptions) -> LinkStats {
        let paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        self.link(paths, options)
    }

    /// Every recorded edge that does not lead to a loaded file.
    pub fn unresolved_imports(&self) -> Vec<UnresolvedImport> {
        let mut unresolved = Vec::new();
        for (from, edges) in &self.edges {
            for (specifier, resolution) in edges {
                let reason = match resolution {
                    ModuleResolution::Unresolved(reason) => reason.clone(),
                    ModuleResolution::Resolved(target) if !self.files.contains_key(target) => {
                        UnresolvedReason::MissingFile
                    }
                    _ => continue,
                };
                unresolved.push(UnresolvedImport {
                    file: from.clone(),
                    specifier: specifier.clone(),
                    reason,
                });
            }
        }
        unresolved.sort_by(|a, b| a.file.cmp(&b.file).then_with(|| a.specifier.cmp(&b.specifier)));
        unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::parser::parse_path;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn options(root: &Path, budget: usize) -> LinkOptions {
        LinkOptions {
            resolve: ResolveOptions::new(
                root.to_path_buf(),
                Vec::new(),
                vec!["@hotwired/stimulus".to_string()],
            ),
            max_package_files: budget,
            workers: 1,
        }
    }

    fn load(graph: &mut DeclarationGraph, path: &Path) {
        let text = std::fs::read_to_string(path).unwrap();
        graph.insert(parse_path(path, text).unwrap().unwrap());
    }

    #[test]
    fn test_link_loads_package_files_lazily() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let app = write(
            root,
            "app/a_controller.js",
            r#"import Base from "widgets"
import { Controller } from "@hotwired/stimulus"
import "./missing"
export default class extends Base {}"#,
        );
        write(root, "node_modules/widgets/package.json", r#"{"main":"index.js"}"#);
        write(
            root,
            "node_modules/widgets/index.js",
            r#"export { default } from "./base""#,
        );
        write(root, "node_modules/widgets/base.js", "export default class Base {}");

        let mut graph = DeclarationGraph::new();
        load(&mut graph, &app);
        let stats = graph.link(vec![app.clone()], &options(root, 100));

        assert_eq!(stats.package_files_loaded, 2);
        assert!(graph.contains(&root.join("node_modules/widgets/base.js")));
        assert_eq!(
            graph.resolution(&app, "@hotwired/stimulus"),
            Some(&ModuleResolution::Framework)
        );
        let unresolved = graph.unresolved_imports();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].specifier, "./missing");
        assert_eq!(unresolved[0].reason, UnresolvedReason::MissingFile);
    }

    #[test]
    fn test_package_budget_downgrades_edges() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let app = write(root, "app/a.js", r#"import X from "widgets""#);
        write(root, "node_modules/widgets/index.js", "export default class X {}");

        let mut graph = DeclarationGraph::new();
        load(&mut graph, &app);
        let stats = graph.link(vec![app.clone()], &options(root, 0));

        assert!(stats.budget_exhausted);
        assert_eq!(
            graph.resolution(&app, "widgets"),
            Some(&ModuleResolution::Unresolved(UnresolvedReason::DepthLimit))
        );
    }
}
