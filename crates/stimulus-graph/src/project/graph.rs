//! The mutable project graph behind a `Project`.
//!
//! Owns the declaration graph plus everything derived from it: ancestor
//! chains, the reverse `file -> classes` index used for invalidation,
//! controller definitions, detected packages and registrations.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::analysis::capabilities::merge_definition;
use crate::analysis::inheritance::InheritanceResolver;
use crate::analysis::packages::{describe_package, discover_candidates, PackageCandidate};
use crate::analysis::registration::RegistrationDetector;
use crate::analysis::{controller_class_of, is_controller};
use crate::config::AnalyzerConfig;
use crate::indexer::filesystem::{detect_language, iter_project_files};
use crate::indexer::graph::{DeclarationGraph, LinkOptions, ModuleEdges};
use crate::indexer::imports::ResolveOptions;
use crate::indexer::pipeline::{parallel_extract, ErrorStage};
use crate::models::{
    AncestorChain, ClassKey, ControllerDefinition, DefinitionIssue, DetectedPackage,
    RegisteredController, ScanStats, SourceFile,
};
use crate::project::layout::ProjectLayout;
use crate::project::refresh::RefreshOutcome;
use crate::query::Snapshot;

#[derive(Debug)]
pub struct ProjectGraph {
    config: AnalyzerConfig,
    layout: ProjectLayout,
    link_options: LinkOptions,
    declarations: DeclarationGraph,
    chains: HashMap<ClassKey, AncestorChain>,
    /// File -> classes whose chain consulted it.
    dependents: HashMap<PathBuf, BTreeSet<ClassKey>>,
    definitions: BTreeMap<ClassKey, ControllerDefinition>,
    candidates: Vec<PackageCandidate>,
    packages: Vec<DetectedPackage>,
    /// Package controller class -> identifier it is published under.
    package_exports: HashMap<ClassKey, String>,
    entry_points: Vec<PathBuf>,
    registrations: Vec<RegisteredController>,
}

impl ProjectGraph {
    pub fn new(root: &Path, config: AnalyzerConfig) -> Self {
        let layout = ProjectLayout::new(root, &config);
        let aliases = config
            .import_aliases
            .iter()
            .map(|(prefix, dir)| (prefix.clone(), root.join(dir)));
        let link_options = LinkOptions {
            resolve: ResolveOptions::new(
                root.to_path_buf(),
                aliases,
                config.framework_packages.clone(),
            ),
            max_package_files: config.max_package_files,
            workers: config.scan_workers,
        };
        Self {
            config,
            layout,
            link_options,
            declarations: DeclarationGraph::new(),
            chains: HashMap::new(),
            dependents: HashMap::new(),
            definitions: BTreeMap::new(),
            candidates: Vec::new(),
            packages: Vec::new(),
            package_exports: HashMap::new(),
            entry_points: Vec::new(),
            registrations: Vec::new(),
        }
    }

    /// Cold scan of `root`.  Per-file failures are counted, never returned.
    pub fn build(root: &Path, config: AnalyzerConfig) -> (Self, ScanStats) {
        let started = Instant::now();
        let mut graph = Self::new(root, config);
        let mut stats = ScanStats::default();

        let paths = iter_project_files(root, &graph.config);
        stats.files_seen = paths.len();
        let mut parsed = Vec::with_capacity(paths.len());
        for result in parallel_extract(&paths, graph.link_options.workers) {
            match result.file {
                Some(file) => {
                    if file.has_errors() {
                        stats.parse_failures += 1;
                    }
                    parsed.push(file.path.clone());
                    graph.declarations.insert(file);
                }
                None if result.error_stage == Some(ErrorStage::Read) => stats.read_failures += 1,
                None => stats.parse_failures += 1,
            }
        }
        stats.files_parsed = parsed.len();
        graph.declarations.link(parsed, &graph.link_options);

        graph.load_packages();
        graph.analyze_all();

        stats.package_files = graph.declarations.package_file_count();
        stats.controllers = graph.definitions.len();
        stats.registrations = graph.registrations.len();
        stats.packages = graph.packages.len();
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            files = stats.files_parsed,
            package_files = stats.package_files,
            parse_failures = stats.parse_failures,
            controllers = stats.controllers,
            registrations = stats.registrations,
            packages = stats.packages,
            elapsed_ms = stats.elapsed_ms,
            "project scan complete"
        );
        (graph, stats)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.declarations.contains(path)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            layout: self.layout.clone(),
            entry_points: self.entry_points.clone(),
            files: self.declarations.file_map().clone(),
            chains: self
                .chains
                .iter()
                .map(|(key, chain)| (key.clone(), chain.clone()))
                .collect(),
            definitions: self.definitions.values().cloned().collect(),
            registrations: self.registrations.clone(),
            packages: self.packages.clone(),
            unresolved: self.declarations.unresolved_imports(),
        }
    }

    // -- Cold analysis ------------------------------------------------------

    fn load_packages(&mut self) {
        self.candidates = discover_candidates(self.layout.root(), &self.config.framework_packages);
        let entries: Vec<PathBuf> = self
            .candidates
            .iter()
            .filter_map(|candidate| candidate.entry_point.clone())
            .filter(|entry| detect_language(entry).is_some())
            .collect();
        let stats = self.declarations.load_and_link(entries, &self.link_options);
        debug!(
            candidates = self.candidates.len(),
            files = stats.files_loaded,
            failures = stats.load_failures,
            "package entry points loaded"
        );
    }

    fn describe_packages(&mut self) {
        let resolver = InheritanceResolver::new(&self.declarations, &self.config.root_class_name);
        let packages: Vec<DetectedPackage> = self
            .candidates
            .iter()
            .map(|candidate| describe_package(candidate, &self.declarations, &resolver))
            .collect();

        self.package_exports.clear();
        for export in packages.iter().flat_map(|package| package.controller_exports.iter()) {
            self.package_exports
                .entry(export.class.clone())
                .or_insert_with(|| export.identifier.clone());
        }
        self.packages = packages;
    }

    fn analyze_all(&mut self) {
        self.chains.clear();
        self.dependents.clear();
        self.definitions.clear();
        self.describe_packages();

        let keys: BTreeSet<ClassKey> = self
            .declarations
            .files()
            .filter(|file| !file.is_package_file())
            .flat_map(|file| file.classes.iter().map(|class| class.key.clone()))
            .chain(self.package_exports.keys().cloned())
            .collect();
        self.recompute(keys);
        self.flag_collisions();
        self.detect_registrations();
    }

    fn is_tracked(&self, key: &ClassKey) -> bool {
        self.package_exports.contains_key(key)
            || self
                .declarations
                .file(&key.path)
                .is_some_and(|file| !file.is_package_file())
    }

    fn forget_chain(&mut self, key: &ClassKey) {
        let Some(chain) = self.chains.remove(key) else {
            return;
        };
        for path in &chain.visited_files {
            if let Some(classes) = self.dependents.get_mut(path) {
                classes.remove(key);
                if classes.is_empty() {
                    self.dependents.remove(path);
                }
            }
        }
    }

    /// Recompute chains for `keys`, then the definitions of their files.
    fn recompute(&mut self, keys: BTreeSet<ClassKey>) {
        for key in &keys {
            self.forget_chain(key);
        }

        let chains: Vec<AncestorChain> = {
            let resolver =
                InheritanceResolver::new(&self.declarations, &self.config.root_class_name);
            keys.iter()
                .filter(|key| self.declarations.class(key).is_some() && self.is_tracked(key))
                .map(|key| resolver.chain(key))
                .collect()
        };
        for chain in chains {
            for path in &chain.visited_files {
                self.dependents
                    .entry(path.clone())
                    .or_default()
                    .insert(chain.class.clone());
            }
            self.chains.insert(chain.class.clone(), chain);
        }

        let paths: BTreeSet<PathBuf> = keys.into_iter().map(|key| key.path).collect();
        self.definitions.retain(|key, _| !paths.contains(&key.path));
        for path in &paths {
            for definition in self.definitions_for_file(path) {
                self.definitions.insert(definition.class.clone(), definition);
            }
        }
    }

    fn definitions_for_file(&self, path: &Path) -> Vec<ControllerDefinition> {
        let Some(file) = self.declarations.file(path) else {
            return Vec::new();
        };

        if file.is_package_file() {
            return file
                .classes
                .iter()
                .filter_map(|class| {
                    let identifier = self.package_exports.get(&class.key)?;
                    let chain = self.chains.get(&class.key)?;
                    merge_definition(&self.declarations, chain, identifier.clone())
                })
                .collect();
        }

        let Some(identifier) = self.layout.identifier_for(path) else {
            return Vec::new();
        };
        controller_class_of(file, |class| {
            self.chains.get(&class.key).is_some_and(|chain| {
                is_controller(class, chain, |path| self.layout.follows_convention(path))
            })
        })
        .and_then(|class| {
            merge_definition(&self.declarations, self.chains.get(&class.key)?, identifier)
        })
        .into_iter()
        .collect()
    }

    /// Flag application definitions that share an identifier.
    fn flag_collisions(&mut self) {
        let mut owners: HashMap<String, BTreeSet<PathBuf>> = HashMap::new();
        for definition in self.definitions.values_mut() {
            definition
                .issues
                .retain(|issue| !matches!(issue, DefinitionIssue::IdentifierCollision { .. }));
            if !definition.is_package_controller() {
                owners
                    .entry(definition.identifier.clone())
                    .or_default()
                    .insert(definition.path.clone());
            }
        }
        for definition in self.definitions.values_mut() {
            if definition.is_package_controller() {
                continue;
            }
            let Some(paths) = owners.get(&definition.identifier) else {
                continue;
            };
            for other in paths.iter().filter(|other| **other != definition.path) {
                definition
                    .issues
                    .push(DefinitionIssue::IdentifierCollision { other: other.clone() });
            }
        }
    }

    fn detect_registrations(&mut self) {
        let entry_points = self.layout.entry_points();
        let registrations = {
            let resolver =
                InheritanceResolver::new(&self.declarations, &self.config.root_class_name);
            RegistrationDetector::new(
                &self.declarations,
                &resolver,
                &self.definitions,
                &self.link_options.resolve,
            )
            .detect(&entry_points)
        };
        self.entry_points = entry_points;
        self.registrations = registrations;
    }

    // -- Incremental updates ------------------------------------------------

    /// Replace (or drop, for `None`) one file and re-derive what depends on
    /// it.
    pub fn apply_parsed(&mut self, path: &Path, parsed: Option<SourceFile>) -> RefreshOutcome {
        let previous = self.declarations.file(path).cloned();
        match (&previous, &parsed) {
            (None, None) => return RefreshOutcome::Ignored,
            (Some(old), Some(new)) if old.content_hash == new.content_hash => {
                return RefreshOutcome::Unchanged
            }
            _ => {}
        }
        let created = previous.is_none();
        let removed = parsed.is_none();
        let is_package_file = previous
            .as_ref()
            .map(|file| file.is_package_file())
            .or_else(|| parsed.as_ref().map(SourceFile::is_package_file))
            .unwrap_or(false);

        let mut affected: BTreeSet<ClassKey> =
            self.dependents.get(path).cloned().unwrap_or_default();
        if let Some(old) = &previous {
            affected.extend(old.classes.iter().map(|class| class.key.clone()));
        }
        if created {
            affected.extend(
                self.chains
                    .values()
                    .filter(|chain| chain.is_open_ended())
                    .map(|chain| chain.class.clone()),
            );
        }
        let definitions_before: BTreeSet<ClassKey> = self.definitions.keys().cloned().collect();

        match parsed {
            Some(file) => {
                self.declarations.insert(file);
            }
            None => {
                self.declarations.remove(path);
            }
        }
        let link_stats = if created || removed {
            let edges_before: HashMap<PathBuf, ModuleEdges> = self
                .declarations
                .file_map()
                .keys()
                .filter_map(|file| Some((file.clone(), self.declarations.edges(file)?.clone())))
                .collect();
            let stats = self.declarations.relink_all(&self.link_options);
            for file in self.declarations.file_map().keys() {
                if edges_before.get(file) != self.declarations.edges(file) {
                    if let Some(classes) = self.dependents.get(file) {
                        affected.extend(classes.iter().cloned());
                    }
                }
            }
            stats
        } else {
            self.declarations
                .link(vec![path.to_path_buf()], &self.link_options)
        };

        if is_package_file {
            self.describe_packages();
            affected.extend(self.package_exports.keys().cloned());
        }
        if let Some(file) = self.declarations.file(path) {
            if !file.is_package_file() {
                affected.extend(file.classes.iter().map(|class| class.key.clone()));
            }
        }

        let touched_registration = self.registrations.iter().any(|registration| {
            registration.controller.path == path || affected.contains(&registration.controller)
        });
        let affected_count = affected.len();
        self.recompute(affected);
        self.flag_collisions();

        let definitions_changed =
            definitions_before != self.definitions.keys().cloned().collect::<BTreeSet<_>>();
        let rerun_registrations =
            self.layout.is_entry_point(path) || touched_registration || definitions_changed;
        if rerun_registrations {
            self.detect_registrations();
        }

        debug!(
            path = %path.display(),
            created,
            removed,
            affected = affected_count,
            loaded = link_stats.files_loaded,
            rerun_registrations,
            "file refreshed"
        );
        if removed {
            RefreshOutcome::Removed
        } else {
            RefreshOutcome::Updated
        }
    }
}
