//! One analyzed project root and its lifecycle.
//!
//! `Project` owns a single `ProjectGraph` behind a mutex and publishes an
//! `Arc<Snapshot>` after every committed change.  Readers only ever clone
//! the snapshot pointer.

pub mod graph;
pub mod layout;
pub mod refresh;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::AnalyzerConfig;
use crate::errors::{GraphError, GraphResult};
use crate::indexer::filesystem::{detect_language, normalize_path};
use crate::indexer::pipeline::extract_file_worker;
use crate::models::{
    AncestorChain, ClassDeclaration, ClassKey, ControllerDefinition, DetectedPackage, FileChange,
    RegisteredController, ScanStats, SourceFile, UnresolvedImport,
};
use crate::query::Snapshot;

use self::graph::ProjectGraph;
use self::layout::ProjectLayout;
pub use self::refresh::RefreshOutcome;
use self::refresh::{ChangeLog, RefreshGate};

pub struct Project {
    root: PathBuf,
    config: AnalyzerConfig,
    layout: ProjectLayout,
    state: Mutex<Option<ProjectGraph>>,
    snapshot: RwLock<Arc<Snapshot>>,
    gate: RefreshGate,
    changes: ChangeLog,
    generation: AtomicU64,
}

#[derive(Clone, Copy, Debug)]
struct RebuildTicket {
    generation: u64,
    mark: u64,
}

/// Read and parse `path`; `None` when it no longer exists or is unreadable.
fn load_source(path: &Path) -> Option<SourceFile> {
    if !path.is_file() {
        return None;
    }
    extract_file_worker(path).file
}

impl Project {
    /// Open `root`, loading `.stimulus-lsp/config.json` and environment
    /// overrides.  Nothing is scanned until [`Project::initialize`].
    pub fn open(root: impl AsRef<Path>) -> GraphResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(GraphError::RootNotFound(root.to_path_buf()));
        }
        let config = AnalyzerConfig::load(root)?;
        Self::with_config(root, config)
    }

    pub fn with_config(root: impl AsRef<Path>, config: AnalyzerConfig) -> GraphResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(GraphError::RootNotFound(root.to_path_buf()));
        }
        let root = normalize_path(root);
        let config = config.normalized();
        let layout = ProjectLayout::new(&root, &config);
        Ok(Self {
            snapshot: RwLock::new(Arc::new(Snapshot::empty(layout.clone()))),
            root,
            config,
            layout,
            state: Mutex::new(None),
            gate: RefreshGate::default(),
            changes: ChangeLog::default(),
            generation: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Full cold scan.  Returns the scan's statistics even when a newer
    /// rebuild superseded it before publication.
    #[tracing::instrument(skip_all, fields(root = %self.root.display()))]
    pub fn initialize(&self) -> GraphResult<ScanStats> {
        self.rebuild().map(|(stats, _)| stats)
    }

    /// Rebuild after a manifest change.  `None` when a newer rebuild started
    /// meanwhile and this result was discarded.
    #[tracing::instrument(skip_all, fields(root = %self.root.display()))]
    pub fn refresh(&self) -> GraphResult<Option<ScanStats>> {
        self.rebuild()
            .map(|(stats, published)| published.then_some(stats))
    }

    fn rebuild(&self) -> GraphResult<(ScanStats, bool)> {
        if !self.root.is_dir() {
            return Err(GraphError::RootNotFound(self.root.clone()));
        }
        let ticket = self.begin_rebuild();
        // Built without holding the state lock; queries keep reading the
        // previous snapshot meanwhile.
        let (graph, stats) = ProjectGraph::build(&self.root, self.config.clone());
        let published = self.publish(ticket, graph);
        Ok((stats, published))
    }

    fn begin_rebuild(&self) -> RebuildTicket {
        RebuildTicket {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            mark: self.changes.begin(),
        }
    }

    /// Publish a freshly built graph unless a newer rebuild has started.
    /// Single-file refreshes that landed during the build are replayed
    /// first.
    fn publish(&self, ticket: RebuildTicket, mut graph: ProjectGraph) -> bool {
        let mut state = self.state.lock();
        let changed = self.changes.finish(ticket.mark);
        if self.generation.load(Ordering::SeqCst) != ticket.generation {
            info!(generation = ticket.generation, "rebuild superseded; result discarded");
            return false;
        }
        for path in &changed {
            let outcome = graph.apply_parsed(path, load_source(path));
            debug!(path = %path.display(), ?outcome, "replayed change made during rebuild");
        }
        *self.snapshot.write() = Arc::new(graph.snapshot());
        *state = Some(graph);
        info!(
            generation = ticket.generation,
            replayed = changed.len(),
            "snapshot published"
        );
        true
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.root.join(path))
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root).map_or(true, |rel| {
            rel.components()
                .any(|part| self.config.is_excluded_dir(&part.as_os_str().to_string_lossy()))
        })
    }

    /// Re-read one file and update everything derived from it.
    ///
    /// A refresh of a path that is already being refreshed returns
    /// `Coalesced` at once; the running one repeats after it finishes.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn refresh_file(&self, path: &Path) -> RefreshOutcome {
        let path = self.absolute(path);
        if detect_language(&path).is_none() || !path.starts_with(&self.root) {
            return RefreshOutcome::Ignored;
        }
        if !self.gate.begin(&path) {
            debug!("refresh already in flight; coalesced");
            return RefreshOutcome::Coalesced;
        }
        loop {
            self.changes.record(&path);
            let parsed = load_source(&path);
            let outcome = self.commit(&path, parsed);
            if !self.gate.finish(&path) {
                return outcome;
            }
            debug!("rerunning coalesced refresh");
        }
    }

    fn commit(&self, path: &Path, parsed: Option<SourceFile>) -> RefreshOutcome {
        let mut state = self.state.lock();
        let Some(graph) = state.as_mut() else {
            return RefreshOutcome::Ignored;
        };
        if !graph.contains(path) && self.is_excluded(path) {
            return RefreshOutcome::Ignored;
        }
        let outcome = graph.apply_parsed(path, parsed);
        if outcome.published() {
            *self.snapshot.write() = Arc::new(graph.snapshot());
        }
        outcome
    }

    /// Dispatch a change notification.
    pub fn apply_change(&self, change: &FileChange) -> GraphResult<RefreshOutcome> {
        match change {
            FileChange::Created(path) | FileChange::Changed(path) | FileChange::Deleted(path) => {
                Ok(self.refresh_file(path))
            }
            FileChange::ManifestChanged => Ok(match self.refresh()? {
                Some(_) => RefreshOutcome::Updated,
                None => RefreshOutcome::Coalesced,
            }),
        }
    }

    // -- Queries ------------------------------------------------------------

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn list_controller_definitions(&self) -> Vec<ControllerDefinition> {
        self.snapshot().list_controller_definitions().to_vec()
    }

    pub fn list_registered_controllers(&self) -> Vec<RegisteredController> {
        self.snapshot().list_registered_controllers().to_vec()
    }

    pub fn list_detected_packages(&self) -> Vec<DetectedPackage> {
        self.snapshot().list_detected_packages().to_vec()
    }

    pub fn find_controller_by_identifier(&self, identifier: &str) -> Option<ControllerDefinition> {
        self.snapshot()
            .find_controller_by_identifier(identifier)
            .cloned()
    }

    pub fn find_declarations_in_file(&self, path: &Path) -> Vec<ClassDeclaration> {
        self.snapshot()
            .find_declarations_in_file(&self.absolute(path))
            .to_vec()
    }

    pub fn find_definitions_in_file(&self, path: &Path) -> Vec<ControllerDefinition> {
        self.snapshot()
            .find_definitions_in_file(&self.absolute(path))
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn source_file(&self, path: &Path) -> Option<Arc<SourceFile>> {
        self.snapshot().source_file(&self.absolute(path)).cloned()
    }

    pub fn ancestor_chain(&self, class: &ClassKey) -> Option<AncestorChain> {
        self.snapshot().ancestor_chain(class).cloned()
    }

    pub fn identifier_for_path(&self, path: &Path) -> Option<String> {
        self.snapshot().identifier_for_path(&self.absolute(path))
    }

    /// Where a new controller with `identifier` would live.  Pure; does not
    /// look at the graph.
    pub fn controller_path_for_identifier(&self, identifier: &str) -> PathBuf {
        self.layout.controller_path_for_identifier(identifier)
    }

    pub fn controller_roots(&self) -> Vec<PathBuf> {
        self.layout.controller_roots().to_vec()
    }

    pub fn registration_entry_points(&self) -> Vec<PathBuf> {
        self.snapshot().registration_entry_points().to_vec()
    }

    pub fn unresolved_imports(&self) -> Vec<UnresolvedImport> {
        self.snapshot().unresolved_imports().to_vec()
    }
}
