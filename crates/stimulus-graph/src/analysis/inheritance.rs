//! Superclass resolution and ancestor chains.
//!
//! References are followed through local classes, import bindings, export
//! lists, and re-export hops.  Every way of failing ends in a
//! `ResolvedReference::Unresolved` instead of an error.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::indexer::graph::DeclarationGraph;
use crate::models::{
    AncestorChain, ChainTermination, ClassKey, ExportTarget, Expression, ExpressionKind,
    ImportedName, ModuleResolution, SourceFile, UnresolvedReason,
};
use crate::query::guards::{MAX_ANCESTOR_DEPTH, MAX_REEXPORT_DEPTH};

/// What a class reference points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedReference {
    Class(ClassKey),
    /// The framework's root base class.
    Root,
    Unresolved {
        reason: UnresolvedReason,
        reference: String,
    },
}

impl ResolvedReference {
    fn unresolved(reason: UnresolvedReason, reference: impl Into<String>) -> Self {
        ResolvedReference::Unresolved {
            reason,
            reference: reference.into(),
        }
    }
}

/// Files and `(file, export)` pairs consulted by one resolution.
#[derive(Debug, Default)]
struct Trace {
    visited_files: BTreeSet<PathBuf>,
    seen_exports: HashSet<(PathBuf, String)>,
}

pub struct InheritanceResolver<'g> {
    graph: &'g DeclarationGraph,
    root_class_name: &'g str,
}

impl<'g> InheritanceResolver<'g> {
    pub fn new(graph: &'g DeclarationGraph, root_class_name: &'g str) -> Self {
        Self {
            graph,
            root_class_name,
        }
    }

    /// Resolve an expression appearing in `file` to a class.
    pub fn resolve_expression(&self, file: &SourceFile, expression: &Expression) -> ResolvedReference {
        let mut trace = Trace::default();
        self.resolve_reference(file, expression, &mut trace)
    }

    /// Resolve export `name` of the module at `path`.
    pub fn resolve_export_of(&self, path: &Path, name: &str) -> ResolvedReference {
        let mut trace = Trace::default();
        self.resolve_export(path, name, 0, &mut trace)
    }

    /// Build the ancestor chain of `class`, nearest ancestor first.
    pub fn chain(&self, class: &ClassKey) -> AncestorChain {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([class.clone()]);
        let mut visited_files = BTreeSet::from([class.path.clone()]);
        let mut current = class.clone();

        let termination = loop {
            let Some(file) = self.graph.file(&current.path) else {
                break ChainTermination::OpenEnded {
                    reason: UnresolvedReason::MissingFile,
                    reference: current.path.display().to_string(),
                };
            };
            let Some(declaration) = file.class_at(current.offset) else {
                break ChainTermination::OpenEnded {
                    reason: UnresolvedReason::NotAClass,
                    reference: current.path.display().to_string(),
                };
            };
            let Some(superclass) = &declaration.superclass else {
                break ChainTermination::Detached;
            };
            if ancestors.len() >= MAX_ANCESTOR_DEPTH {
                break ChainTermination::OpenEnded {
                    reason: UnresolvedReason::DepthLimit,
                    reference: superclass.display_name(),
                };
            }

            let mut trace = Trace::default();
            let resolved = self.resolve_reference(file, superclass, &mut trace);
            visited_files.extend(trace.visited_files);

            match resolved {
                ResolvedReference::Root => break ChainTermination::Root,
                ResolvedReference::Unresolved { reason, reference } => {
                    break ChainTermination::OpenEnded { reason, reference }
                }
                ResolvedReference::Class(key) => {
                    if !seen.insert(key.clone()) {
                        break ChainTermination::Cycle { repeated: key };
                    }
                    visited_files.insert(key.path.clone());
                    ancestors.push(key.clone());
                    current = key;
                }
            }
        };

        let errored_files = visited_files
            .iter()
            .filter(|path| self.graph.file(path).is_some_and(|file| file.has_errors()))
            .cloned()
            .collect();

        debug!(
            class = %class.path.display(),
            offset = class.offset,
            ancestors = ancestors.len(),
            ?termination,
            "ancestor chain"
        );

        AncestorChain {
            class: class.clone(),
            ancestors,
            termination,
            visited_files,
            errored_files,
        }
    }

    fn resolve_reference(
        &self,
        file: &SourceFile,
        expression: &Expression,
        trace: &mut Trace,
    ) -> ResolvedReference {
        match &expression.kind {
            ExpressionKind::Identifier(name) => self.resolve_binding(file, name, 0, trace),
            ExpressionKind::Member { object, property } => {
                self.resolve_member(file, object, property, trace)
            }
            _ => ResolvedReference::unresolved(
                UnresolvedReason::UnsupportedExpression,
                expression.display_name(),
            ),
        }
    }

    /// `ns.Name` where `ns` is a namespace import; `Stimulus.Controller` on
    /// an unknown global is treated like a bare root reference.
    fn resolve_member(
        &self,
        file: &SourceFile,
        object: &Expression,
        property: &str,
        trace: &mut Trace,
    ) -> ResolvedReference {
        let reference = format!("{}.{}", object.display_name(), property);
        let Some(namespace) = object.as_identifier() else {
            return ResolvedReference::unresolved(UnresolvedReason::UnsupportedExpression, reference);
        };
        match file.import_binding(namespace) {
            Some((import, binding)) if binding.imported == ImportedName::Namespace => self.resolve_import(
                file,
                &import.source,
                &ImportedName::Named(property.to_string()),
                0,
                trace,
            ),
            Some(_) => ResolvedReference::unresolved(UnresolvedReason::UnsupportedExpression, reference),
            None if property == self.root_class_name && file.class_named(namespace).is_none() => {
                ResolvedReference::Root
            }
            None => ResolvedReference::unresolved(UnresolvedReason::UnknownBinding, reference),
        }
    }

    /// A name bound in `file`: local class first, then imports.
    fn resolve_binding(
        &self,
        file: &SourceFile,
        name: &str,
        depth: usize,
        trace: &mut Trace,
    ) -> ResolvedReference {
        trace.visited_files.insert(file.path.clone());
        if let Some(class) = file.class_named(name) {
            return ResolvedReference::Class(class.key.clone());
        }
        if let Some((import, binding)) = file.import_binding(name) {
            return self.resolve_import(file, &import.source, &binding.imported, depth, trace);
        }
        if name == self.root_class_name {
            return ResolvedReference::Root;
        }
        ResolvedReference::unresolved(UnresolvedReason::UnknownBinding, name)
    }

    fn resolve_import(
        &self,
        file: &SourceFile,
        specifier: &str,
        imported: &ImportedName,
        depth: usize,
        trace: &mut Trace,
    ) -> ResolvedReference {
        let reference = match imported.export_name() {
            Some(name) => format!("{name} from {specifier:?}"),
            None => format!("* from {specifier:?}"),
        };
        match self.graph.resolution(&file.path, specifier) {
            Some(ModuleResolution::Framework) => match imported {
                ImportedName::Named(name) if name == self.root_class_name => ResolvedReference::Root,
                _ => ResolvedReference::unresolved(UnresolvedReason::FrameworkPackage, reference),
            },
            // An unresolvable module still ends the chain when the binding
            // imports the root class by name.
            Some(ModuleResolution::Unresolved(_)) | None
                if imported.export_name() == Some(self.root_class_name) =>
            {
                ResolvedReference::Root
            }
            Some(ModuleResolution::Unresolved(reason)) => {
                ResolvedReference::unresolved(reason.clone(), reference)
            }
            None => ResolvedReference::unresolved(UnresolvedReason::MissingFile, reference),
            Some(ModuleResolution::Resolved(target)) => match imported.export_name() {
                Some(name) => self.resolve_export(target, name, depth + 1, trace),
                None => ResolvedReference::unresolved(UnresolvedReason::NotAClass, reference),
            },
        }
    }

    fn resolve_export(
        &self,
        path: &Path,
        name: &str,
        depth: usize,
        trace: &mut Trace,
    ) -> ResolvedReference {
        let reference = format!("{name} from {}", path.display());
        if depth > MAX_REEXPORT_DEPTH {
            return ResolvedReference::unresolved(UnresolvedReason::DepthLimit, reference);
        }
        if !trace.seen_exports.insert((path.to_path_buf(), name.to_string())) {
            return ResolvedReference::unresolved(UnresolvedReason::Cycle, reference);
        }
        trace.visited_files.insert(path.to_path_buf());

        let Some(file) = self.graph.file(path) else {
            return ResolvedReference::unresolved(UnresolvedReason::MissingFile, reference);
        };

        if let Some(export) = file.exports.iter().find(|export| export.exported == name) {
            return match &export.target {
                ExportTarget::Class { offset } => ResolvedReference::Class(ClassKey::new(path, *offset)),
                ExportTarget::Binding { local } => self.resolve_binding(file, local, depth, trace),
                ExportTarget::ReExport { source, imported } => {
                    self.resolve_import(file, source, imported, depth, trace)
                }
                ExportTarget::NotAClass => {
                    ResolvedReference::unresolved(UnresolvedReason::NotAClass, reference)
                }
                ExportTarget::Unsupported { .. } => {
                    ResolvedReference::unresolved(UnresolvedReason::UnsupportedExpression, reference)
                }
                // Star exports are never stored under a concrete name.
                ExportTarget::Star { .. } => {
                    ResolvedReference::unresolved(UnresolvedReason::MissingExport, reference)
                }
            };
        }

        // `export *` never forwards the default export.
        if name != "default" {
            for export in &file.exports {
                let ExportTarget::Star { source } = &export.target else {
                    continue;
                };
                let Some(ModuleResolution::Resolved(target)) = self.graph.resolution(path, source) else {
                    continue;
                };
                match self.resolve_export(target, name, depth + 1, trace) {
                    ResolvedReference::Unresolved {
                        reason: UnresolvedReason::MissingExport,
                        ..
                    } => continue,
                    found => return found,
                }
            }
        }

        ResolvedReference::unresolved(UnresolvedReason::MissingExport, reference)
    }
}
