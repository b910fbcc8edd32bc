//! Immutable, published view of a project graph.
//!
//! Every read goes through a `Snapshot`; refreshes build a new one and swap
//! it in whole, so readers never see a half-linked graph.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{
    AncestorChain, ClassDeclaration, ClassKey, ControllerDefinition, DetectedPackage,
    RegisteredController, SourceFile, UnresolvedImport,
};
use crate::project::layout::ProjectLayout;

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub(crate) layout: ProjectLayout,
    pub(crate) entry_points: Vec<PathBuf>,
    pub(crate) files: BTreeMap<PathBuf, Arc<SourceFile>>,
    pub(crate) chains: BTreeMap<ClassKey, AncestorChain>,
    /// Sorted by file path, then class offset.
    pub(crate) definitions: Vec<ControllerDefinition>,
    pub(crate) registrations: Vec<RegisteredController>,
    pub(crate) packages: Vec<DetectedPackage>,
    pub(crate) unresolved: Vec<UnresolvedImport>,
}

impl Snapshot {
    pub fn empty(layout: ProjectLayout) -> Self {
        Self {
            layout,
            entry_points: Vec::new(),
            files: BTreeMap::new(),
            chains: BTreeMap::new(),
            definitions: Vec::new(),
            registrations: Vec::new(),
            packages: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn list_controller_definitions(&self) -> &[ControllerDefinition] {
        &self.definitions
    }

    pub fn list_registered_controllers(&self) -> &[RegisteredController] {
        &self.registrations
    }

    pub fn list_detected_packages(&self) -> &[DetectedPackage] {
        &self.packages
    }

    pub fn definition_for_class(&self, class: &ClassKey) -> Option<&ControllerDefinition> {
        self.definitions
            .binary_search_by(|definition| definition.class.cmp(class))
            .ok()
            .map(|index| &self.definitions[index])
    }

    /// Definition for `identifier`: a registration under that name first,
    /// then an application controller, then a package controller.
    pub fn find_controller_by_identifier(&self, identifier: &str) -> Option<&ControllerDefinition> {
        let registered = self
            .registrations
            .iter()
            .filter(|registration| registration.identifier == identifier)
            .find_map(|registration| self.definition_for_class(&registration.controller));
        registered
            .or_else(|| {
                self.definitions
                    .iter()
                    .find(|d| !d.is_package_controller() && d.identifier == identifier)
            })
            .or_else(|| {
                self.definitions
                    .iter()
                    .find(|d| d.is_package_controller() && d.identifier == identifier)
            })
    }

    pub fn find_declarations_in_file(&self, path: &Path) -> &[ClassDeclaration] {
        self.files
            .get(path)
            .map(|file| file.classes.as_slice())
            .unwrap_or(&[])
    }

    pub fn find_definitions_in_file(&self, path: &Path) -> Vec<&ControllerDefinition> {
        self.definitions
            .iter()
            .filter(|definition| definition.path == path)
            .collect()
    }

    pub fn source_file(&self, path: &Path) -> Option<&Arc<SourceFile>> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &Arc<SourceFile>> {
        self.files.values()
    }

    pub fn ancestor_chain(&self, class: &ClassKey) -> Option<&AncestorChain> {
        self.chains.get(class)
    }

    /// Identifier of the controller defined in `path`, or the one the
    /// naming convention would give it.
    pub fn identifier_for_path(&self, path: &Path) -> Option<String> {
        if let Some(definition) = self.definitions.iter().find(|d| d.path == path) {
            return Some(definition.identifier.clone());
        }
        if self.layout.follows_convention(path) {
            return self.layout.identifier_for(path);
        }
        None
    }

    pub fn controller_path_for_identifier(&self, identifier: &str) -> PathBuf {
        self.layout.controller_path_for_identifier(identifier)
    }

    pub fn controller_roots(&self) -> &[PathBuf] {
        self.layout.controller_roots()
    }

    pub fn registration_entry_points(&self) -> &[PathBuf] {
        &self.entry_points
    }

    pub fn unresolved_imports(&self) -> &[UnresolvedImport] {
        &self.unresolved
    }
}
