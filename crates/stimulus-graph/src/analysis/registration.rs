//! Registration detection in the application's entry points.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::analysis::identifiers::{identifier_for_path, is_controller_path};
use crate::analysis::inheritance::{InheritanceResolver, ResolvedReference};
use crate::indexer::filesystem::{normalize_path, relative_posix};
use crate::indexer::graph::DeclarationGraph;
use crate::indexer::imports::ResolveOptions;
use crate::models::{
    CallExpression, ClassKey, ControllerDefinition, ExpressionKind, RegisteredController,
    RegistrationKind, SourceFile,
};

const REGISTER_METHOD: &str = "register";
const EAGER_LOADER: &str = "eagerLoadControllersFrom";
const LAZY_LOADER: &str = "lazyLoadControllersFrom";

pub struct RegistrationDetector<'a> {
    graph: &'a DeclarationGraph,
    resolver: &'a InheritanceResolver<'a>,
    definitions: &'a BTreeMap<ClassKey, ControllerDefinition>,
    resolve: &'a ResolveOptions,
}

impl<'a> RegistrationDetector<'a> {
    pub fn new(
        graph: &'a DeclarationGraph,
        resolver: &'a InheritanceResolver<'a>,
        definitions: &'a BTreeMap<ClassKey, ControllerDefinition>,
        resolve: &'a ResolveOptions,
    ) -> Self {
        Self {
            graph,
            resolver,
            definitions,
            resolve,
        }
    }

    /// Every registration found in `entry_points`, in entry point then
    /// source order.  Duplicate identifiers are all reported.
    pub fn detect(&self, entry_points: &[PathBuf]) -> Vec<RegisteredController> {
        let mut registrations = Vec::new();
        for entry in entry_points {
            let Some(file) = self.graph.file(entry) else {
                continue;
            };
            for call in &file.calls {
                match &call.callee.kind {
                    ExpressionKind::Member { property, .. } if property == REGISTER_METHOD => {
                        registrations.extend(self.register_call(file, call));
                    }
                    ExpressionKind::Identifier(name) if name == EAGER_LOADER => {
                        registrations.extend(self.loader_call(file, call, RegistrationKind::EagerLoad));
                    }
                    ExpressionKind::Identifier(name) if name == LAZY_LOADER => {
                        registrations.extend(self.loader_call(file, call, RegistrationKind::LazyLoad));
                    }
                    _ => {}
                }
            }
        }
        debug!(count = registrations.len(), "registrations detected");
        registrations
    }

    fn register_call(&self, file: &SourceFile, call: &CallExpression) -> Option<RegisteredController> {
        if !(2..=3).contains(&call.arguments.len()) {
            return None;
        }
        let Some(identifier) = call.arguments[0].as_str() else {
            warn!(
                file = %file.path.display(),
                line = call.span.start_line,
                "registration identifier is not a string literal; skipped"
            );
            return None;
        };
        let class = &call.arguments[1];
        match self.resolver.resolve_expression(file, class) {
            ResolvedReference::Class(key) if self.definitions.contains_key(&key) => {
                Some(RegisteredController {
                    identifier: identifier.to_string(),
                    controller: key,
                    entry_point: file.path.clone(),
                    span: call.span,
                    kind: RegistrationKind::Register,
                })
            }
            other => {
                debug!(identifier, reference = %class.display_name(), ?other, "registration target is not a controller");
                None
            }
        }
    }

    /// `eagerLoadControllersFrom("controllers", application)` registers every
    /// convention-following application controller under that directory.
    fn loader_call(
        &self,
        file: &SourceFile,
        call: &CallExpression,
        kind: RegistrationKind,
    ) -> Vec<RegisteredController> {
        let Some(directory) = call.arguments.first().and_then(|arg| arg.as_str()) else {
            warn!(file = %file.path.display(), "controller loader directory is not a string literal; skipped");
            return Vec::new();
        };
        let Some(base) = self.loader_directory(&file.path, directory) else {
            debug!(directory, "controller loader directory not resolvable");
            return Vec::new();
        };

        self.definitions
            .values()
            .filter(|definition| !definition.is_package_controller())
            .filter_map(|definition| {
                let rel = relative_posix(&definition.path, &base)?;
                is_controller_path(&rel).then(|| RegisteredController {
                    identifier: identifier_for_path(&rel),
                    controller: definition.class.clone(),
                    entry_point: file.path.clone(),
                    span: call.span,
                    kind,
                })
            })
            .collect()
    }

    fn loader_directory(&self, entry: &Path, directory: &str) -> Option<PathBuf> {
        let directory = directory.trim_end_matches('/');
        for (prefix, target) in &self.resolve.aliases {
            if directory == prefix {
                return Some(target.clone());
            }
            if let Some(rest) = directory.strip_prefix(prefix.as_str()).and_then(|r| r.strip_prefix('/')) {
                return Some(target.join(rest));
            }
        }
        if directory.starts_with('.') {
            return Some(normalize_path(&entry.parent()?.join(directory)));
        }
        let candidate = self.resolve.root.join(directory);
        candidate.is_dir().then_some(candidate)
    }
}
