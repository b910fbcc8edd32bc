pub mod capabilities;
pub mod identifiers;
pub mod inheritance;
pub mod packages;
pub mod registration;

use std::path::Path;

use crate::models::{AncestorChain, ClassDeclaration, ExportTarget, SourceFile};

/// Whether a class counts as a controller.
///
/// A clean chain to the root always qualifies.  A class whose chain could
/// not be finished (unknown base, cycle, parse error on the way) still
/// qualifies when it extends something and lives in a file that follows the
/// controller naming convention.  An errored chain also qualifies when it
/// passes through a controller file, so a clean subclass of a broken base
/// is published with its error flag instead of vanishing.
pub fn is_controller<F>(
    declaration: &ClassDeclaration,
    chain: &AncestorChain,
    follows_convention: F,
) -> bool
where
    F: Fn(&Path) -> bool,
{
    if chain.is_complete() && chain.errored_files.is_empty() {
        return true;
    }
    if declaration.superclass.is_none() {
        return false;
    }
    let errored = capabilities::is_errored(chain);
    if follows_convention(&declaration.key.path) {
        return chain.is_complete() || chain.is_open_ended() || errored;
    }
    errored
        && chain
            .ancestors
            .iter()
            .map(|key| key.path.as_path())
            .chain(chain.errored_files.iter().map(|path| path.as_path()))
            .filter(|path| *path != declaration.key.path)
            .any(|path| follows_convention(path))
}

/// The class a file publishes as its controller: the default export when it
/// qualifies, otherwise the first qualifying class in source order.
pub fn controller_class_of<'f, F>(file: &'f SourceFile, qualifies: F) -> Option<&'f ClassDeclaration>
where
    F: Fn(&ClassDeclaration) -> bool,
{
    let default_export = file
        .exports
        .iter()
        .find(|export| export.exported == "default")
        .and_then(|export| match &export.target {
            ExportTarget::Class { offset } => file.class_at(*offset),
            ExportTarget::Binding { local } => file.class_named(local),
            _ => None,
        });
    if let Some(class) = default_export.filter(|class| qualifies(class)) {
        return Some(class);
    }
    file.classes.iter().find(|class| qualifies(class))
}
