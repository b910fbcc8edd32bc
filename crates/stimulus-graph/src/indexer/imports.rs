//! Module specifier resolution from import records to files on disk.
//!
//! Mirrors the host bundler rules closely enough for static analysis:
//! relative and root-absolute paths with extension and index probing,
//! configured aliases, then `node_modules` lookup walking upwards.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::indexer::filesystem::{detect_language, normalize_path, SOURCE_EXTENSIONS};
use crate::indexer::manifest::{resolve_entry_point, PackageManifest};
use crate::models::{ModuleResolution, UnresolvedReason};

/// Settings shared by every resolution in one project.
#[derive(Clone, Debug, Default)]
pub struct ResolveOptions {
    pub root: PathBuf,
    /// Alias prefix to absolute directory, longest prefix first.
    pub aliases: Vec<(String, PathBuf)>,
    pub framework_packages: Vec<String>,
}

impl ResolveOptions {
    pub fn new(
        root: PathBuf,
        aliases: impl IntoIterator<Item = (String, PathBuf)>,
        framework_packages: Vec<String>,
    ) -> Self {
        let mut aliases: Vec<(String, PathBuf)> = aliases.into_iter().collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self {
            root,
            aliases,
            framework_packages,
        }
    }

    pub fn is_framework_package(&self, name: &str) -> bool {
        self.framework_packages.iter().any(|package| package == name)
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Split a bare specifier into package name and optional subpath.
/// `@scope/pkg/a/b` gives `("@scope/pkg", Some("a/b"))`.
pub fn split_package_specifier(specifier: &str) -> Option<(String, Option<String>)> {
    let mut parts = specifier.splitn(3, '/');
    let first = parts.next().filter(|part| !part.is_empty())?;
    if first.starts_with('@') {
        let second = parts.next().filter(|part| !part.is_empty())?;
        let rest = parts.next().map(str::to_string).filter(|rest| !rest.is_empty());
        return Some((format!("{first}/{second}"), rest));
    }
    let rest: Vec<&str> = parts.collect();
    let subpath = if rest.is_empty() {
        None
    } else {
        Some(rest.join("/")).filter(|rest| !rest.is_empty())
    };
    Some((first.to_string(), subpath))
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = base.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Probe `base` as a source file: exact match, each extension appended,
/// then `index.<ext>` inside it.
pub fn probe_file(base: &Path) -> Option<PathBuf> {
    let base = normalize_path(base);
    if base.is_file() && detect_language(&base).is_some() {
        return Some(base);
    }
    for ext in SOURCE_EXTENSIONS {
        let candidate = with_suffix(&base, &format!(".{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if base.is_dir() {
        for ext in SOURCE_EXTENSIONS {
            let candidate = base.join(format!("index.{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Nearest `node_modules/<name>` directory at or above `from_dir`.
pub fn find_package_root(from_dir: &Path, name: &str) -> Option<PathBuf> {
    from_dir
        .ancestors()
        .map(|dir| dir.join("node_modules").join(name))
        .find(|candidate| candidate.is_dir())
}

/// Resolve `specifier` as imported from `from_file`.
pub fn resolve_module(from_file: &Path, specifier: &str, options: &ResolveOptions) -> ModuleResolution {
    let from_dir = from_file.parent().unwrap_or(&options.root);

    if is_relative(specifier) {
        return probe_or(&from_dir.join(specifier), UnresolvedReason::MissingFile);
    }
    if let Some(rooted) = specifier.strip_prefix('/') {
        return probe_or(&options.root.join(rooted), UnresolvedReason::MissingFile);
    }

    let Some((name, subpath)) = split_package_specifier(specifier) else {
        return ModuleResolution::Unresolved(UnresolvedReason::MissingPackage);
    };
    if options.is_framework_package(&name) {
        return ModuleResolution::Framework;
    }

    for (prefix, dir) in &options.aliases {
        let rest = if specifier == prefix {
            Some("")
        } else {
            specifier
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
        };
        if let Some(rest) = rest {
            if let Some(path) = probe_file(&dir.join(rest)) {
                return ModuleResolution::Resolved(path);
            }
            debug!(specifier, alias = %prefix, "alias matched but no file found");
        }
    }

    let Some(package_root) = find_package_root(from_dir, &name) else {
        return ModuleResolution::Unresolved(UnresolvedReason::MissingPackage);
    };
    match subpath {
        Some(subpath) => probe_or(&package_root.join(subpath), UnresolvedReason::MissingFile),
        None => {
            let manifest = PackageManifest::read(&package_root).unwrap_or_else(|err| {
                debug!(package = %name, error = %err, "ignoring unreadable package manifest");
                None
            });
            match resolve_entry_point(&package_root, manifest.as_ref()) {
                Some(entry) => ModuleResolution::Resolved(entry),
                None => ModuleResolution::Unresolved(UnresolvedReason::NoEntryPoint),
            }
        }
    }
}

fn probe_or(base: &Path, reason: UnresolvedReason) -> ModuleResolution {
    match probe_file(base) {
        Some(path) => ModuleResolution::Resolved(path),
        None => ModuleResolution::Unresolved(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn options(root: &Path) -> ResolveOptions {
        ResolveOptions::new(
            root.to_path_buf(),
            vec![(
                "controllers".to_string(),
                root.join("app/javascript/controllers"),
            )],
            vec!["@hotwired/stimulus".to_string(), "stimulus".to_string()],
        )
    }

    #[test]
    fn test_split_package_specifier() {
        assert_eq!(
            split_package_specifier("@scope/pkg/a/b"),
            Some(("@scope/pkg".to_string(), Some("a/b".to_string())))
        );
        assert_eq!(
            split_package_specifier("pkg"),
            Some(("pkg".to_string(), None))
        );
        assert_eq!(
            split_package_specifier("pkg/sub"),
            Some(("pkg".to_string(), Some("sub".to_string())))
        );
        assert_eq!(split_package_specifier("@scope"), None);
    }

    #[test]
    fn test_relative_probing_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "app/base_controller.js", "");
        write(root, "app/shared/index.ts", "");
        let from = root.join("app/child_controller.js");
        let opts = options(root);

        assert_eq!(
            resolve_module(&from, "./base_controller", &opts),
            ModuleResolution::Resolved(root.join("app/base_controller.js"))
        );
        assert_eq!(
            resolve_module(&from, "./base_controller.js", &opts),
            ModuleResolution::Resolved(root.join("app/base_controller.js"))
        );
        assert_eq!(
            resolve_module(&from, "./shared", &opts),
            ModuleResolution::Resolved(root.join("app/shared/index.ts"))
        );
        assert_eq!(
            resolve_module(&from, "./missing", &opts),
            ModuleResolution::Unresolved(UnresolvedReason::MissingFile)
        );
    }

    #[test]
    fn test_framework_package_is_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("a.js");
        assert_eq!(
            resolve_module(&from, "@hotwired/stimulus", &options(tmp.path())),
            ModuleResolution::Framework
        );
    }

    #[test]
    fn test_alias_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "app/javascript/controllers/hello_controller.js", "");
        write(root, "app/javascript/controllers/index.js", "");
        let from = root.join("app/javascript/application.js");
        let opts = options(root);
        assert_eq!(
            resolve_module(&from, "controllers/hello_controller", &opts),
            ModuleResolution::Resolved(root.join("app/javascript/controllers/hello_controller.js"))
        );
        assert_eq!(
            resolve_module(&from, "controllers", &opts),
            ModuleResolution::Resolved(root.join("app/javascript/controllers/index.js"))
        );
    }

    #[test]
    fn test_node_modules_walk_up_and_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "node_modules/widgets/package.json", r#"{"main":"lib/main.js"}"#);
        write(root, "node_modules/widgets/lib/main.js", "");
        write(root, "node_modules/widgets/lib/extra.js", "");
        write(root, "node_modules/empty/package.json", r#"{"main":"gone.js"}"#);
        let from = root.join("app/javascript/controllers/deep/a_controller.js");
        let opts = options(root);

        assert_eq!(
            resolve_module(&from, "widgets", &opts),
            ModuleResolution::Resolved(root.join("node_modules/widgets/lib/main.js"))
        );
        assert_eq!(
            resolve_module(&from, "widgets/lib/extra", &opts),
            ModuleResolution::Resolved(root.join("node_modules/widgets/lib/extra.js"))
        );
        assert_eq!(
            resolve_module(&from, "empty", &opts),
            ModuleResolution::Unresolved(UnresolvedReason::NoEntryPoint)
        );
        assert_eq!(
            resolve_module(&from, "nowhere", &opts),
            ModuleResolution::Unresolved(UnresolvedReason::MissingPackage)
        );
    }
}
