//! Filesystem scanning helpers for analysis passes.

use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::errors::{GraphError, GraphResult};
use crate::models::{FileOrigin, SourceLanguage};
use crate::query::guards::MAX_SOURCE_BYTES;

/// Extensions probed by module resolution, in probing order.
pub const SOURCE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx"];

const LANGUAGE_BY_EXTENSION: &[(&str, SourceLanguage)] = &[
    ("js", SourceLanguage::JavaScript),
    ("mjs", SourceLanguage::JavaScript),
    ("cjs", SourceLanguage::JavaScript),
    ("jsx", SourceLanguage::JavaScript),
    ("ts", SourceLanguage::TypeScript),
    ("mts", SourceLanguage::TypeScript),
    ("cts", SourceLanguage::TypeScript),
    ("tsx", SourceLanguage::Tsx),
];

const NODE_MODULES: &str = "node_modules";

pub fn detect_language(path: &Path) -> Option<SourceLanguage> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    if path
        .file_name()
        .map(|name| name.to_string_lossy().ends_with(".d.ts"))
        .unwrap_or(false)
    {
        return None;
    }
    LANGUAGE_BY_EXTENSION
        .iter()
        .find(|(e, _)| *e == ext.as_str())
        .map(|(_, lang)| *lang)
}

pub fn compute_content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Read a source file, refusing anything over the size guard.
pub fn read_source(path: &Path) -> GraphResult<String> {
    let metadata = std::fs::metadata(path).map_err(|err| GraphError::io(path, err))?;
    if metadata.len() > MAX_SOURCE_BYTES {
        return Err(GraphError::io(
            path,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("file exceeds {MAX_SOURCE_BYTES} bytes"),
            ),
        ));
    }
    std::fs::read_to_string(path).map_err(|err| GraphError::io(path, err))
}

/// Walk the application sources under `root`, skipping excluded directories
/// and anything gitignored.  Results are sorted so scans are deterministic.
pub fn iter_project_files(root: &Path, config: &AnalyzerConfig) -> Vec<PathBuf> {
    let excluded = config.excluded_dirs.clone();
    let mut result: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir || entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !excluded.iter().any(|dir| *dir == name)
        })
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .filter(|path| detect_language(path).is_some())
        .collect();
    result.sort();
    result
}

/// Classify a path as application or package code by its last
/// `node_modules` component.
pub fn origin_for_path(path: &Path) -> FileOrigin {
    match package_root_for_path(path) {
        Some((name, _)) => FileOrigin::Package { name },
        None => FileOrigin::Application,
    }
}

/// Package name and on-disk root of the package owning `path`, if any.
pub fn package_root_for_path(path: &Path) -> Option<(String, PathBuf)> {
    let components: Vec<Component<'_>> = path.components().collect();
    let index = components
        .iter()
        .rposition(|c| c.as_os_str() == NODE_MODULES)?;
    let first = components.get(index + 1)?.as_os_str().to_string_lossy().to_string();
    let (name, depth) = if first.starts_with('@') {
        let second = components.get(index + 2)?.as_os_str().to_string_lossy();
        (format!("{first}/{second}"), index + 3)
    } else {
        (first, index + 2)
    };
    let root: PathBuf = components[..depth].iter().collect();
    Some((name, root))
}

/// Lexically normalize a path: drop `.` and fold `..` without touching disk.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut stack: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match stack.last() {
                Some(Component::Normal(_)) => {
                    stack.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => stack.push(component),
            },
            other => stack.push(other),
        }
    }
    stack.iter().collect()
}

/// `path` relative to `base` using forward slashes.
pub fn relative_posix(path: &Path, base: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(
            detect_language(Path::new("a/hello_controller.js")),
            Some(SourceLanguage::JavaScript)
        );
        assert_eq!(
            detect_language(Path::new("a/b.TS")),
            Some(SourceLanguage::TypeScript)
        );
        assert_eq!(detect_language(Path::new("a/b.tsx")), Some(SourceLanguage::Tsx));
        assert_eq!(detect_language(Path::new("a/types.d.ts")), None);
        assert_eq!(detect_language(Path::new("a/b.rb")), None);
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(compute_content_hash("abc"), compute_content_hash("abc"));
        assert_ne!(compute_content_hash("abc"), compute_content_hash("abd"));
        assert_eq!(compute_content_hash("").len(), 64);
    }

    #[test]
    fn test_origin_for_scoped_package() {
        let path = Path::new("/p/node_modules/@acme/widgets/dist/index.js");
        assert_eq!(
            origin_for_path(path),
            FileOrigin::Package {
                name: "@acme/widgets".into()
            }
        );
        let (_, root) = package_root_for_path(path).unwrap();
        assert_eq!(root, PathBuf::from("/p/node_modules/@acme/widgets"));
    }

    #[test]
    fn test_origin_uses_innermost_node_modules() {
        let path = Path::new("/p/node_modules/a/node_modules/b/index.js");
        assert_eq!(origin_for_path(path).package_name(), Some("b"));
        assert_eq!(
            origin_for_path(Path::new("/p/app/x_controller.js")),
            FileOrigin::Application
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/p/app/./controllers/../lib/x.js")),
            PathBuf::from("/p/app/lib/x.js")
        );
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn test_iter_project_files_skips_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("app/javascript/controllers")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("app/javascript/controllers/a_controller.js"), "").unwrap();
        std::fs::write(root.join("app/javascript/controllers/readme.md"), "").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();

        let files = iter_project_files(root, &AnalyzerConfig::default());
        assert_eq!(
            files,
            vec![root.join("app/javascript/controllers/a_controller.js")]
        );
    }

    #[test]
    fn test_read_source_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_source(&tmp.path().join("missing.js")).unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }
}
