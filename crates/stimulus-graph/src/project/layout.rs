//! Where controllers live inside one project root.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::analysis::identifiers::{controller_path_for_identifier, identifier_for_path, is_controller_path};
use crate::config::AnalyzerConfig;
use crate::indexer::filesystem::{relative_posix, SOURCE_EXTENSIONS};

const ENTRY_POINT_STEMS: &[&str] = &["index", "application"];
const APPLICATION_ENTRY_DIR: &str = "app/javascript";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectLayout {
    root: PathBuf,
    controller_roots: Vec<PathBuf>,
    explicit_entry_points: Vec<PathBuf>,
}

impl ProjectLayout {
    pub fn new(root: &Path, config: &AnalyzerConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            controller_roots: config
                .controller_roots
                .iter()
                .map(|dir| root.join(dir))
                .collect(),
            explicit_entry_points: config
                .registration_entry_points
                .iter()
                .map(|entry| root.join(entry))
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn controller_roots(&self) -> &[PathBuf] {
        &self.controller_roots
    }

    /// First existing controller root, else the first configured one.
    pub fn primary_root(&self) -> PathBuf {
        self.controller_roots
            .iter()
            .find(|dir| dir.is_dir())
            .or_else(|| self.controller_roots.first())
            .cloned()
            .unwrap_or_else(|| self.root.clone())
    }

    /// Longest controller root containing `path`, falling back to the
    /// project root.
    pub fn root_for(&self, path: &Path) -> &Path {
        self.controller_roots
            .iter()
            .filter(|dir| path.starts_with(dir))
            .max_by_key(|dir| dir.components().count())
            .map(PathBuf::as_path)
            .unwrap_or(self.root.as_path())
    }

    pub fn relative_path(&self, path: &Path) -> Option<String> {
        relative_posix(path, self.root_for(path))
    }

    pub fn follows_convention(&self, path: &Path) -> bool {
        self.relative_path(path)
            .is_some_and(|rel| is_controller_path(&rel))
    }

    /// Identifier of an application file by the path transform.
    pub fn identifier_for(&self, path: &Path) -> Option<String> {
        let rel = self.relative_path(path)?;
        let identifier = identifier_for_path(&rel);
        (!identifier.is_empty()).then_some(identifier)
    }

    pub fn controller_path_for_identifier(&self, identifier: &str) -> PathBuf {
        self.primary_root()
            .join(controller_path_for_identifier(identifier))
    }

    /// Registration entry points that exist on disk, sorted.
    pub fn entry_points(&self) -> Vec<PathBuf> {
        if !self.explicit_entry_points.is_empty() {
            return self
                .explicit_entry_points
                .iter()
                .filter(|path| path.is_file())
                .cloned()
                .collect();
        }
        let dirs = self
            .controller_roots
            .iter()
            .cloned()
            .chain(std::iter::once(self.root.join(APPLICATION_ENTRY_DIR)));
        let mut entries: Vec<PathBuf> = dirs
            .flat_map(|dir| {
                ENTRY_POINT_STEMS.iter().flat_map(move |stem| {
                    let dir = dir.clone();
                    SOURCE_EXTENSIONS
                        .iter()
                        .map(move |ext| dir.join(format!("{stem}.{ext}")))
                })
            })
            .filter(|path| path.is_file())
            .collect();
        entries.sort();
        entries.dedup();
        entries
    }

    pub fn is_entry_point(&self, path: &Path) -> bool {
        if !self.explicit_entry_points.is_empty() {
            return self.explicit_entry_points.iter().any(|entry| entry == path);
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            return false;
        };
        let Some(parent) = path.parent() else {
            return false;
        };
        ENTRY_POINT_STEMS.contains(&stem)
            && (self.controller_roots.iter().any(|dir| dir == parent)
                || parent == self.root.join(APPLICATION_ENTRY_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(root: &Path) -> ProjectLayout {
        ProjectLayout::new(root, &AnalyzerConfig::default())
    }

    #[test]
    fn test_identifier_uses_longest_root() {
        let root = Path::new("/proj");
        let layout = layout(root);
        assert_eq!(
            layout
                .identifier_for(&root.join("app/javascript/controllers/widgets/thing_controller.js"))
                .as_deref(),
            Some("widgets--thing")
        );
        assert_eq!(
            layout.identifier_for(&root.join("app/javascript/admin/panel_controller.ts")).as_deref(),
            Some("admin--panel")
        );
        assert!(layout.follows_convention(&root.join("lib/other_controller.js")));
        assert!(!layout.follows_convention(&root.join("app/javascript/application.js")));
    }

    #[test]
    fn test_controller_path_uses_primary_root() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src/controllers")).unwrap();
        let layout = layout(tmp.path());
        assert_eq!(layout.primary_root(), tmp.path().join("src/controllers"));
        assert_eq!(
            layout.controller_path_for_identifier("admin--date-picker"),
            tmp.path().join("src/controllers/admin/date_picker_controller.js")
        );
    }

    #[test]
    fn test_entry_points_default_locations() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("app/javascript/controllers")).unwrap();
        std::fs::write(root.join("app/javascript/controllers/index.js"), "").unwrap();
        std::fs::write(root.join("app/javascript/application.ts"), "").unwrap();
        let layout = layout(root);
        assert_eq!(
            layout.entry_points(),
            vec![
                root.join("app/javascript/application.ts"),
                root.join("app/javascript/controllers/index.js"),
            ]
        );
        assert!(layout.is_entry_point(&root.join("app/javascript/controllers/index.js")));
        assert!(!layout.is_entry_point(&root.join("app/javascript/controllers/hello_controller.js")));
    }

    #[test]
    fn test_explicit_entry_points() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("boot.js"), "").unwrap();
        let config = AnalyzerConfig {
            registration_entry_points: vec!["boot.js".to_string(), "gone.js".to_string()],
            ..AnalyzerConfig::default()
        };
        let layout = ProjectLayout::new(root, &config);
        assert_eq!(layout.entry_points(), vec![root.join("boot.js")]);
        assert!(layout.is_entry_point(&root.join("gone.js")));
    }
}
