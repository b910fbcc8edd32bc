//! Path to identifier transforms and attribute-name helpers.
//!
//! The path transform is exact: `widgets/thing_controller.js` is always
//! `widgets--thing`.  Attribute guessing is best-effort and only ever
//! returns identifiers the caller already knows.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::CapabilityKind;

// ---------------------------------------------------------------------------
// Compiled regex patterns (LazyLock for one-time init)
// ---------------------------------------------------------------------------

static SOURCE_EXTENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(?:js|mjs|cjs|jsx|ts|mts|cts|tsx)$").unwrap());

static CONTROLLER_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[_-])controller\.(?:js|mjs|cjs|jsx|ts|mts|cts|tsx)$").unwrap());

static CONTROLLER_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_-]controller$").unwrap());

static CAMELIZE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_-]([a-z0-9])").unwrap());

static DASHERIZE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([A-Z])").unwrap());

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data-([a-z0-9][a-z0-9_-]*?)-(target|value|class|outlet)$").unwrap()
});

/// Directories stripped from the front of a package-relative path.
const PACKAGE_SOURCE_DIRS: &[&str] = &["src", "dist", "lib", "controllers"];

pub const NAMESPACE_SEPARATOR: &str = "--";

// ---------------------------------------------------------------------------
// Path <-> identifier
// ---------------------------------------------------------------------------

/// Whether the file name follows `<name>_controller.<ext>` or
/// `<name>-controller.<ext>` (or is exactly `controller.<ext>`).
///
/// Paths whose segments would produce an identifier containing the
/// namespace separator on their own (`a__b_controller.js`, `_x/`) are
/// outside the convention.
pub fn is_controller_path(relative_path: &str) -> bool {
    let trimmed = relative_path.trim_start_matches("./");
    let file_name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    CONTROLLER_FILE_RE.is_match(file_name) && !has_ambiguous_separator(trimmed)
}

fn has_ambiguous_separator(relative_path: &str) -> bool {
    let without_ext = SOURCE_EXTENSION_RE.replace(relative_path, "");
    without_ext.split('/').any(|segment| {
        segment.starts_with(['_', '-'])
            || segment.ends_with(['_', '-'])
            || segment
                .as_bytes()
                .windows(2)
                .any(|pair| matches!(pair[0], b'_' | b'-') && matches!(pair[1], b'_' | b'-'))
    })
}

/// Identifier for a path relative to its controller root.
pub fn identifier_for_path(relative_path: &str) -> String {
    let trimmed = relative_path.trim_start_matches("./");
    let without_ext = SOURCE_EXTENSION_RE.replace(trimmed, "");
    let mut segments: Vec<String> = without_ext
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(last) = segments.last_mut() {
        if last == "controller" {
            segments.pop();
        } else {
            *last = CONTROLLER_SUFFIX_RE.replace(last, "").to_string();
        }
    }

    segments
        .iter()
        .map(|segment| segment.replace('_', "-"))
        .collect::<Vec<_>>()
        .join(NAMESPACE_SEPARATOR)
}

/// Canonical relative path for an identifier, the inverse of
/// [`identifier_for_path`] up to normalization.
pub fn controller_path_for_identifier(identifier: &str) -> String {
    let segments: Vec<String> = identifier
        .split(NAMESPACE_SEPARATOR)
        .map(|segment| segment.replace('-', "_"))
        .collect();
    let mut path = segments.join("/");
    path.push_str("_controller.js");
    path
}

/// Normal form of a convention-following controller path: `_` separators,
/// `_controller` suffix, `.js` extension.
pub fn normalize_controller_path(relative_path: &str) -> String {
    let trimmed = relative_path.trim_start_matches("./");
    let without_ext = SOURCE_EXTENSION_RE.replace(trimmed, "");
    let base = match without_ext.strip_suffix("controller") {
        Some(parent) if parent.is_empty() || parent.ends_with('/') => {
            parent.trim_end_matches('/').to_string()
        }
        _ => CONTROLLER_SUFFIX_RE.replace(&without_ext, "").to_string(),
    };
    format!("{}_controller.js", base.replace('-', "_"))
}

/// Identifier for a file inside an installed package.
///
/// `rel_in_package` is relative to the package root.  One leading
/// `src`/`dist`/`lib`/`controllers` directory is ignored.  Entry files
/// named `index` take the package's own name instead.
pub fn package_identifier(package_name: &str, rel_in_package: &str) -> String {
    let mut rest = rel_in_package.trim_start_matches("./");
    for dir in PACKAGE_SOURCE_DIRS {
        if let Some(stripped) = rest.strip_prefix(dir).and_then(|r| r.strip_prefix('/')) {
            rest = stripped;
            break;
        }
    }
    let identifier = identifier_for_path(rest);
    if identifier.is_empty() || identifier == "index" {
        let base = package_name.rsplit('/').next().unwrap_or(package_name);
        return base.replace('_', "-");
    }
    identifier
}

// ---------------------------------------------------------------------------
// Attribute naming
// ---------------------------------------------------------------------------

pub fn camelize(value: &str) -> String {
    CAMELIZE_RE
        .replace_all(value, |caps: &regex::Captures<'_>| caps[1].to_uppercase())
        .to_string()
}

pub fn dasherize(value: &str) -> String {
    DASHERIZE_RE
        .replace_all(value, |caps: &regex::Captures<'_>| {
            format!("-{}", caps[1].to_lowercase())
        })
        .to_string()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeGuess {
    pub identifier: String,
    pub capability: CapabilityKind,
    /// Camelized capability name; `None` for target attributes, whose name
    /// lives in the attribute value.
    pub name: Option<String>,
}

/// Guess which known controller a `data-*` attribute belongs to.
///
/// Limits: the longest known identifier prefix wins, so an attribute for
/// `a` with a value named `b-c` is read as belonging to `a-b` when both
/// `a` and `a-b` are known.  Unknown identifiers yield `None`.
pub fn guess_identifier_from_attribute<'a, I>(attribute: &str, known: I) -> Option<AttributeGuess>
where
    I: IntoIterator<Item = &'a str>,
{
    let caps = ATTRIBUTE_RE.captures(attribute)?;
    let middle = caps.get(1)?.as_str();
    let capability = match caps.get(2)?.as_str() {
        "target" => CapabilityKind::Targets,
        "value" => CapabilityKind::Values,
        "class" => CapabilityKind::Classes,
        _ => CapabilityKind::Outlets,
    };

    let mut known: Vec<&str> = known.into_iter().collect();
    known.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    if capability == CapabilityKind::Targets {
        return known.into_iter().find(|id| *id == middle).map(|id| AttributeGuess {
            identifier: id.to_string(),
            capability,
            name: None,
        });
    }

    known.into_iter().find_map(|id| {
        let remainder = middle.strip_prefix(id)?.strip_prefix('-')?;
        if remainder.is_empty() {
            return None;
        }
        Some(AttributeGuess {
            identifier: id.to_string(),
            capability,
            name: Some(camelize(remainder)),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Path transforms -------------------------------------------------------

    #[test]
    fn test_identifier_top_level() {
        assert_eq!(identifier_for_path("some_controller.js"), "some");
        assert_eq!(identifier_for_path("some-controller.ts"), "some");
    }

    #[test]
    fn test_identifier_nested() {
        assert_eq!(
            identifier_for_path("namespaced/some_controller.js"),
            "namespaced--some"
        );
        assert_eq!(
            identifier_for_path("a/bunch/of/levels/some_controller.js"),
            "a--bunch--of--levels--some"
        );
        assert_eq!(identifier_for_path("widgets/thing_controller.js"), "widgets--thing");
    }

    #[test]
    fn test_identifier_folds_underscores() {
        assert_eq!(
            identifier_for_path("admin_area/date_picker_controller.js"),
            "admin-area--date-picker"
        );
    }

    #[test]
    fn test_identifier_bare_controller_file() {
        assert_eq!(identifier_for_path("a/bunch/of/levels/controller.js"), "a--bunch--of--levels");
    }

    #[test]
    fn test_is_controller_path() {
        assert!(is_controller_path("a/b/hello_controller.js"));
        assert!(is_controller_path("hello-controller.tsx"));
        assert!(is_controller_path("controller.js"));
        assert!(!is_controller_path("a/application.js"));
        assert!(!is_controller_path("a/mycontroller.js"));
        assert!(is_controller_path("a/b/hello_controller.cts"));
        assert!(!is_controller_path("a__b_controller.js"));
        assert!(!is_controller_path("a--b-controller.js"));
        assert!(!is_controller_path("_private/x_controller.js"));
    }

    #[test]
    fn test_round_trip_law() {
        let paths = [
            "some_controller.js",
            "widgets/thing_controller.js",
            "admin/date-picker_controller.ts",
            "a/bunch/of/levels/some-controller.mjs",
            "multi_word/inner_name_controller.jsx",
            "a/controller.js",
            "nested/deeper/controller.cts",
        ];
        for path in paths {
            assert_eq!(
                controller_path_for_identifier(&identifier_for_path(path)),
                normalize_controller_path(path),
                "round trip failed for {path}"
            );
        }
    }

    #[test]
    fn test_controller_path_for_identifier() {
        assert_eq!(
            controller_path_for_identifier("admin-area--date-picker"),
            "admin_area/date_picker_controller.js"
        );
    }

    #[test]
    fn test_package_identifier() {
        assert_eq!(package_identifier("tailwindcss-stimulus-components", "src/dropdown.js"), "dropdown");
        assert_eq!(
            package_identifier("@stimulus-components/clipboard", "dist/index.mjs"),
            "clipboard"
        );
        assert_eq!(package_identifier("pkg", "lib/forms/select_controller.js"), "forms--select");
    }

    // -- Attribute helpers ----------------------------------------------------

    #[test]
    fn test_camelize_and_dasherize() {
        assert_eq!(camelize("some-value_name"), "someValueName");
        assert_eq!(dasherize("someValueName"), "some-value-name");
    }

    #[test]
    fn test_guess_value_attribute() {
        let known = ["modal", "modal-dialog", "search"];
        let guess =
            guess_identifier_from_attribute("data-modal-dialog-open-value", known.iter().copied()).unwrap();
        assert_eq!(guess.identifier, "modal-dialog");
        assert_eq!(guess.capability, CapabilityKind::Values);
        assert_eq!(guess.name.as_deref(), Some("open"));

        let guess =
            guess_identifier_from_attribute("data-search-results-url-value", known.iter().copied()).unwrap();
        assert_eq!(guess.identifier, "search");
        assert_eq!(guess.name.as_deref(), Some("resultsUrl"));
    }

    #[test]
    fn test_guess_namespaced_target() {
        let known = ["admin--users"];
        let guess =
            guess_identifier_from_attribute("data-admin--users-target", known.iter().copied()).unwrap();
        assert_eq!(guess.identifier, "admin--users");
        assert_eq!(guess.name, None);
    }

    #[test]
    fn test_guess_unknown_returns_none() {
        assert_eq!(
            guess_identifier_from_attribute("data-nothing-open-value", ["modal"].iter().copied()),
            None
        );
        assert_eq!(
            guess_identifier_from_attribute("class", ["modal"].iter().copied()),
            None
        );
    }
}
