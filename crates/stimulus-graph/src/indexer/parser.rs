//! Language parsing wrapper used by extraction passes.
//!
//! Syntax errors never escape this module: they are collected from the
//! tree's ERROR and MISSING nodes and stored on the returned `SourceFile`.

use std::path::{Path, PathBuf};

use tree_sitter::{Language, Node, Parser};

use crate::errors::GraphResult;
use crate::indexer::filesystem::{compute_content_hash, origin_for_path};
use crate::indexer::symbols::{extract_declarations, node_text, span_of};
use crate::models::{ParseError, SourceFile, SourceLanguage, Span};
use crate::query::guards::MAX_PARSE_ERRORS;

pub fn language_for(language: SourceLanguage) -> Language {
    match language {
        SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
    }
}

/// Parse one file's text into a `SourceFile`.
///
/// Only a grammar load failure is an error.  A file with syntax errors keeps
/// its imports, exports, calls, and class shells, but its classes carry no
/// members or capabilities.
pub fn parse_source(path: PathBuf, text: String, language: SourceLanguage) -> GraphResult<SourceFile> {
    let mut parser = Parser::new();
    parser.set_language(&language_for(language))?;

    let origin = origin_for_path(&path);
    let content_hash = compute_content_hash(&text);

    let Some(tree) = parser.parse(text.as_bytes(), None) else {
        return Ok(SourceFile {
            parse_errors: vec![ParseError {
                message: "Parser produced no tree".to_string(),
                span: Span::default(),
            }],
            path,
            origin,
            language,
            content_hash,
            text,
            classes: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            calls: Vec::new(),
        });
    };

    let root = tree.root_node();
    let mut parse_errors = Vec::new();
    if root.has_error() {
        collect_errors(root, &text, &mut parse_errors);
    }
    let declarations = extract_declarations(root, &text, &path, parse_errors.is_empty());

    Ok(SourceFile {
        path,
        origin,
        language,
        content_hash,
        parse_errors,
        classes: declarations.classes,
        imports: declarations.imports,
        exports: declarations.exports,
        calls: declarations.calls,
        text,
    })
}

/// Parse a file already read from disk, picking the grammar from its path.
pub fn parse_path(path: &Path, text: String) -> GraphResult<Option<SourceFile>> {
    match crate::indexer::filesystem::detect_language(path) {
        Some(language) => parse_source(path.to_path_buf(), text, language).map(Some),
        None => Ok(None),
    }
}

fn collect_errors(node: Node<'_>, text: &str, errors: &mut Vec<ParseError>) {
    if errors.len() >= MAX_PARSE_ERRORS {
        return;
    }
    if node.is_missing() {
        errors.push(ParseError {
            message: format!("Missing `{}`", node.kind()),
            span: span_of(node),
        });
        return;
    }
    if node.is_error() {
        let snippet: String = node_text(node, text).chars().take(40).collect();
        errors.push(ParseError {
            message: format!("Unexpected syntax near `{}`", snippet.trim()),
            span: span_of(node),
        });
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_errors(child, text, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileOrigin;

    #[test]
    fn test_clean_parse_has_no_errors() {
        let file = parse_source(
            PathBuf::from("/p/app/hello_controller.js"),
            "export default class extends Controller { connect() {} }".to_string(),
            SourceLanguage::JavaScript,
        )
        .unwrap();
        assert!(!file.has_errors());
        assert_eq!(file.origin, FileOrigin::Application);
        assert_eq!(file.classes.len(), 1);
        assert_eq!(file.classes[0].capabilities.actions.len(), 1);
    }

    #[test]
    fn test_syntax_error_is_captured_as_data() {
        let file = parse_source(
            PathBuf::from("/p/app/broken_controller.js"),
            "import { Controller } from \"@hotwired/stimulus\"\nexport default class extends Controller {\n  static targets = [\"a\"\n  connect( {}\n".to_string(),
            SourceLanguage::JavaScript,
        )
        .unwrap();
        assert!(file.has_errors());
        assert!(file.parse_errors.iter().all(|e| e.span.start_line >= 1));
        assert_eq!(file.imports.len(), 1);
        assert!(file
            .classes
            .iter()
            .all(|class| class.capabilities.targets.is_empty() && class.members.is_empty()));
    }

    #[test]
    fn test_package_origin() {
        let file = parse_source(
            PathBuf::from("/p/node_modules/tailwindcss-stimulus-components/dist/index.js"),
            String::new(),
            SourceLanguage::JavaScript,
        )
        .unwrap();
        assert!(file.is_package_file());
    }

    #[test]
    fn test_tsx_grammar() {
        let file = parse_source(
            PathBuf::from("/p/app/view_controller.tsx"),
            "export default class View extends Controller { render() { return <div /> } }"
                .to_string(),
            SourceLanguage::Tsx,
        )
        .unwrap();
        assert!(!file.has_errors());
        assert_eq!(file.classes[0].name.as_deref(), Some("View"));
    }

    #[test]
    fn test_parse_path_skips_unknown_extension() {
        let parsed = parse_path(Path::new("/p/readme.md"), String::new()).unwrap();
        assert!(parsed.is_none());
    }
}
