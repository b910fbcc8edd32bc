//! Declaration extraction from tree-sitter syntax trees.
//!
//! Walks the top level of a module and produces the closed set of
//! declarations the resolver works with: classes, imports, exports, and
//! top-level calls.  Any syntax shape not listed here is ignored or kept as
//! `Unsupported`, never assumed.

use std::path::Path;

use tree_sitter::Node;

use crate::indexer::members::classify_class_body;
use crate::models::{
    CallExpression, ClassDeclaration, ClassKey, ExportDeclaration, ExportTarget, Expression,
    ExpressionKind, ImportBinding, ImportDeclaration, ImportedName, LocalCapabilities,
    ObjectEntry, Span,
};

// ---------------------------------------------------------------------------
// Node helpers
// ---------------------------------------------------------------------------

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

const WRAPPER_KINDS: &[&str] = &[
    "parenthesized_expression",
    "as_expression",
    "satisfies_expression",
    "non_null_expression",
];

const NOT_A_CLASS_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "arrow_function",
    "string",
    "template_string",
    "number",
    "true",
    "false",
    "null",
    "object",
    "array",
];

pub(crate) fn span_of(node: Node<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_line: start.row + 1,
        start_column: start.column,
        end_line: end.row + 1,
        end_column: end.column,
    }
}

pub(crate) fn node_text<'a>(node: Node<'_>, text: &'a str) -> &'a str {
    text.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Named children with comments filtered out.
pub(crate) fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

pub(crate) fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

/// Strip TypeScript assertions and parentheses around an expression.
pub(crate) fn unwrap_expression(mut node: Node<'_>) -> Node<'_> {
    while WRAPPER_KINDS.contains(&node.kind()) {
        match named_children(node).into_iter().next() {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

pub(crate) fn is_class_node(node: Node<'_>) -> bool {
    CLASS_KINDS.contains(&node.kind())
}

/// Contents of a string or substitution-free template literal.
pub(crate) fn string_value(node: Node<'_>, text: &str) -> Option<String> {
    match node.kind() {
        "string" => Some(unquote(node_text(node, text))),
        "template_string" => {
            if named_children(node)
                .iter()
                .any(|child| child.kind() == "template_substitution")
            {
                None
            } else {
                Some(unquote(node_text(node, text)))
            }
        }
        _ => None,
    }
}

fn unquote(raw: &str) -> String {
    let inner = if raw.len() >= 2 {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();
    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    match radix {
        Some(radix) => i64::from_str_radix(&lower[2..], radix)
            .ok()
            .map(|value| value as f64),
        None => lower.trim_end_matches('n').parse::<f64>().ok(),
    }
}

fn property_key(node: Node<'_>, text: &str) -> Option<String> {
    match node.kind() {
        "property_identifier" | "identifier" | "private_property_identifier" | "number"
        | "default" => {
            Some(node_text(node, text).to_string())
        }
        "string" => string_value(node, text),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Expression conversion
// ---------------------------------------------------------------------------

pub(crate) fn convert_expression(node: Node<'_>, text: &str) -> Expression {
    let node = unwrap_expression(node);
    let span = span_of(node);
    let kind = match node.kind() {
        "identifier" => ExpressionKind::Identifier(node_text(node, text).to_string()),
        "member_expression" => {
            let object = node.child_by_field_name("object");
            let property = node.child_by_field_name("property");
            match (object, property) {
                (Some(object), Some(property)) => ExpressionKind::Member {
                    object: Box::new(convert_expression(object, text)),
                    property: node_text(property, text).to_string(),
                },
                _ => ExpressionKind::Unsupported(node.kind().to_string()),
            }
        }
        "string" | "template_string" => match string_value(node, text) {
            Some(value) => ExpressionKind::String(value),
            None => ExpressionKind::Unsupported(node.kind().to_string()),
        },
        "number" => match parse_number(node_text(node, text)) {
            Some(value) => ExpressionKind::Number(value),
            None => ExpressionKind::Unsupported("number".to_string()),
        },
        "unary_expression" => convert_negative_number(node, text)
            .unwrap_or_else(|| ExpressionKind::Unsupported(node.kind().to_string())),
        "true" => ExpressionKind::Boolean(true),
        "false" => ExpressionKind::Boolean(false),
        "null" => ExpressionKind::Null,
        "array" => ExpressionKind::Array(
            named_children(node)
                .into_iter()
                .map(|element| convert_expression(element, text))
                .collect(),
        ),
        "object" => ExpressionKind::Object(
            named_children(node)
                .into_iter()
                .map(|entry| convert_object_entry(entry, text))
                .collect(),
        ),
        "call_expression" => match convert_call(node, text) {
            Some(call) => ExpressionKind::Call(Box::new(call)),
            None => ExpressionKind::Unsupported(node.kind().to_string()),
        },
        other => ExpressionKind::Unsupported(other.to_string()),
    };
    Expression::new(span, kind)
}

fn convert_negative_number(node: Node<'_>, text: &str) -> Option<ExpressionKind> {
    let operator = node.child_by_field_name("operator")?;
    let argument = node.child_by_field_name("argument")?;
    if node_text(operator, text) != "-" || argument.kind() != "number" {
        return None;
    }
    parse_number(node_text(argument, text)).map(|value| ExpressionKind::Number(-value))
}

fn convert_object_entry(node: Node<'_>, text: &str) -> ObjectEntry {
    let span = span_of(node);
    match node.kind() {
        "pair" => {
            let key = node.child_by_field_name("key");
            let value = node.child_by_field_name("value");
            match (key, value) {
                (Some(key), Some(value)) => match property_key(key, text) {
                    Some(name) => ObjectEntry::Property {
                        key: name,
                        value: convert_expression(value, text),
                        span,
                    },
                    None => ObjectEntry::Computed { span },
                },
                _ => ObjectEntry::Computed { span },
            }
        }
        "shorthand_property_identifier" => ObjectEntry::Shorthand {
            name: node_text(node, text).to_string(),
            span,
        },
        "spread_element" => ObjectEntry::Spread { span },
        "method_definition" => match node
            .child_by_field_name("name")
            .and_then(|name| property_key(name, text))
        {
            Some(key) => ObjectEntry::Property {
                key,
                value: Expression::new(span, ExpressionKind::Unsupported("method".into())),
                span,
            },
            None => ObjectEntry::Computed { span },
        },
        _ => ObjectEntry::Computed { span },
    }
}

pub(crate) fn convert_call(node: Node<'_>, text: &str) -> Option<CallExpression> {
    let callee = node.child_by_field_name("function")?;
    let arguments = node
        .child_by_field_name("arguments")
        .map(|args| {
            named_children(args)
                .into_iter()
                .map(|arg| convert_expression(arg, text))
                .collect()
        })
        .unwrap_or_default();
    Some(CallExpression {
        callee: convert_expression(callee, text),
        arguments,
        span: span_of(node),
    })
}

// ---------------------------------------------------------------------------
// Top-level extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Declarations {
    pub classes: Vec<ClassDeclaration>,
    pub imports: Vec<ImportDeclaration>,
    pub exports: Vec<ExportDeclaration>,
    pub calls: Vec<CallExpression>,
}

/// Extract declarations from a module root.
///
/// With `with_members` unset only class shells (name, superclass, span) are
/// produced; used for files that failed to parse cleanly.
pub fn extract_declarations(
    root: Node<'_>,
    text: &str,
    path: &Path,
    with_members: bool,
) -> Declarations {
    let mut extractor = Extractor {
        text,
        path,
        with_members,
        out: Declarations::default(),
    };
    for child in named_children(root) {
        extractor.visit_statement(child);
    }
    extractor.out
}

struct Extractor<'a> {
    text: &'a str,
    path: &'a Path,
    with_members: bool,
    out: Declarations,
}

impl<'a> Extractor<'a> {
    fn visit_statement(&mut self, node: Node<'_>) {
        match node.kind() {
            "import_statement" => self.visit_import(node),
            "export_statement" => self.visit_export(node),
            "class_declaration" | "abstract_class_declaration" => {
                self.extract_class(node, None);
            }
            "lexical_declaration" | "variable_declaration" => {
                self.visit_variables(node);
            }
            "expression_statement" => {
                if let Some(expression) = named_children(node).into_iter().next() {
                    let expression = unwrap_expression(expression);
                    if expression.kind() == "call_expression" {
                        if let Some(call) = convert_call(expression, self.text) {
                            self.out.calls.push(call);
                        }
                    }
                }
            }
            // Recover declarations that landed inside an error region.
            "ERROR" => {
                for child in named_children(node) {
                    self.visit_statement(child);
                }
            }
            _ => {}
        }
    }

    fn visit_import(&mut self, node: Node<'_>) {
        let Some(source) = node
            .child_by_field_name("source")
            .and_then(|source| string_value(source, self.text))
        else {
            return;
        };
        let mut bindings = Vec::new();
        for child in named_children(node) {
            if child.kind() != "import_clause" {
                continue;
            }
            for part in named_children(child) {
                match part.kind() {
                    "identifier" => bindings.push(ImportBinding {
                        local: node_text(part, self.text).to_string(),
                        imported: ImportedName::Default,
                    }),
                    "namespace_import" => {
                        if let Some(local) = named_children(part)
                            .into_iter()
                            .find(|n| n.kind() == "identifier")
                        {
                            bindings.push(ImportBinding {
                                local: node_text(local, self.text).to_string(),
                                imported: ImportedName::Namespace,
                            });
                        }
                    }
                    "named_imports" => {
                        for specifier in named_children(part) {
                            if let Some(binding) = self.import_specifier(specifier) {
                                bindings.push(binding);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        self.out.imports.push(ImportDeclaration {
            source,
            bindings,
            span: span_of(node),
        });
    }

    fn import_specifier(&self, node: Node<'_>) -> Option<ImportBinding> {
        if node.kind() != "import_specifier" {
            return None;
        }
        let name = node.child_by_field_name("name")?;
        let imported = property_key(name, self.text)?;
        let local = match node.child_by_field_name("alias") {
            Some(alias) => node_text(alias, self.text).to_string(),
            None => imported.clone(),
        };
        let imported = if imported == "default" {
            ImportedName::Default
        } else {
            ImportedName::Named(imported)
        };
        Some(ImportBinding { local, imported })
    }

    fn visit_export(&mut self, node: Node<'_>) {
        let span = span_of(node);
        let is_default = has_token(node, "default");
        let source = node
            .child_by_field_name("source")
            .and_then(|source| string_value(source, self.text));

        if let Some(declaration) = node.child_by_field_name("declaration") {
            self.visit_exported_declaration(declaration, is_default, span);
            return;
        }
        if let Some(value) = node.child_by_field_name("value") {
            let target = self.export_value_target(value);
            self.push_export("default".to_string(), target, span);
            return;
        }

        for child in named_children(node) {
            match child.kind() {
                "export_clause" => {
                    for specifier in named_children(child) {
                        self.visit_export_specifier(specifier, source.as_deref(), span);
                    }
                }
                "namespace_export" => {
                    if let (Some(source), Some(name)) = (
                        source.clone(),
                        named_children(child)
                            .into_iter()
                            .next()
                            .and_then(|name| property_key(name, self.text)),
                    ) {
                        self.push_export(
                            name,
                            ExportTarget::ReExport {
                                source,
                                imported: ImportedName::Namespace,
                            },
                            span,
                        );
                    }
                }
                _ => {}
            }
        }
        if has_token(node, "*") && !named_children(node).iter().any(|c| c.kind() == "namespace_export") {
            if let Some(source) = source {
                self.push_export("*".to_string(), ExportTarget::Star { source }, span);
            }
        }
    }

    fn visit_exported_declaration(&mut self, declaration: Node<'_>, is_default: bool, span: Span) {
        match declaration.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                let offset = self.extract_class(declaration, None);
                let exported = if is_default {
                    Some("default".to_string())
                } else {
                    declaration
                        .child_by_field_name("name")
                        .map(|name| node_text(name, self.text).to_string())
                };
                if let Some(exported) = exported {
                    self.push_export(exported, ExportTarget::Class { offset }, span);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                for (name, target) in self.visit_variables(declaration) {
                    self.push_export(name, target, span);
                }
            }
            _ => {
                let name = declaration
                    .child_by_field_name("name")
                    .map(|name| node_text(name, self.text).to_string());
                let exported = if is_default { Some("default".to_string()) } else { name };
                if let Some(exported) = exported {
                    self.push_export(exported, ExportTarget::NotAClass, span);
                }
            }
        }
    }

    fn visit_export_specifier(&mut self, node: Node<'_>, source: Option<&str>, span: Span) {
        if node.kind() != "export_specifier" {
            return;
        }
        let Some(name) = node
            .child_by_field_name("name")
            .and_then(|name| property_key(name, self.text))
        else {
            return;
        };
        let exported = node
            .child_by_field_name("alias")
            .and_then(|alias| property_key(alias, self.text))
            .unwrap_or_else(|| name.clone());
        let target = match source {
            Some(source) => ExportTarget::ReExport {
                source: source.to_string(),
                imported: if name == "default" {
                    ImportedName::Default
                } else {
                    ImportedName::Named(name)
                },
            },
            None => ExportTarget::Binding { local: name },
        };
        self.push_export(exported, target, span);
    }

    fn export_value_target(&mut self, value: Node<'_>) -> ExportTarget {
        let value = unwrap_expression(value);
        if is_class_node(value) {
            let offset = self.extract_class(value, None);
            return ExportTarget::Class { offset };
        }
        match value.kind() {
            "identifier" => ExportTarget::Binding {
                local: node_text(value, self.text).to_string(),
            },
            kind if NOT_A_CLASS_KINDS.contains(&kind) => ExportTarget::NotAClass,
            kind => ExportTarget::Unsupported {
                node_kind: kind.to_string(),
            },
        }
    }

    /// Extract class expressions bound by a variable declaration and return
    /// the export target each declared name would have.
    fn visit_variables(&mut self, node: Node<'_>) -> Vec<(String, ExportTarget)> {
        let mut bound = Vec::new();
        for declarator in named_children(node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name.kind() != "identifier" {
                continue;
            }
            let name = node_text(name, self.text).to_string();
            let target = match declarator.child_by_field_name("value").map(unwrap_expression) {
                Some(value) if is_class_node(value) => ExportTarget::Class {
                    offset: self.extract_class(value, Some(name.clone())),
                },
                Some(value) if value.kind() == "identifier" => ExportTarget::Binding {
                    local: node_text(value, self.text).to_string(),
                },
                Some(value) if NOT_A_CLASS_KINDS.contains(&value.kind()) => ExportTarget::NotAClass,
                Some(value) => ExportTarget::Unsupported {
                    node_kind: value.kind().to_string(),
                },
                None => ExportTarget::NotAClass,
            };
            bound.push((name, target));
        }
        bound
    }

    fn push_export(&mut self, exported: String, target: ExportTarget, span: Span) {
        self.out.exports.push(ExportDeclaration {
            exported,
            target,
            span,
        });
    }

    /// Record a class node and return its offset.  `binding` names class
    /// expressions after the variable they are assigned to.
    fn extract_class(&mut self, node: Node<'_>, binding: Option<String>) -> usize {
        let offset = node.start_byte();
        let name = node
            .child_by_field_name("name")
            .map(|name| node_text(name, self.text).to_string())
            .or(binding);
        let superclass = superclass_expression(node).map(|expr| convert_expression(expr, self.text));
        let key = ClassKey::new(self.path, offset);

        let (members, capabilities, issues) = match node.child_by_field_name("body") {
            Some(body) if self.with_members => classify_class_body(body, self.text),
            _ => (Vec::new(), LocalCapabilities::default(), Vec::new()),
        };

        self.out.classes.push(ClassDeclaration {
            key,
            name,
            superclass,
            span: span_of(node),
            members,
            capabilities,
            issues,
        });
        offset
    }
}

/// The expression after `extends`, for both grammars' heritage shapes.
fn superclass_expression(class: Node<'_>) -> Option<Node<'_>> {
    let heritage = named_children(class)
        .into_iter()
        .find(|child| child.kind() == "class_heritage")?;
    for child in named_children(heritage) {
        match child.kind() {
            "extends_clause" => return child.child_by_field_name("value"),
            "implements_clause" => continue,
            _ => return Some(child),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::parser::parse_source;
    use crate::models::{SourceLanguage, SourceFile};
    use std::path::PathBuf;

    fn parse_js(text: &str) -> SourceFile {
        parse_source(PathBuf::from("/p/a.js"), text.to_string(), SourceLanguage::JavaScript)
            .unwrap()
    }

    fn parse_ts(text: &str) -> SourceFile {
        parse_source(PathBuf::from("/p/a.ts"), text.to_string(), SourceLanguage::TypeScript)
            .unwrap()
    }

    // -- Helper tests -------------------------------------------------------

    #[test]
    fn test_unquote_escapes() {
        assert_eq!(unquote(r#""a\"b""#), "a\"b");
        assert_eq!(unquote("'x'"), "x");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1_000"), Some(1000.0));
        assert_eq!(parse_number("0x10"), Some(16.0));
        assert_eq!(parse_number("1.5"), Some(1.5));
    }

    // -- Imports ------------------------------------------------------------

    #[test]
    fn test_import_bindings() {
        let file = parse_js(
            r#"import Default, { Controller as Base, other } from "@hotwired/stimulus"
import * as ns from "./ns""#,
        );
        assert_eq!(file.imports.len(), 2);
        let first = &file.imports[0];
        assert_eq!(first.source, "@hotwired/stimulus");
        assert_eq!(
            first.bindings,
            vec![
                ImportBinding {
                    local: "Default".into(),
                    imported: ImportedName::Default
                },
                ImportBinding {
                    local: "Base".into(),
                    imported: ImportedName::Named("Controller".into())
                },
                ImportBinding {
                    local: "other".into(),
                    imported: ImportedName::Named("other".into())
                },
            ]
        );
        assert_eq!(file.imports[1].bindings[0].imported, ImportedName::Namespace);
    }

    #[test]
    fn test_side_effect_import_has_no_bindings() {
        let file = parse_js(r#"import "./setup""#);
        assert_eq!(file.imports[0].source, "./setup");
        assert!(file.imports[0].bindings.is_empty());
    }

    // -- Exports ------------------------------------------------------------

    #[test]
    fn test_export_default_class_declaration() {
        let file = parse_js("export default class Hello extends Controller {}");
        assert_eq!(file.classes.len(), 1);
        assert_eq!(file.classes[0].name.as_deref(), Some("Hello"));
        assert_eq!(file.exports[0].exported, "default");
        assert_eq!(
            file.exports[0].target,
            ExportTarget::Class {
                offset: file.classes[0].key.offset
            }
        );
    }

    #[test]
    fn test_export_default_anonymous_class() {
        let file = parse_js("export default class extends Controller {}");
        assert_eq!(file.classes.len(), 1);
        assert_eq!(file.classes[0].name, None);
        assert_eq!(
            file.classes[0].superclass.as_ref().and_then(|s| s.as_identifier()),
            Some("Controller")
        );
    }

    #[test]
    fn test_export_clause_and_reexports() {
        let file = parse_js(
            r#"class A {}
export { A, A as B }
export { default as C, D } from "./other"
export * from "./star"
export * as ns from "./ns""#,
        );
        let exported: Vec<&str> = file.exports.iter().map(|e| e.exported.as_str()).collect();
        assert_eq!(exported, vec!["A", "B", "C", "D", "*", "ns"]);
        assert_eq!(
            file.exports[2].target,
            ExportTarget::ReExport {
                source: "./other".into(),
                imported: ImportedName::Default
            }
        );
        assert_eq!(
            file.exports[4].target,
            ExportTarget::Star {
                source: "./star".into()
            }
        );
    }

    #[test]
    fn test_export_non_class_values() {
        let file = parse_js(
            r#"export function helper() {}
export const mixed = withMixin(Base)
export default 42"#,
        );
        assert_eq!(file.exports[0].target, ExportTarget::NotAClass);
        assert_eq!(
            file.exports[1].target,
            ExportTarget::Unsupported {
                node_kind: "call_expression".into()
            }
        );
        assert_eq!(file.exports[2].target, ExportTarget::NotAClass);
    }

    #[test]
    fn test_class_expression_takes_binding_name() {
        let file = parse_js("export const Thing = class extends Base {}");
        assert_eq!(file.classes[0].name.as_deref(), Some("Thing"));
        assert_eq!(file.exports[0].exported, "Thing");
    }

    // -- Classes and calls ----------------------------------------------------

    #[test]
    fn test_member_superclass() {
        let file = parse_js("class A extends Stimulus.Controller {}");
        let superclass = file.classes[0].superclass.as_ref().unwrap();
        assert_eq!(superclass.display_name(), "Stimulus.Controller");
    }

    #[test]
    fn test_typescript_heritage_and_generics() {
        let file = parse_ts(
            "export default class Typed extends Controller<HTMLElement> implements Thing {}",
        );
        let superclass = file.classes[0].superclass.as_ref().unwrap();
        assert_eq!(superclass.as_identifier(), Some("Controller"));
    }

    #[test]
    fn test_top_level_calls_only() {
        let file = parse_js(
            r#"application.register("hello", HelloController)
function setup() { application.register("nested", Nested) }"#,
        );
        assert_eq!(file.calls.len(), 1);
        let call = &file.calls[0];
        assert_eq!(call.callee.display_name(), "application.register");
        assert_eq!(call.arguments[0].as_str(), Some("hello"));
        assert_eq!(call.arguments[1].as_identifier(), Some("HelloController"));
    }
}
