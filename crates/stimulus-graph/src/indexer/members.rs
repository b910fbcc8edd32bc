//! Class body classification: members, actions, and capability lists.

use tree_sitter::Node;

use crate::indexer::symbols::{convert_expression, named_children, node_text, span_of, string_value};
use crate::models::{
    CapabilityKind, ClassMember, DeclarationIssue, Expression, ExpressionKind, IssueKind,
    LocalCapabilities, MemberKind, NamedEntry, ObjectEntry, Span, ValueDefinition, ValueKind,
};

/// Classify every member of a `class_body` node.
pub fn classify_class_body(
    body: Node<'_>,
    text: &str,
) -> (Vec<ClassMember>, LocalCapabilities, Vec<DeclarationIssue>) {
    let mut members = Vec::new();
    let mut capabilities = LocalCapabilities::default();
    let mut issues = Vec::new();

    for node in named_children(body) {
        let Some(member) = read_member(node, text) else {
            continue;
        };

        if member.kind == MemberKind::Method && !member.is_static && !member.is_private {
            capabilities.actions.push(NamedEntry {
                name: member.name.clone(),
                span: member.span,
            });
        }

        if member.is_static && !member.is_private {
            if let Some(kind) = CapabilityKind::from_property_name(&member.name) {
                let declared = match member.kind {
                    MemberKind::Field => capability_field_value(node, text),
                    MemberKind::Getter => capability_getter_value(node, text),
                    _ => None,
                };
                if let Some(value) = declared {
                    apply_capability(kind, &value, &mut capabilities, &mut issues);
                }
            }
        }

        members.push(member);
    }

    (members, capabilities, issues)
}

fn read_member(node: Node<'_>, text: &str) -> Option<ClassMember> {
    let (name_node, is_field) = match node.kind() {
        "method_definition" => (node.child_by_field_name("name")?, false),
        "field_definition" => (node.child_by_field_name("property")?, true),
        "public_field_definition" => (node.child_by_field_name("name")?, true),
        _ => return None,
    };

    // Computed names cannot be classified statically.
    let (name, is_private) = match name_node.kind() {
        "property_identifier" => (node_text(name_node, text).to_string(), false),
        "private_property_identifier" => (node_text(name_node, text).to_string(), true),
        "string" => (string_value(name_node, text)?, false),
        "number" => (node_text(name_node, text).to_string(), false),
        _ => return None,
    };

    // Modifier tokens always precede the name.
    let mut is_static = false;
    let mut accessor = None;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.id() == name_node.id() {
            break;
        }
        match child.kind() {
            "static" => is_static = true,
            "get" => accessor = Some(MemberKind::Getter),
            "set" => accessor = Some(MemberKind::Setter),
            _ => {}
        }
    }

    let kind = if is_field {
        MemberKind::Field
    } else if let Some(accessor) = accessor {
        accessor
    } else if name == "constructor" && !is_static {
        MemberKind::Constructor
    } else {
        MemberKind::Method
    };

    Some(ClassMember {
        name,
        kind,
        is_static,
        is_private,
        span: span_of(node),
    })
}

fn capability_field_value(node: Node<'_>, text: &str) -> Option<Expression> {
    node.child_by_field_name("value")
        .map(|value| convert_expression(value, text))
}

/// `static get targets() { return [...] }`
fn capability_getter_value(node: Node<'_>, text: &str) -> Option<Expression> {
    let body = node.child_by_field_name("body")?;
    let statement = named_children(body)
        .into_iter()
        .find(|child| child.kind() == "return_statement")?;
    let value = named_children(statement).into_iter().next()?;
    Some(convert_expression(value, text))
}

fn issue(capability: CapabilityKind, entry: Option<&str>, problem: IssueKind, span: Span) -> DeclarationIssue {
    DeclarationIssue {
        capability,
        entry: entry.map(str::to_string),
        problem,
        span,
    }
}

fn apply_capability(
    kind: CapabilityKind,
    value: &Expression,
    capabilities: &mut LocalCapabilities,
    issues: &mut Vec<DeclarationIssue>,
) {
    if kind == CapabilityKind::Values {
        // A later declaration replaces an earlier one, as at runtime.
        capabilities.values = read_values(value, issues);
        return;
    }
    let Some(list) = capabilities.list_mut(kind) else {
        return;
    };
    list.clear();
    let ExpressionKind::Array(elements) = &value.kind else {
        issues.push(issue(kind, None, IssueKind::NotAList, value.span));
        return;
    };
    for (index, element) in elements.iter().enumerate() {
        match &element.kind {
            ExpressionKind::String(name) => list.push(NamedEntry {
                name: name.clone(),
                span: element.span,
            }),
            _ => issues.push(issue(
                kind,
                None,
                IssueKind::NonStringEntry { index },
                element.span,
            )),
        }
    }
}

fn read_values(
    value: &Expression,
    issues: &mut Vec<DeclarationIssue>,
) -> indexmap::IndexMap<String, ValueDefinition> {
    let mut values = indexmap::IndexMap::new();
    let ExpressionKind::Object(entries) = &value.kind else {
        issues.push(issue(CapabilityKind::Values, None, IssueKind::NotAnObject, value.span));
        return values;
    };

    for entry in entries {
        match entry {
            ObjectEntry::Property { key, value, span } => {
                let definition = read_value_entry(key, value, *span);
                if let Some(problem) = &definition.issue {
                    issues.push(problem.clone());
                }
                values.insert(key.clone(), definition);
            }
            ObjectEntry::Shorthand { name, span } => {
                let problem = issue(
                    CapabilityKind::Values,
                    Some(name),
                    IssueKind::UnsupportedValueForm,
                    *span,
                );
                issues.push(problem.clone());
                values.insert(name.clone(), malformed(name, *span, problem));
            }
            ObjectEntry::Spread { span } => {
                issues.push(issue(CapabilityKind::Values, None, IssueKind::Spread, *span));
            }
            ObjectEntry::Computed { span } => {
                issues.push(issue(CapabilityKind::Values, None, IssueKind::ComputedKey, *span));
            }
        }
    }
    values
}

fn malformed(name: &str, span: Span, problem: DeclarationIssue) -> ValueDefinition {
    ValueDefinition {
        name: name.to_string(),
        kind: None,
        default: serde_json::Value::Null,
        explicit_default: false,
        span,
        issue: Some(problem),
    }
}

fn read_value_entry(name: &str, value: &Expression, span: Span) -> ValueDefinition {
    let report = |problem: IssueKind, at: Span| issue(CapabilityKind::Values, Some(name), problem, at);

    match &value.kind {
        // Shorthand: `open: Boolean`
        ExpressionKind::Identifier(constructor) => match ValueKind::from_constructor(constructor) {
            Some(kind) => ValueDefinition {
                name: name.to_string(),
                kind: Some(kind),
                default: kind.default_value(),
                explicit_default: false,
                span,
                issue: None,
            },
            None => malformed(
                name,
                span,
                report(
                    IssueKind::UnknownValueKind {
                        name: constructor.clone(),
                    },
                    value.span,
                ),
            ),
        },
        // Long form: `open: { type: Boolean, default: true }`
        ExpressionKind::Object(entries) => {
            let lookup = |wanted: &str| {
                entries.iter().find_map(|entry| match entry {
                    ObjectEntry::Property { key, value, .. } if key == wanted => Some(value),
                    _ => None,
                })
            };
            let Some(type_expr) = lookup("type") else {
                return malformed(name, span, report(IssueKind::MissingValueType, value.span));
            };
            let kind = match &type_expr.kind {
                ExpressionKind::Identifier(constructor) => {
                    match ValueKind::from_constructor(constructor) {
                        Some(kind) => kind,
                        None => {
                            return malformed(
                                name,
                                span,
                                report(
                                    IssueKind::UnknownValueKind {
                                        name: constructor.clone(),
                                    },
                                    type_expr.span,
                                ),
                            )
                        }
                    }
                }
                _ => {
                    return malformed(
                        name,
                        span,
                        report(IssueKind::UnsupportedValueForm, type_expr.span),
                    )
                }
            };

            let shorthand_default = entries
                .iter()
                .find(|entry| matches!(entry, ObjectEntry::Shorthand { name, .. } if name == "default"));

            let mut definition = ValueDefinition {
                name: name.to_string(),
                kind: Some(kind),
                default: kind.default_value(),
                explicit_default: false,
                span,
                issue: None,
            };
            if let Some(default_expr) = lookup("default") {
                match literal_json(default_expr) {
                    Some(json) if kind.accepts(&json) => {
                        definition.default = json;
                        definition.explicit_default = true;
                    }
                    Some(_) => {
                        definition.issue = Some(report(
                            IssueKind::DefaultTypeMismatch { expected: kind },
                            default_expr.span,
                        ));
                    }
                    None => {
                        definition.issue =
                            Some(report(IssueKind::NonLiteralDefault, default_expr.span));
                    }
                }
            } else if let Some(entry) = shorthand_default {
                definition.issue = Some(report(IssueKind::NonLiteralDefault, entry.span()));
            }
            definition
        }
        _ => malformed(name, span, report(IssueKind::UnsupportedValueForm, value.span)),
    }
}

/// JSON rendering of a literal expression; `None` for anything dynamic.
pub fn literal_json(expression: &Expression) -> Option<serde_json::Value> {
    match &expression.kind {
        ExpressionKind::String(value) => Some(serde_json::Value::String(value.clone())),
        ExpressionKind::Number(value) => {
            if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                Some(serde_json::Value::from(*value as i64))
            } else {
                serde_json::Number::from_f64(*value).map(serde_json::Value::Number)
            }
        }
        ExpressionKind::Boolean(value) => Some(serde_json::Value::Bool(*value)),
        ExpressionKind::Null => Some(serde_json::Value::Null),
        ExpressionKind::Array(elements) => elements
            .iter()
            .map(literal_json)
            .collect::<Option<Vec<_>>>()
            .map(serde_json::Value::Array),
        ExpressionKind::Object(entries) => {
            let mut map = serde_json::Map::new();
            for entry in entries {
                match entry {
                    ObjectEntry::Property { key, value, .. } => {
                        map.insert(key.clone(), literal_json(value)?);
                    }
                    _ => return None,
                }
            }
            Some(serde_json::Value::Object(map))
        }
        _ => None,
    }
}
