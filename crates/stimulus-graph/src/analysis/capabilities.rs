//! Capability merging along an ancestor chain.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::indexer::graph::DeclarationGraph;
use crate::models::{
    AncestorChain, CapabilityKind, CapabilitySet, ChainTermination, ClassDeclaration, ClassKey,
    ControllerDefinition, DefinitionIssue, InheritedEntry, InheritedValue, ValueSet,
};

/// Whether the chain forbids merging: a cycle, or a parse error in any
/// file consulted while building it.
pub fn is_errored(chain: &AncestorChain) -> bool {
    chain.is_cyclic() || !chain.errored_files.is_empty()
}

fn chain_declarations<'a>(
    graph: &'a DeclarationGraph,
    chain: &AncestorChain,
) -> Vec<&'a ClassDeclaration> {
    std::iter::once(&chain.class)
        .chain(chain.ancestors.iter())
        .filter_map(|key| graph.class(key))
        .collect()
}

/// Nearest-first concatenation with first-occurrence de-duplication.
fn merge_list(
    declarations: &[&ClassDeclaration],
    own: &ClassKey,
    kind: CapabilityKind,
) -> Vec<InheritedEntry> {
    let mut seen = HashSet::new();
    let mut effective = Vec::new();
    for declaration in declarations {
        for entry in declaration.capabilities.list(kind) {
            if seen.insert(entry.name.as_str()) {
                effective.push(InheritedEntry {
                    name: entry.name.clone(),
                    declared_in: declaration.key.clone(),
                    span: entry.span,
                    local: &declaration.key == own,
                });
            }
        }
    }
    effective
}

/// Nearest declaration of a name wins and is kept verbatim.
fn merge_values(declarations: &[&ClassDeclaration], own: &ClassKey) -> IndexMap<String, InheritedValue> {
    let mut effective = IndexMap::new();
    for declaration in declarations {
        for (name, definition) in &declaration.capabilities.values {
            effective
                .entry(name.clone())
                .or_insert_with(|| InheritedValue {
                    definition: definition.clone(),
                    declared_in: declaration.key.clone(),
                    local: &declaration.key == own,
                });
        }
    }
    effective
}

/// Publish the definition of the class at the head of `chain`.
///
/// Errored chains keep their local lists but get empty effective lists.
pub fn merge_definition(
    graph: &DeclarationGraph,
    chain: &AncestorChain,
    identifier: String,
) -> Option<ControllerDefinition> {
    let file = graph.file(&chain.class.path)?;
    let own = file.class_at(chain.class.offset)?;
    let errored = is_errored(chain);
    let declarations = if errored {
        Vec::new()
    } else {
        chain_declarations(graph, chain)
    };

    let mut issues: Vec<DefinitionIssue> = chain
        .errored_files
        .iter()
        .map(|path| DefinitionIssue::ParseError { path: path.clone() })
        .collect();
    if let ChainTermination::Cycle { repeated } = &chain.termination {
        issues.push(DefinitionIssue::Cycle {
            repeated: repeated.clone(),
        });
    }

    let set = |kind: CapabilityKind| CapabilitySet {
        local: own.capabilities.list(kind).to_vec(),
        effective: merge_list(&declarations, &own.key, kind),
    };

    Some(ControllerDefinition {
        identifier,
        path: file.path.clone(),
        class: own.key.clone(),
        class_name: own.name.clone(),
        origin: file.origin.clone(),
        ancestors: chain.ancestors.clone(),
        termination: chain.termination.clone(),
        may_inherit_unknown_capabilities: chain.is_open_ended(),
        has_errors: errored,
        issues,
        targets: set(CapabilityKind::Targets),
        classes: set(CapabilityKind::Classes),
        outlets: set(CapabilityKind::Outlets),
        actions: set(CapabilityKind::Actions),
        values: ValueSet {
            local: own.capabilities.values.clone(),
            effective: merge_values(&declarations, &own.key),
        },
    })
}
