//! Promotion of file-scope definitions to internal linkage.
//!
//! Every function definition (except `main`) and global variable declared
//! without a storage class gets `static ` in front of it, so the compiler
//! sees every caller and can drop code that is dead within the unit.
//! Prototypes are promoted together with their definition; a prototype for
//! a function defined elsewhere, such as a probe, keeps external linkage.

use super::{node_text, EngineError, PassOutput};
use crate::ledger::EditSet;
use crate::ts::ParsedSource;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;
use tree_sitter::Node;

const STATIC: &str = "static ";

pub fn make_static(file: &Path, parsed: &ParsedSource<'_>) -> Result<PassOutput, EngineError> {
    let source = parsed.source;
    let root = parsed.root_node();
    let mut cursor = root.walk();
    let items: Vec<Node<'_>> = root
        .named_children(&mut cursor)
        .filter(|item| !item.is_extra() && !item.has_error())
        .collect();

    let mut promoted = HashSet::new();
    for item in &items {
        if let Some(name) = promotable_function(*item, source)? {
            promoted.insert(name);
        }
    }

    let mut edits = EditSet::new(file);
    for item in &items {
        let promote = match item.kind() {
            "function_definition" => promotable_function(*item, source)?.is_some(),
            "declaration" => promotable_declaration(*item, source, &promoted)?,
            _ => false,
        };
        if promote {
            edits.insert(item.start_byte(), STATIC)?;
        }
    }

    debug!(
        file = %file.display(),
        functions = promoted.len(),
        edits = edits.len(),
        "promoted globals"
    );
    Ok(PassOutput::new(edits))
}

/// Name of a function definition that should become static.
fn promotable_function<'s>(item: Node<'_>, source: &'s str) -> Result<Option<&'s str>, EngineError> {
    if item.kind() != "function_definition" || has_storage_class(item) {
        return Ok(None);
    }
    let Some(declarator) = item.child_by_field_name("declarator") else {
        return Ok(None);
    };
    match function_name(declarator, source)? {
        Some("main") | None => Ok(None),
        Some(name) => Ok(Some(name)),
    }
}

fn promotable_declaration(
    item: Node<'_>,
    source: &str,
    promoted: &HashSet<&str>,
) -> Result<bool, EngineError> {
    if has_storage_class(item) {
        return Ok(false);
    }
    let mut cursor = item.walk();
    let declarators: Vec<_> = item
        .children_by_field_name("declarator", &mut cursor)
        .collect();
    if declarators.is_empty() {
        return Ok(false);
    }

    let mut prototypes = Vec::with_capacity(declarators.len());
    for declarator in declarators {
        match function_name(declarator, source)? {
            Some(name) => prototypes.push(name),
            // Any variable makes this a definition of file-scope storage
            None => return Ok(true),
        }
    }
    Ok(prototypes.iter().all(|name| promoted.contains(name)))
}

fn has_storage_class(item: Node<'_>) -> bool {
    let mut cursor = item.walk();
    let found = item
        .children(&mut cursor)
        .any(|child| child.kind() == "storage_class_specifier");
    found
}

/// Identifier declared by a function declarator, looking through pointer
/// and reference declarators. `None` for anything that is not a plainly
/// named function (variables, function pointers, qualified names).
fn function_name<'s>(declarator: Node<'_>, source: &'s str) -> Result<Option<&'s str>, EngineError> {
    let mut current = declarator;
    loop {
        match current.kind() {
            "function_declarator" => {
                return match current.child_by_field_name("declarator") {
                    Some(name) if name.kind() == "identifier" => node_text(name, source).map(Some),
                    _ => Ok(None),
                };
            }
            "pointer_declarator" | "reference_declarator" | "attributed_declarator" => {
                let inner = current
                    .child_by_field_name("declarator")
                    .or_else(|| current.named_child(0));
                match inner {
                    Some(inner) => current = inner,
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        }
    }
}
