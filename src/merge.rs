//! Union merge of flattened documents
//!
//! Folds the nodes of one flattened document into another, combining
//! nodes that share an @id.

use std::collections::btree_map::Entry;
use std::collections::HashMap;

use crate::graph::IdTable;
use crate::node::{FlatNode, Value};

/// Merge two values of the same field
///
/// - Both references: union of targets, existing order first
/// - Otherwise: the incoming value replaces the existing one
pub fn merge_values(current: &mut Value<String>, incoming: Value<String>) {
    match (current, incoming) {
        (Value::Refs(have), Value::Refs(add)) => {
            for r in add {
                if !have.contains(&r) {
                    have.push(r);
                }
            }
        }
        (current, incoming) => *current = incoming,
    }
}

/// Merge `incoming` into `target`, which shares its @id
///
/// - @id: unchanged
/// - @type: union, existing order first. Unlike plain data fields, an
///   incoming type list does not replace the existing one.
/// - Other fields: [`merge_values`]
pub fn merge_nodes(target: &mut FlatNode, incoming: FlatNode) {
    merge_type_lists(&mut target.types, incoming.types);

    for (field, value) in incoming.fields {
        match target.fields.entry(field) {
            Entry::Occupied(mut slot) => merge_values(slot.get_mut(), value),
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }
}

/// Merge two type lists, keeping unique values
fn merge_type_lists(types: &mut Vec<String>, incoming: Vec<String>) {
    for t in incoming {
        if !types.contains(&t) {
            types.push(t);
        }
    }
}

/// Fold an indexed document into an existing flattened document
///
/// Nodes with new ids are appended in order, so every existing node keeps
/// its position.
pub fn merge_by_id(existing: Vec<FlatNode>, incoming: IdTable) -> Vec<FlatNode> {
    let mut position: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();
    let mut merged = existing;
    let mut combined = 0usize;

    for node in incoming.into_nodes() {
        match position.get(&node.id) {
            Some(&i) => {
                merge_nodes(&mut merged[i], node);
                combined += 1;
            }
            None => {
                position.insert(node.id.clone(), merged.len());
                merged.push(node);
            }
        }
    }

    tracing::debug!(total = merged.len(), combined, "merged documents");
    merged
}
