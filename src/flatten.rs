//! Flattening of nested documents
//!
//! Rewrites inline objects held by reference fields into independent
//! nodes connected by identifier references. Inline objects are processed
//! from an explicit FIFO worklist, so output order is the top-level nodes
//! followed by inline nodes breadth-first in discovery order, and nesting
//! depth never grows the call stack.

use serde_json::{Map, Value as JsonValue};
use std::collections::{HashSet, VecDeque};

use crate::config::ReferenceFields;
use crate::error::HawgError;
use crate::id::BlankNodeAllocator;
use crate::node::{parse_types, FlatNode, Node, Value};
use crate::vocab::{ID, TYPE};

/// Flattens documents against a reference-field table
///
/// Borrows the session's allocator, so blank ids keep counting across
/// repeated calls within one session.
pub struct Flattener<'a> {
    fields: &'a ReferenceFields,
    allocator: &'a mut BlankNodeAllocator,
}

impl<'a> Flattener<'a> {
    pub fn new(fields: &'a ReferenceFields, allocator: &'a mut BlankNodeAllocator) -> Self {
        Self { fields, allocator }
    }

    /// Flatten a document (a list of JSON objects)
    pub fn flatten(&mut self, doc: &[JsonValue]) -> Result<Vec<FlatNode>, HawgError> {
        self.flatten_reserving(doc, |_| false)
    }

    /// Flatten a document, never allocating a blank id for which `reserved`
    /// returns true
    ///
    /// Identifiers supplied anywhere in `doc` are always reserved. A
    /// `{"@id": ...}` object naming a reserved id stays a plain reference.
    pub fn flatten_reserving(
        &mut self,
        doc: &[JsonValue],
        reserved: impl Fn(&str) -> bool,
    ) -> Result<Vec<FlatNode>, HawgError> {
        let supplied = self.supplied_ids(doc);

        let mut pending: VecDeque<Map<String, JsonValue>> = VecDeque::with_capacity(doc.len());
        for (i, entry) in doc.iter().enumerate() {
            match entry {
                JsonValue::Object(obj) => pending.push_back(obj.clone()),
                other => {
                    return Err(HawgError::MalformedInput(format!(
                        "document entry {} is not an object: {}",
                        i, other
                    )))
                }
            }
        }

        let taken = |id: &str| supplied.mentioned.contains(id) || reserved(id);
        let defined = |id: &str| supplied.defined.contains(id) || reserved(id);
        let mut scope = Scope {
            taken: &taken,
            defined: &defined,
            stubs: HashSet::new(),
        };

        let mut flat = Vec::with_capacity(doc.len());
        while let Some(obj) = pending.pop_front() {
            let node = self.flatten_object(obj, &mut pending, &mut scope)?;
            flat.push(node);
        }

        tracing::debug!(
            input = doc.len(),
            output = flat.len(),
            blank = flat.len().saturating_sub(doc.len()),
            "flattened document"
        );
        Ok(flat)
    }

    /// Flatten a single object, queueing its inline children
    fn flatten_object(
        &mut self,
        mut obj: Map<String, JsonValue>,
        pending: &mut VecDeque<Map<String, JsonValue>>,
        scope: &mut Scope<'_>,
    ) -> Result<FlatNode, HawgError> {
        let id = match obj.remove(ID) {
            Some(JsonValue::String(id)) => id,
            None => self.allocator.next_free(scope.taken),
            Some(other) => {
                return Err(HawgError::MalformedInput(format!(
                    "@id must be a string, got {}",
                    other
                )))
            }
        };
        let types = match obj.remove(TYPE) {
            Some(t) => parse_types(&t, &id)?,
            None => Vec::new(),
        };

        let mut node: FlatNode = Node::new(id, types);
        for (field, value) in obj {
            let value = if self.fields.is_reference(&field) {
                Value::Refs(self.flatten_refs(&node.id, &field, value, pending, scope)?)
            } else {
                Value::Data(value)
            };
            node.fields.insert(field, value);
        }
        Ok(node)
    }

    /// Normalize one reference field to a deduplicated list of identifiers
    fn flatten_refs(
        &mut self,
        node_id: &str,
        field: &str,
        value: JsonValue,
        pending: &mut VecDeque<Map<String, JsonValue>>,
        scope: &mut Scope<'_>,
    ) -> Result<Vec<String>, HawgError> {
        let items = match value {
            JsonValue::Array(items) => items,
            single => vec![single],
        };

        let mut targets: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let target = match item {
                JsonValue::String(id) => id,
                JsonValue::Object(mut child) => {
                    let child_id = match child.get(ID) {
                        Some(JsonValue::String(id)) => Some(id.clone()),
                        None => None,
                        Some(other) => {
                            return Err(HawgError::MalformedInput(format!(
                                "inline @id in field '{}' of node '{}' must be a string, got {}",
                                field, node_id, other
                            )))
                        }
                    };
                    match child_id {
                        Some(id) => {
                            // {"@id": ...} alone only refers to a node some other object
                            // defines; otherwise its first occurrence becomes the node
                            let is_stub = child.len() == 1;
                            if !is_stub || scope.adopt_stub(&id) {
                                self.apply_default_type(field, &mut child);
                                pending.push_back(child);
                            }
                            id
                        }
                        None => {
                            let id = self.allocator.next_free(scope.taken);
                            child.insert(ID.to_string(), JsonValue::String(id.clone()));
                            self.apply_default_type(field, &mut child);
                            pending.push_back(child);
                            id
                        }
                    }
                }
                other => {
                    return Err(HawgError::MalformedInput(format!(
                        "field '{}' of node '{}' holds a value that is neither an id nor an object: {}",
                        field, node_id, other
                    )))
                }
            };
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        Ok(targets)
    }

    fn apply_default_type(&self, field: &str, child: &mut Map<String, JsonValue>) {
        if child.contains_key(TYPE) {
            return;
        }
        if let Some(t) = self.fields.default_type(field) {
            child.insert(TYPE.to_string(), JsonValue::String(t.to_string()));
        }
    }

    /// Identifiers written by the author, at any nesting depth
    fn supplied_ids(&self, doc: &[JsonValue]) -> SuppliedIds {
        let mut ids = SuppliedIds::default();
        let mut stack: Vec<(&JsonValue, bool)> = doc.iter().map(|e| (e, true)).collect();
        while let Some((entry, top_level)) = stack.pop() {
            match entry {
                JsonValue::Object(obj) => {
                    if let Some(JsonValue::String(id)) = obj.get(ID) {
                        ids.mentioned.insert(id.clone());
                        if top_level || obj.len() > 1 {
                            ids.defined.insert(id.clone());
                        }
                    }
                    for (field, value) in obj {
                        if !self.fields.is_reference(field) {
                            continue;
                        }
                        match value {
                            JsonValue::Array(items) => stack.extend(items.iter().map(|v| (v, false))),
                            other => stack.push((other, false)),
                        }
                    }
                }
                // only reached for reference-field targets
                JsonValue::String(id) => {
                    ids.mentioned.insert(id.clone());
                }
                _ => {}
            }
        }
        ids
    }
}

#[derive(Debug, Default)]
struct SuppliedIds {
    /// Every id appearing as an `@id` or a string reference
    mentioned: HashSet<String>,
    /// Ids of top-level objects and of inline objects with more than an `@id`
    defined: HashSet<String>,
}

/// Per-call flattening state
struct Scope<'s> {
    /// Blank ids must skip these
    taken: &'s dyn Fn(&str) -> bool,
    /// Ids some object defines
    defined: &'s dyn Fn(&str) -> bool,
    /// Ids already materialized from `{"@id": ...}` stubs
    stubs: HashSet<String>,
}

impl Scope<'_> {
    /// Whether a stub for `id` should become a node
    fn adopt_stub(&mut self, id: &str) -> bool {
        !(self.defined)(id) && self.stubs.insert(id.to_string())
    }
}

/// Flatten `doc` with a fresh allocator
pub fn flatten(doc: &[JsonValue], fields: &ReferenceFields) -> Result<Vec<FlatNode>, HawgError> {
    let mut allocator = BlankNodeAllocator::new();
    Flattener::new(fields, &mut allocator).flatten(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{dereference, index_by_id};
    use crate::node::to_document;
    use serde_json::json;

    fn fields() -> ReferenceFields {
        ReferenceFields::default()
    }

    #[test]
    fn test_flatten_inline_member() {
        let doc = vec![json!({
            "@id": "n1",
            "@type": "Group",
            "member": [{"@type": "Structure", "name": "Muscles"}]
        })];

        let flat = flatten(&doc, &fields()).unwrap();
        assert_eq!(flat.len(), 2);

        assert_eq!(flat[0].id, "n1");
        assert_eq!(flat[0].types, vec!["Group"]);
        assert_eq!(flat[0].refs("member"), ["_:b00001".to_string()]);

        assert_eq!(flat[1].id, "_:b00001");
        assert_eq!(flat[1].types, vec!["Structure"]);
        assert_eq!(flat[1].data("name"), Some(&json!("Muscles")));
    }

    #[test]
    fn test_default_type_applied() {
        let doc = vec![json!({
            "@id": "n1",
            "annotation": {"name": "Muscles"},
            "renderOption": [{"color": "red"}, {"@type": "Custom", "size": 2}]
        })];

        let flat = flatten(&doc, &fields()).unwrap();
        let by_id = |id: &str| flat.iter().find(|n| n.id == id).unwrap();

        let annotation = by_id(&flat[0].refs("annotation")[0]);
        assert_eq!(annotation.types, vec!["Annotation"]);

        let styles = flat[0].refs("renderOption");
        assert_eq!(by_id(&styles[0]).types, vec!["Style"]);
        assert_eq!(by_id(&styles[1]).types, vec!["Custom"]);
    }

    #[test]
    fn test_field_without_default_type_leaves_types_empty() {
        let doc = vec![json!({"@id": "n1", "member": {"name": "x"}})];
        let flat = flatten(&doc, &fields()).unwrap();
        assert!(flat[1].types.is_empty());
    }

    #[test]
    fn test_single_value_normalized_to_list() {
        let doc = vec![
            json!({"@id": "n1", "@type": "Group", "member": "n2"}),
            json!({"@id": "n2"}),
        ];
        let flat = flatten(&doc, &fields()).unwrap();
        assert_eq!(flat[0].refs("member"), ["n2".to_string()]);
        assert_eq!(flat[0].to_json()["@type"], json!(["Group"]));
    }

    #[test]
    fn test_duplicate_refs_collapsed() {
        let doc = vec![
            json!({"@id": "n1", "member": ["n2", "n2", {"@id": "n2"}]}),
            json!({"@id": "n2"}),
        ];
        let flat = flatten(&doc, &fields()).unwrap();
        assert_eq!(flat[0].refs("member"), ["n2".to_string()]);
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_inline_object_with_id_becomes_node() {
        let doc = vec![json!({
            "@id": "n1",
            "annotation": {"@id": "a1", "name": "Muscles"}
        })];
        let flat = flatten(&doc, &fields()).unwrap();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[1].id, "a1");
        assert_eq!(flat[1].types, vec!["Annotation"]);
    }

    #[test]
    fn test_id_only_object_becomes_node_when_undefined() {
        let doc = vec![json!({"@id": "n1", "annotation": {"@id": "a1"}})];
        let flat = flatten(&doc, &fields()).unwrap();

        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].refs("annotation"), ["a1".to_string()]);
        assert_eq!(flat[1].id, "a1");
        assert_eq!(flat[1].types, vec!["Annotation"]);
        assert!(dereference(index_by_id(flat).unwrap()).is_ok());
    }

    #[test]
    fn test_id_only_object_refers_to_defined_node() {
        let doc = vec![
            json!({"@id": "n1", "annotation": [{"@id": "a1"}]}),
            json!({"@id": "n2", "annotation": {"@id": "a1", "name": "Muscles"}}),
        ];
        let flat = flatten(&doc, &fields()).unwrap();

        assert_eq!(flat.len(), 3);
        assert_eq!(flat[2].id, "a1");
        assert_eq!(flat[2].data("name"), Some(&json!("Muscles")));
        assert!(dereference(index_by_id(flat).unwrap()).is_ok());
    }

    #[test]
    fn test_repeated_id_only_object_materialized_once() {
        let doc = vec![
            json!({"@id": "n1", "annotation": {"@id": "a1"}}),
            json!({"@id": "n2", "renderOption": {"@id": "a1"}}),
        ];
        let flat = flatten(&doc, &fields()).unwrap();

        assert_eq!(flat.len(), 3);
        assert_eq!(flat[2].types, vec!["Annotation"]);
        assert!(index_by_id(flat).is_ok());
    }

    #[test]
    fn test_id_only_object_refers_to_reserved_id() {
        let mut alloc = BlankNodeAllocator::new();
        let fields = fields();
        let doc = vec![json!({"@id": "n1", "annotation": {"@id": "a1"}})];
        let flat = Flattener::new(&fields, &mut alloc)
            .flatten_reserving(&doc, |id| id == "a1")
            .unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].refs("annotation"), ["a1".to_string()]);
    }

    #[test]
    fn test_nested_inline_objects_breadth_first() {
        let doc = vec![json!({
            "@id": "n1",
            "member": [
                {"name": "a", "member": [{"name": "a1"}]},
                {"name": "b"}
            ]
        })];
        let flat = flatten(&doc, &fields()).unwrap();
        let names: Vec<_> = flat.iter().map(|n| n.data("name").cloned()).collect();
        assert_eq!(
            names,
            vec![None, Some(json!("a")), Some(json!("b")), Some(json!("a1"))]
        );
        assert_eq!(flat[1].refs("member"), [flat[3].id.clone()]);
    }

    #[test]
    fn test_top_level_without_id_gets_blank_id() {
        let doc = vec![json!({"@type": "Group"})];
        let flat = flatten(&doc, &fields()).unwrap();
        assert_eq!(flat[0].id, "_:b00001");
    }

    #[test]
    fn test_blank_ids_skip_supplied_ids() {
        let doc = vec![
            json!({"@id": "_:b00001", "member": [{"name": "x"}]}),
            json!({"@id": "n2", "member": "_:b00002"}),
            json!({"@id": "_:b00002"}),
        ];
        let flat = flatten(&doc, &fields()).unwrap();
        assert_eq!(flat[0].refs("member"), ["_:b00003".to_string()]);
    }

    #[test]
    fn test_reserved_ids_skipped() {
        let mut alloc = BlankNodeAllocator::new();
        let fields = fields();
        let doc = vec![json!({"member": {"name": "x"}})];
        let flat = Flattener::new(&fields, &mut alloc)
            .flatten_reserving(&doc, |id| id == "_:b00001")
            .unwrap();
        assert_eq!(flat[0].id, "_:b00002");
        assert_eq!(flat[1].id, "_:b00003");
    }

    #[test]
    fn test_non_reference_fields_pass_through() {
        let doc = vec![json!({
            "@id": "n1",
            "position": [{"x": 1}, {"x": 2}],
            "@context": "http://example.org"
        })];
        let flat = flatten(&doc, &fields()).unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].data("position"), Some(&json!([{"x": 1}, {"x": 2}])));
        assert_eq!(flat[0].data("@context"), Some(&json!("http://example.org")));
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let doc = vec![
            json!({
                "@id": "#__header__",
                "root": [{"@type": "Group", "member": [{"@type": "Structure"}]}]
            }),
            json!({"@id": "n1", "annotation": {"name": "x"}}),
        ];
        let fields = fields();
        let once = flatten(&doc, &fields).unwrap();
        let twice = flatten(&to_document(&once), &fields).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_session_allocator_keeps_counting() {
        let fields = fields();
        let mut alloc = BlankNodeAllocator::new();
        let doc = vec![json!({"member": {"name": "x"}})];

        Flattener::new(&fields, &mut alloc).flatten(&doc).unwrap();
        let second = Flattener::new(&fields, &mut alloc).flatten(&doc).unwrap();
        assert_eq!(second[0].id, "_:b00003");
    }

    #[test]
    fn test_malformed_entry() {
        let result = flatten(&[json!("n1")], &fields());
        assert!(matches!(result, Err(HawgError::MalformedInput(_))));
    }

    #[test]
    fn test_malformed_id() {
        let result = flatten(&[json!({"@id": 7})], &fields());
        assert!(matches!(result, Err(HawgError::MalformedInput(_))));

        let result = flatten(&[json!({"@id": "n1", "member": {"@id": 7}})], &fields());
        assert!(matches!(result, Err(HawgError::MalformedInput(_))));
    }

    #[test]
    fn test_malformed_type() {
        let result = flatten(&[json!({"@id": "n1", "@type": {"a": 1}})], &fields());
        assert!(matches!(result, Err(HawgError::MalformedInput(_))));
    }

    #[test]
    fn test_malformed_reference_value() {
        let result = flatten(&[json!({"@id": "n1", "member": [1, 2]})], &fields());
        assert!(matches!(result, Err(HawgError::MalformedInput(_))));

        let result = flatten(&[json!({"@id": "n1", "member": null})], &fields());
        assert!(matches!(result, Err(HawgError::MalformedInput(_))));
    }
}
