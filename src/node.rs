//! Node and value types
//!
//! A node is a fixed record (`id`, `types`) plus a map of predicates. Each
//! predicate value is explicitly tagged: opaque data passes through
//! untouched, while reference-field values are lists of targets. The
//! target representation `R` is an identifier string after flattening and
//! a [`NodeKey`] into the owning arena after dereferencing.

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::HawgError;
use crate::vocab::{ID, TYPE};

/// Stable handle to a node inside a [`crate::graph::Graph`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub(crate) usize);

impl NodeKey {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A predicate value
#[derive(Debug, Clone, PartialEq)]
pub enum Value<R> {
    /// Plain data from a non-reference field, kept verbatim
    Data(JsonValue),
    /// Targets of a reference field; a set, so never contains duplicates
    Refs(Vec<R>),
}

impl<R> Value<R> {
    pub fn as_data(&self) -> Option<&JsonValue> {
        match self {
            Value::Data(v) => Some(v),
            Value::Refs(_) => None,
        }
    }

    pub fn as_refs(&self) -> Option<&[R]> {
        match self {
            Value::Data(_) => None,
            Value::Refs(r) => Some(r),
        }
    }
}

/// A node with `R`-typed references
#[derive(Debug, Clone, PartialEq)]
pub struct Node<R> {
    pub id: String,
    pub types: Vec<String>,
    pub fields: BTreeMap<String, Value<R>>,
}

/// Node as produced by flattening: references are identifier strings
pub type FlatNode = Node<String>;

/// Node as stored in the graph: references are arena keys
pub type GraphNode = Node<NodeKey>;

impl<R> Node<R> {
    pub fn new(id: impl Into<String>, types: Vec<String>) -> Self {
        Self {
            id: id.into(),
            types,
            fields: BTreeMap::new(),
        }
    }

    /// True if the node declares any of `types`
    pub fn has_type<S: AsRef<str>>(&self, types: &[S]) -> bool {
        self.types
            .iter()
            .any(|t| types.iter().any(|wanted| wanted.as_ref() == t))
    }

    pub fn get(&self, field: &str) -> Option<&Value<R>> {
        self.fields.get(field)
    }

    pub fn data(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field).and_then(Value::as_data)
    }

    /// Reference targets of `field`; empty when absent or plain data
    pub fn refs(&self, field: &str) -> &[R] {
        self.fields
            .get(field)
            .and_then(Value::as_refs)
            .unwrap_or(&[])
    }

    /// Render to JSON, turning each reference into JSON with `render`
    pub fn to_json_with(&self, render: impl Fn(&R) -> JsonValue) -> JsonValue {
        let mut obj = Map::new();
        obj.insert(ID.to_string(), JsonValue::String(self.id.clone()));
        if !self.types.is_empty() {
            obj.insert(
                TYPE.to_string(),
                JsonValue::Array(self.types.iter().cloned().map(JsonValue::String).collect()),
            );
        }
        for (field, value) in &self.fields {
            let json = match value {
                Value::Data(v) => v.clone(),
                Value::Refs(targets) => JsonValue::Array(targets.iter().map(&render).collect()),
            };
            obj.insert(field.clone(), json);
        }
        JsonValue::Object(obj)
    }
}

impl FlatNode {
    /// Render in the flattened JSON form: `@type` and reference fields as arrays
    pub fn to_json(&self) -> JsonValue {
        self.to_json_with(|id| JsonValue::String(id.clone()))
    }
}

/// Render a flattened document back to JSON
pub fn to_document(nodes: &[FlatNode]) -> Vec<JsonValue> {
    nodes.iter().map(FlatNode::to_json).collect()
}

/// Normalize a raw @type value to a list of type names
///
/// Accepts a single string or an array of strings; anything else is
/// malformed. `node` names the owning node in the error message.
pub fn parse_types(value: &JsonValue, node: &str) -> Result<Vec<String>, HawgError> {
    match value {
        JsonValue::String(t) => Ok(vec![t.clone()]),
        JsonValue::Array(arr) => arr
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    HawgError::MalformedInput(format!(
                        "@type of node '{}' contains a non-string entry: {}",
                        node, v
                    ))
                })
            })
            .collect(),
        other => Err(HawgError::MalformedInput(format!(
            "@type of node '{}' must be a string or array of strings, got {}",
            node, other
        ))),
    }
}
