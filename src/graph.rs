//! Id-indexed node arena and dereferencing
//!
//! [`index_by_id`] turns a flattened document into an [`IdTable`];
//! [`dereference`] resolves every identifier reference to a [`NodeKey`],
//! producing the canonical [`Graph`]. The graph exclusively owns its nodes;
//! every other index holds keys into it.

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

use crate::error::HawgError;
use crate::node::{FlatNode, GraphNode, Node, NodeKey, Value};

/// Flattened nodes indexed by identifier
#[derive(Debug, Clone, Default)]
pub struct IdTable {
    nodes: Vec<FlatNode>,
    by_id: HashMap<String, NodeKey>,
}

impl IdTable {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_nodes(self) -> Vec<FlatNode> {
        self.nodes
    }
}

/// Index flattened nodes by identifier
///
/// Fails with `DuplicateId` rather than letting a later node shadow an
/// earlier one.
pub fn index_by_id(nodes: Vec<FlatNode>) -> Result<IdTable, HawgError> {
    let mut by_id = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if by_id.insert(node.id.clone(), NodeKey(i)).is_some() {
            return Err(HawgError::DuplicateId(node.id.clone()));
        }
    }
    Ok(IdTable { nodes, by_id })
}

/// Replace identifier references with arena keys
///
/// Fails with `UnresolvedReference` on the first identifier that names no
/// node. Each reference is resolved one level deep, so cyclic graphs are
/// fine.
pub fn dereference(table: IdTable) -> Result<Graph, HawgError> {
    let IdTable { nodes, by_id } = table;
    let mut resolved = Vec::with_capacity(nodes.len());

    for node in nodes {
        let mut fields = BTreeMap::new();
        for (field, value) in node.fields {
            let value = match value {
                Value::Data(v) => Value::Data(v),
                Value::Refs(targets) => {
                    let keys = targets
                        .into_iter()
                        .map(|target| {
                            by_id.get(&target).copied().ok_or_else(|| {
                                HawgError::UnresolvedReference {
                                    node: node.id.clone(),
                                    field: field.clone(),
                                    target,
                                }
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Value::Refs(keys)
                }
            };
            fields.insert(field, value);
        }
        resolved.push(Node {
            id: node.id,
            types: node.types,
            fields,
        });
    }

    tracing::debug!(nodes = resolved.len(), "dereferenced graph");
    Ok(Graph {
        nodes: resolved,
        by_id,
    })
}

/// The canonical in-memory graph: a node arena plus the id index
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    by_id: HashMap<String, NodeKey>,
}

impl Graph {
    pub fn key_of(&self, id: &str) -> Option<NodeKey> {
        self.by_id.get(id).copied()
    }

    pub fn node(&self, key: NodeKey) -> Option<&GraphNode> {
        self.nodes.get(key.0)
    }

    pub fn node_ref(&self, key: NodeKey) -> Option<NodeRef<'_>> {
        self.node(key).map(|_| NodeRef { graph: self, key })
    }

    pub fn get(&self, id: &str) -> Option<NodeRef<'_>> {
        self.key_of(id).map(|key| NodeRef { graph: self, key })
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'_>> {
        (0..self.nodes.len()).map(move |i| NodeRef {
            graph: self,
            key: NodeKey(i),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node with no fields; fails if the id is already present
    pub(crate) fn insert(&mut self, id: String, types: Vec<String>) -> Result<NodeKey, HawgError> {
        if self.by_id.contains_key(&id) {
            return Err(HawgError::DuplicateId(id));
        }
        let key = NodeKey(self.nodes.len());
        self.by_id.insert(id.clone(), key);
        self.nodes.push(Node::new(id, types));
        Ok(key)
    }

    /// Render a value to JSON with references as identifier strings
    pub fn value_to_json(&self, value: &Value<NodeKey>) -> JsonValue {
        match value {
            Value::Data(v) => v.clone(),
            Value::Refs(keys) => JsonValue::Array(
                keys.iter()
                    .map(|k| JsonValue::String(self.nodes[k.0].id.clone()))
                    .collect(),
            ),
        }
    }

    /// Convert back to flattened nodes, references as identifiers
    pub fn to_flat(&self) -> Vec<FlatNode> {
        self.nodes
            .iter()
            .map(|node| Node {
                id: node.id.clone(),
                types: node.types.clone(),
                fields: node
                    .fields
                    .iter()
                    .map(|(field, value)| {
                        let value = match value {
                            Value::Data(v) => Value::Data(v.clone()),
                            Value::Refs(keys) => {
                                Value::Refs(keys.iter().map(|k| self.nodes[k.0].id.clone()).collect())
                            }
                        };
                        (field.clone(), value)
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Borrowed handle to a node in a [`Graph`]
///
/// Following a reference yields another `NodeRef`; nothing is copied.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'g> {
    graph: &'g Graph,
    key: NodeKey,
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.graph, other.graph) && self.key == other.key
    }
}

impl Eq for NodeRef<'_> {}

impl<'g> NodeRef<'g> {
    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn node(&self) -> &'g GraphNode {
        &self.graph.nodes[self.key.0]
    }

    pub fn id(&self) -> &'g str {
        &self.node().id
    }

    pub fn types(&self) -> &'g [String] {
        &self.node().types
    }

    pub fn has_type<S: AsRef<str>>(&self, types: &[S]) -> bool {
        self.node().has_type(types)
    }

    pub fn get(&self, field: &str) -> Option<&'g Value<NodeKey>> {
        self.node().get(field)
    }

    pub fn data(&self, field: &str) -> Option<&'g JsonValue> {
        self.node().data(field)
    }

    /// Nodes referenced through `field`
    pub fn refs(&self, field: &str) -> impl Iterator<Item = NodeRef<'g>> + 'g {
        let graph = self.graph;
        self.node()
            .refs(field)
            .iter()
            .map(move |&key| NodeRef { graph, key })
    }

    /// Render to JSON with references as identifier strings
    pub fn to_json(&self) -> JsonValue {
        let graph = self.graph;
        self.node()
            .to_json_with(|k| JsonValue::String(graph.nodes[k.0].id.clone()))
    }
}
