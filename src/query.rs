//! Structural queries over a [`Hawg`] store
//!
//! Modifier composition, annotation lookups and walks along a structural
//! reference field (parents, ancestors, subtrees).

use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;

use crate::error::HawgError;
use crate::graph::NodeRef;
use crate::node::{NodeKey, Value};
use crate::store::{Hawg, NodeSelector};
use crate::vocab::{
    is_reserved, ANNOTATION_FIELD, ANNOTATION_TYPE, GROUP_TYPE, NAME_FIELD, STRUCTURE_TYPE,
};

/// Parameters of [`Hawg::get_nodes_with_annotation`]
///
/// Defaults: every node of type `Annotation`, linked through the
/// `annotation` field, subjects of any type.
pub struct AnnotationQuery<'a> {
    filter: Option<Box<dyn Fn(&NodeRef<'_>) -> bool + 'a>>,
    node_types: Option<Vec<String>>,
    annotation_type: String,
    field_name: String,
}

impl Default for AnnotationQuery<'_> {
    fn default() -> Self {
        Self {
            filter: None,
            node_types: None,
            annotation_type: ANNOTATION_TYPE.to_string(),
            field_name: ANNOTATION_FIELD.to_string(),
        }
    }
}

impl<'a> AnnotationQuery<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only annotation nodes for which `filter` returns true
    pub fn filter(mut self, filter: impl Fn(&NodeRef<'_>) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Keep only subjects declaring at least one of `types`
    ///
    /// An empty slice places no restriction.
    pub fn node_types<S: AsRef<str>>(mut self, types: &[S]) -> Self {
        self.node_types = if types.is_empty() {
            None
        } else {
            Some(types.iter().map(|t| t.as_ref().to_string()).collect())
        };
        self
    }

    pub fn annotation_type(mut self, annotation_type: impl Into<String>) -> Self {
        self.annotation_type = annotation_type.into();
        self
    }

    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }
}

impl Hawg {
    /// Merge the fields of the modifier nodes listed under `field_name`
    ///
    /// Modifiers are applied in list order, so a later modifier overrides
    /// fields set by an earlier one. Reserved `@` fields are never copied.
    /// `modifier_types` skips modifiers declaring none of the given types;
    /// `allowed_subfields` restricts which fields are copied. A missing
    /// field yields an empty map; a missing node is `NotFound`.
    pub fn compose_field_values<'a>(
        &self,
        node: impl Into<NodeSelector<'a>>,
        field_name: &str,
        modifier_types: Option<&[&str]>,
        allowed_subfields: Option<&[&str]>,
    ) -> Result<Map<String, JsonValue>, HawgError> {
        let subject = self.select(node)?;
        Ok(self.compose_node(subject, field_name, modifier_types, allowed_subfields))
    }

    fn compose_node(
        &self,
        subject: NodeRef<'_>,
        field_name: &str,
        modifier_types: Option<&[&str]>,
        allowed_subfields: Option<&[&str]>,
    ) -> Map<String, JsonValue> {
        let mut composed = Map::new();

        match subject.get(field_name) {
            None => return composed,
            Some(Value::Data(_)) => {
                tracing::warn!(
                    node = subject.id(),
                    field = field_name,
                    "field holds plain data, not modifier references"
                );
                return composed;
            }
            Some(Value::Refs(_)) => {}
        }

        for modifier in subject.refs(field_name) {
            if let Some(types) = modifier_types {
                if !modifier.has_type(types) {
                    continue;
                }
            }
            for (field, value) in &modifier.node().fields {
                if is_reserved(field) {
                    continue;
                }
                if let Some(allowed) = allowed_subfields {
                    if !allowed.contains(&field.as_str()) {
                        continue;
                    }
                }
                composed.insert(field.clone(), self.graph().value_to_json(value));
            }
        }
        composed
    }

    /// Subjects referencing a matching annotation node
    ///
    /// Selects nodes of the query's annotation type, keeps those passing its
    /// filter, then collects every node that references one of them through
    /// the query's field, optionally restricted by subject type. Each subject
    /// appears once, in order of first discovery. An annotation type that no
    /// node declares yields an empty list.
    pub fn get_nodes_with_annotation(&self, query: &AnnotationQuery<'_>) -> Vec<NodeRef<'_>> {
        let mut seen = HashSet::new();
        let mut subjects = Vec::new();

        for annotation in self.nodes_of_type(&query.annotation_type) {
            if let Some(filter) = &query.filter {
                if !filter(&annotation) {
                    continue;
                }
            }
            let referrers = self
                .reverse_table()
                .referrers(annotation.key(), &query.field_name);
            for subject in self.keys_to_refs(referrers) {
                if let Some(types) = &query.node_types {
                    if !subject.has_type(types) {
                        continue;
                    }
                }
                if seen.insert(subject.key()) {
                    subjects.push(subject);
                }
            }
        }
        subjects
    }

    /// Structures and groups whose composed annotation name matches `query`
    ///
    /// `query` is split on whitespace and every term must match (AND). A
    /// term matches a word of the name it is a case-insensitive prefix of.
    /// Results follow graph order; a blank query matches nothing.
    pub fn search_nodes(&self, query: &str) -> Vec<NodeRef<'_>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let found: Vec<NodeRef<'_>> = self
            .nodes()
            .filter(|node| node.has_type(&[STRUCTURE_TYPE, GROUP_TYPE]))
            .filter(|node| {
                let annotation = self.compose_node(*node, ANNOTATION_FIELD, None, None);
                let Some(name) = annotation.get(NAME_FIELD).and_then(JsonValue::as_str) else {
                    return false;
                };
                let words: Vec<String> = name.split_whitespace().map(str::to_lowercase).collect();
                terms
                    .iter()
                    .all(|term| words.iter().any(|word| word.starts_with(term.as_str())))
            })
            .collect();
        tracing::debug!(query, hits = found.len(), "searched annotation names");
        found
    }

    /// Nodes referencing `node` through `field_name`
    pub fn parents<'a>(
        &self,
        node: impl Into<NodeSelector<'a>>,
        field_name: &str,
    ) -> Result<Vec<NodeRef<'_>>, HawgError> {
        let key = self.resolve(node)?;
        Ok(self.keys_to_refs(self.reverse_table().referrers(key, field_name)))
    }

    /// Follow the first referrer through `field_name` upward
    ///
    /// Returns the chain nearest-first, stopping at a node with no referrer
    /// or when the chain would revisit a node.
    pub fn ancestors<'a>(
        &self,
        node: impl Into<NodeSelector<'a>>,
        field_name: &str,
    ) -> Result<Vec<NodeRef<'_>>, HawgError> {
        let start = self.resolve(node)?;
        let mut visited = HashSet::from([start]);
        let mut chain = Vec::new();
        let mut current = start;

        while let Some(&parent) = self.reverse_table().referrers(current, field_name).first() {
            if !visited.insert(parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        Ok(self.keys_to_refs(&chain))
    }

    /// Nodes reachable from `roots` through `field_name`, children first
    ///
    /// Does not descend below nodes declaring one of `leaf_types`. Each node
    /// is listed once even when the graph is cyclic.
    pub fn node_tree(
        &self,
        roots: &[NodeKey],
        field_name: &str,
        leaf_types: &[&str],
    ) -> Vec<NodeRef<'_>> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<(NodeKey, bool)> = roots.iter().rev().map(|&k| (k, false)).collect();

        while let Some((key, expanded)) = stack.pop() {
            if expanded {
                order.push(key);
                continue;
            }
            if !visited.insert(key) {
                continue;
            }
            let Some(node) = self.node(key) else {
                continue;
            };
            stack.push((key, true));
            if node.has_type(leaf_types) {
                continue;
            }
            for &child in node.node().refs(field_name).iter().rev() {
                if !visited.contains(&child) {
                    stack.push((child, false));
                }
            }
        }
        self.keys_to_refs(&order)
    }
}
