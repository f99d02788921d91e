//! Secondary indexes derived from a [`Graph`]
//!
//! Both indexes hold [`NodeKey`]s only and can always be rebuilt from the
//! graph; they are never edited independently of it.

use std::collections::{BTreeMap, HashMap};

use crate::graph::Graph;
use crate::node::NodeKey;

/// Incoming references of one node, grouped by field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseEntry {
    target: NodeKey,
    referrers: BTreeMap<String, Vec<NodeKey>>,
}

impl ReverseEntry {
    fn new(target: NodeKey) -> Self {
        Self {
            target,
            referrers: BTreeMap::new(),
        }
    }

    /// The node this entry describes
    pub fn target(&self) -> NodeKey {
        self.target
    }

    /// Nodes pointing at the target through `field`, each at most once
    pub fn referrers(&self, field: &str) -> &[NodeKey] {
        self.referrers.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields through which the target is referenced
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.referrers.keys().map(String::as_str)
    }

    fn add(&mut self, field: &str, from: NodeKey) {
        let list = self.referrers.entry(field.to_string()).or_default();
        if !list.contains(&from) {
            list.push(from);
        }
    }
}

/// Per-node record of who points to it
#[derive(Debug, Clone, Default)]
pub struct ReverseIndex {
    entries: HashMap<NodeKey, ReverseEntry>,
}

impl ReverseIndex {
    pub fn get(&self, key: NodeKey) -> Option<&ReverseEntry> {
        self.entries.get(&key)
    }

    /// Referrers of `key` through `field`; empty if none
    pub fn referrers(&self, key: NodeKey, field: &str) -> &[NodeKey] {
        self.entries
            .get(&key)
            .map(|e| e.referrers(field))
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the reverse-reference index
///
/// For every node N and reference field P, N is recorded once under P in
/// the entry of each target of N[P].
pub fn reverse_index(graph: &Graph) -> ReverseIndex {
    let mut entries: HashMap<NodeKey, ReverseEntry> = HashMap::new();
    for node in graph.iter() {
        for (field, value) in &node.node().fields {
            let Some(targets) = value.as_refs() else {
                continue;
            };
            for &target in targets {
                entries
                    .entry(target)
                    .or_insert_with(|| ReverseEntry::new(target))
                    .add(field, node.key());
            }
        }
    }
    tracing::debug!(entries = entries.len(), "built reverse index");
    ReverseIndex { entries }
}

/// Nodes grouped by declared type
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    buckets: BTreeMap<String, Vec<NodeKey>>,
}

impl TypeIndex {
    /// Nodes declaring `type_name`; empty if no node declares it
    pub fn get(&self, type_name: &str) -> &[NodeKey] {
        self.buckets
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Record `key` under each of `types`, skipping buckets that already hold it
    pub(crate) fn insert(&mut self, key: NodeKey, types: &[String]) {
        for t in types {
            let bucket = self.buckets.entry(t.clone()).or_default();
            if !bucket.contains(&key) {
                bucket.push(key);
            }
        }
    }
}

/// Build the type index
pub fn index_by_type(graph: &Graph) -> TypeIndex {
    let mut index = TypeIndex::default();
    for node in graph.iter() {
        index.insert(node.key(), node.types());
    }
    tracing::debug!(types = index.buckets.len(), "built type index");
    index
}
