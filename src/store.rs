//! The HAWG graph store
//!
//! Owns the canonical [`Graph`] together with its reverse and type indexes
//! and the session's blank-node allocator.
//!
//! # Ownership
//!
//! Nodes live only in the graph arena. The reverse and type indexes hold
//! [`NodeKey`]s into it, so a node seen through any index is the same
//! record seen through the id table.

use serde_json::Value as JsonValue;

use crate::config::ReferenceFields;
use crate::error::HawgError;
use crate::flatten::Flattener;
use crate::graph::{dereference, index_by_id, Graph, NodeRef};
use crate::id::BlankNodeAllocator;
use crate::index::{index_by_type, reverse_index, ReverseEntry, ReverseIndex, TypeIndex};
use crate::merge::merge_by_id;
use crate::node::{to_document, NodeKey};
use crate::vocab::HEADER_ID;

/// Selects a node either by identifier or by key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSelector<'a> {
    Id(&'a str),
    Key(NodeKey),
}

impl<'a> From<&'a str> for NodeSelector<'a> {
    fn from(id: &'a str) -> Self {
        NodeSelector::Id(id)
    }
}

impl<'a> From<&'a String> for NodeSelector<'a> {
    fn from(id: &'a String) -> Self {
        NodeSelector::Id(id)
    }
}

impl From<NodeKey> for NodeSelector<'_> {
    fn from(key: NodeKey) -> Self {
        NodeSelector::Key(key)
    }
}

impl From<NodeRef<'_>> for NodeSelector<'_> {
    fn from(node: NodeRef<'_>) -> Self {
        NodeSelector::Key(node.key())
    }
}

/// In-memory graph store with id, reverse-reference and type indexes
#[derive(Debug, Clone)]
pub struct Hawg {
    fields: ReferenceFields,
    allocator: BlankNodeAllocator,
    graph: Graph,
    reverse: ReverseIndex,
    types: TypeIndex,
}

impl Default for Hawg {
    fn default() -> Self {
        Self::new(ReferenceFields::default())
    }
}

impl Hawg {
    /// An empty store with its own fresh allocator
    pub fn new(fields: ReferenceFields) -> Self {
        Self {
            fields,
            allocator: BlankNodeAllocator::new(),
            graph: Graph::default(),
            reverse: ReverseIndex::default(),
            types: TypeIndex::default(),
        }
    }

    /// Build a store from a document in one step
    pub fn from_document(doc: &[JsonValue], fields: ReferenceFields) -> Result<Self, HawgError> {
        let mut store = Self::new(fields);
        store.parse(doc)?;
        Ok(store)
    }

    /// Replace the store's contents with `doc`
    ///
    /// flatten -> index by id -> dereference -> reverse/type indexes. On
    /// error the store is left as it was.
    pub fn parse(&mut self, doc: &[JsonValue]) -> Result<(), HawgError> {
        let flat = Flattener::new(&self.fields, &mut self.allocator).flatten(doc)?;
        let graph = dereference(index_by_id(flat)?)?;
        self.install(graph);
        tracing::info!(nodes = self.graph.len(), "parsed document");
        Ok(())
    }

    /// Fold another document into the store
    ///
    /// Nodes whose id is already present are union-merged; all others are
    /// appended. Keys of existing nodes stay valid. On error the store is
    /// left as it was.
    pub fn merge(&mut self, doc: &[JsonValue]) -> Result<(), HawgError> {
        let graph = &self.graph;
        let incoming = Flattener::new(&self.fields, &mut self.allocator)
            .flatten_reserving(doc, |id| graph.key_of(id).is_some())?;
        let incoming = index_by_id(incoming)?;
        let merged = dereference(index_by_id(merge_by_id(self.graph.to_flat(), incoming))?)?;
        self.install(merged);
        tracing::info!(nodes = self.graph.len(), "merged document");
        Ok(())
    }

    fn install(&mut self, graph: Graph) {
        self.reverse = reverse_index(&graph);
        self.types = index_by_type(&graph);
        self.graph = graph;
    }

    /// Rebuild the reverse and type indexes from the id table
    pub fn rebuild_indexes(&mut self) {
        self.reverse = reverse_index(&self.graph);
        self.types = index_by_type(&self.graph);
    }

    /// Create a node carrying only an id and types
    ///
    /// Allocates a blank id when `id` is `None`. The node is added to the
    /// id table and its type buckets together; an existing id is rejected
    /// with `DuplicateId`.
    pub fn create_node<S: AsRef<str>>(
        &mut self,
        types: &[S],
        id: Option<&str>,
    ) -> Result<NodeKey, HawgError> {
        let id = match id {
            Some(id) => id.to_string(),
            None => {
                let graph = &self.graph;
                self.allocator.next_free(|id| graph.key_of(id).is_some())
            }
        };
        let types: Vec<String> = types.iter().map(|t| t.as_ref().to_string()).collect();
        let key = self.graph.insert(id, types.clone())?;
        self.types.insert(key, &types);
        tracing::debug!(key = %key, "created node");
        Ok(key)
    }

    /// Resolve a selector to a key, failing with `NotFound`
    pub fn resolve<'a>(&self, node: impl Into<NodeSelector<'a>>) -> Result<NodeKey, HawgError> {
        match node.into() {
            NodeSelector::Id(id) => self
                .graph
                .key_of(id)
                .ok_or_else(|| HawgError::NotFound(id.to_string())),
            NodeSelector::Key(key) => self
                .graph
                .node(key)
                .map(|_| key)
                .ok_or_else(|| HawgError::NotFound(key.to_string())),
        }
    }

    /// Resolve a selector to a node handle, failing with `NotFound`
    pub fn select<'a>(&self, node: impl Into<NodeSelector<'a>>) -> Result<NodeRef<'_>, HawgError> {
        let key = self.resolve(node)?;
        self.graph
            .node_ref(key)
            .ok_or_else(|| HawgError::NotFound(key.to_string()))
    }

    pub fn get_node(&self, id: &str) -> Result<NodeRef<'_>, HawgError> {
        self.graph
            .get(id)
            .ok_or_else(|| HawgError::NotFound(id.to_string()))
    }

    /// Look up several nodes; fails on the first missing id
    pub fn get_nodes<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<NodeRef<'_>>, HawgError> {
        ids.iter().map(|id| self.get_node(id.as_ref())).collect()
    }

    pub fn node(&self, key: NodeKey) -> Option<NodeRef<'_>> {
        self.graph.node_ref(key)
    }

    /// The document entry point, `#__header__`
    pub fn get_header_node(&self) -> Result<NodeRef<'_>, HawgError> {
        self.get_node(HEADER_ID)
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.graph.iter()
    }

    /// Nodes declaring `type_name`; empty if none do
    pub fn nodes_of_type(&self, type_name: &str) -> Vec<NodeRef<'_>> {
        self.keys_to_refs(self.types.get(type_name))
    }

    /// Reverse entry of a node, if anything references it
    pub fn reverse_entry<'a>(
        &self,
        node: impl Into<NodeSelector<'a>>,
    ) -> Result<Option<&ReverseEntry>, HawgError> {
        let key = self.resolve(node)?;
        Ok(self.reverse.get(key))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn reverse_table(&self) -> &ReverseIndex {
        &self.reverse
    }

    pub fn type_table(&self) -> &TypeIndex {
        &self.types
    }

    pub fn reference_fields(&self) -> &ReferenceFields {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Export the store as a flattened JSON document
    pub fn to_document(&self) -> Vec<JsonValue> {
        to_document(&self.graph.to_flat())
    }

    pub(crate) fn keys_to_refs(&self, keys: &[NodeKey]) -> Vec<NodeRef<'_>> {
        keys.iter().filter_map(|&k| self.graph.node_ref(k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_doc() -> Vec<JsonValue> {
        vec![
            json!({
                "@id": "#__header__",
                "@type": "Header",
                "root": ["g1"]
            }),
            json!({
                "@id": "g1",
                "@type": "Group",
                "member": [
                    {"@id": "s1", "@type": "Structure", "annotation": "a1"},
                    {"@type": "Structure", "annotation": {"name": "Bones"}}
                ]
            }),
            json!({"@id": "a1", "@type": "Annotation", "name": "Muscles"}),
        ]
    }

    #[test]
    fn test_parse_builds_all_indexes() {
        let store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        assert_eq!(store.len(), 6);

        let s1 = store.get_node("s1").unwrap();
        let a1 = store.get_node("a1").unwrap();
        assert_eq!(
            store.reverse_table().referrers(a1.key(), "annotation"),
            [s1.key()]
        );
        assert_eq!(store.nodes_of_type("Structure").len(), 2);
        assert_eq!(store.nodes_of_type("Annotation").len(), 2);
    }

    #[test]
    fn test_get_node_not_found() {
        let store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let result = store.get_node("missing");
        assert!(matches!(result, Err(HawgError::NotFound(id)) if id == "missing"));
    }

    #[test]
    fn test_header_node() {
        let store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let header = store.get_header_node().unwrap();
        let roots: Vec<_> = header.refs("root").map(|n| n.id()).collect();
        assert_eq!(roots, vec!["g1"]);

        let empty = Hawg::from_document(&[json!({"@id": "n1"})], ReferenceFields::default())
            .unwrap();
        assert!(matches!(
            empty.get_header_node(),
            Err(HawgError::NotFound(_))
        ));
    }

    #[test]
    fn test_absent_type_is_empty() {
        let store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        assert!(store.nodes_of_type("Vessel").is_empty());
    }

    #[test]
    fn test_get_nodes() {
        let store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let nodes = store.get_nodes(&["g1", "a1"]).unwrap();
        assert_eq!(nodes[1].id(), "a1");
        assert!(matches!(
            store.get_nodes(&["g1", "nope"]),
            Err(HawgError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_node() {
        let mut store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let key = store.create_node(&["Style", "Custom"], None).unwrap();

        let node = store.node(key).unwrap();
        assert!(node.id().starts_with("_:b"));
        assert_eq!(node.types(), ["Style".to_string(), "Custom".to_string()]);
        assert_eq!(store.get_node(node.id()).unwrap(), node);
        assert!(store.nodes_of_type("Custom").contains(&node));
        assert!(store.nodes_of_type("Style").contains(&node));
    }

    #[test]
    fn test_create_node_blank_ids_continue_session() {
        let mut store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        // parse allocated two blank ids (inline structure and its annotation)
        let key = store.create_node(&["Style"], None).unwrap();
        assert_eq!(store.node(key).unwrap().id(), "_:b00003");
    }

    #[test]
    fn test_create_node_duplicate_id() {
        let mut store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let before = store.nodes_of_type("Group").len();
        let result = store.create_node(&["Group"], Some("g1"));
        assert!(matches!(result, Err(HawgError::DuplicateId(id)) if id == "g1"));
        assert_eq!(store.nodes_of_type("Group").len(), before);
    }

    #[test]
    fn test_create_node_with_id() {
        let mut store = Hawg::default();
        let key = store.create_node(&["Header"], Some(HEADER_ID)).unwrap();
        assert_eq!(store.get_header_node().unwrap().key(), key);
    }

    #[test]
    fn test_failed_parse_leaves_store_untouched() {
        let mut store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let result = store.parse(&[json!({"@id": "x", "member": "ghost"})]);
        assert!(matches!(result, Err(HawgError::UnresolvedReference { .. })));
        assert!(store.get_node("g1").is_ok());

        let result = store.parse(&[json!({"@id": "x"}), json!({"@id": "x"})]);
        assert!(matches!(result, Err(HawgError::DuplicateId(_))));
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_merge() {
        let mut store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let g1 = store.get_node("g1").unwrap().key();

        store
            .merge(&[
                json!({"@id": "g1", "member": [{"@type": "Vessel"}]}),
                json!({"@id": "v2", "@type": "Vessel"}),
            ])
            .unwrap();

        assert_eq!(store.get_node("g1").unwrap().key(), g1);
        let members: Vec<_> = store.get_node("g1").unwrap().refs("member").collect();
        assert_eq!(members.len(), 3);
        assert_eq!(store.nodes_of_type("Vessel").len(), 2);
        // blank ids never collide with ones already in the store
        assert_eq!(members[2].id(), "_:b00003");
    }

    #[test]
    fn test_merge_id_only_object_refers_to_stored_node() {
        let mut store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let before = store.len();
        store
            .merge(&[json!({"@id": "n9", "member": {"@id": "g1"}})])
            .unwrap();

        assert_eq!(store.len(), before + 1);
        let members: Vec<_> = store.get_node("n9").unwrap().refs("member").collect();
        assert_eq!(members[0].id(), "g1");
    }

    #[test]
    fn test_merge_rejects_internal_duplicates() {
        let mut store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let result = store.merge(&[json!({"@id": "z"}), json!({"@id": "z"})]);
        assert!(matches!(result, Err(HawgError::DuplicateId(_))));
        assert!(store.get_node("z").is_err());
    }

    #[test]
    fn test_rebuild_indexes_is_stable() {
        let mut store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let a1 = store.get_node("a1").unwrap().key();
        let before = store.reverse_table().referrers(a1, "annotation").to_vec();
        store.rebuild_indexes();
        assert_eq!(store.reverse_table().referrers(a1, "annotation"), before);
    }

    #[test]
    fn test_to_document_round_trips() {
        let store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let again =
            Hawg::from_document(&store.to_document(), ReferenceFields::default()).unwrap();
        assert_eq!(again.to_document(), store.to_document());
    }

    #[test]
    fn test_reverse_entry() {
        let store = Hawg::from_document(&sample_doc(), ReferenceFields::default()).unwrap();
        let entry = store.reverse_entry("g1").unwrap().unwrap();
        let header = store.get_header_node().unwrap();
        assert_eq!(entry.referrers("root"), [header.key()]);
        assert!(store.reverse_entry(header).unwrap().is_none());
        assert!(store.reverse_entry("nope").is_err());
    }
}
