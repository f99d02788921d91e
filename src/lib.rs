//! HAWG: linked-data graph normalization and queries
//!
//! This library turns a document of nested, possibly cyclic JSON objects
//! into an indexed in-memory graph and answers structural queries over it.
//!
//! # Overview
//!
//! Data flows one way:
//!
//! 1. Flatten: inline objects under reference fields become independent
//!    nodes (blank nodes get `_:b00001`-style ids), and every reference
//!    field becomes a deduplicated list of identifiers
//! 2. Index by id: one node per identifier, duplicates rejected
//! 3. Dereference: identifiers become keys into a node arena
//! 4. Reverse and type indexes are derived from the arena
//! 5. The [`Hawg`] store serves lookups and queries
//!
//! Which fields hold references is decided by a [`ReferenceFields`] table,
//! which also supplies a default type for inline objects that declare none.
//!
//! # Usage
//!
//! ```ignore
//! use hawg::{AnnotationQuery, Hawg, ReferenceFields};
//!
//! let doc: Vec<serde_json::Value> = // load a document
//! let store = Hawg::from_document(&doc, ReferenceFields::default())?;
//!
//! let query = AnnotationQuery::new()
//!     .filter(|a| a.data("name") == Some(&serde_json::json!("Muscles")))
//!     .node_types(&["Structure", "Group"]);
//! for node in store.get_nodes_with_annotation(&query) {
//!     println!("{}", node.id());
//! }
//!
//! for root in store.get_header_node()?.refs("root") {
//!     let style = store.compose_field_values(root, "renderOption", None, None)?;
//!     println!("{} {:?}", root.id(), style);
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod flatten;
pub mod graph;
pub mod id;
pub mod index;
pub mod merge;
pub mod node;
pub mod query;
pub mod store;
pub mod vocab;

// Re-export main types for convenience
pub use crate::config::{FieldSpec, ReferenceFields};
pub use crate::document::{load_document, parse_document, to_json_string};
pub use crate::error::HawgError;
pub use crate::flatten::{flatten, Flattener};
pub use crate::graph::{dereference, index_by_id, Graph, IdTable, NodeRef};
pub use crate::id::{classify_id, BlankNodeAllocator, IdKind};
pub use crate::index::{index_by_type, reverse_index, ReverseEntry, ReverseIndex, TypeIndex};
pub use crate::node::{to_document, FlatNode, GraphNode, Node, NodeKey, Value};
pub use crate::query::AnnotationQuery;
pub use crate::store::{Hawg, NodeSelector};
