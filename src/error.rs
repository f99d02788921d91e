//! Error types for graph flattening, indexing and queries

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HawgError {
    #[error("Duplicate node id '{0}'")]
    DuplicateId(String),

    #[error("Unresolved reference '{target}' in field '{field}' of node '{node}'")]
    UnresolvedReference {
        node: String,
        field: String,
        target: String,
    },

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load document from {path}: {reason}")]
    LoadError { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),
}
