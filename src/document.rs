//! Document loading and serialization
//!
//! A document is a JSON array of JSON objects.

use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

use crate::error::HawgError;

/// Parse document text; `source` names the origin in error messages
pub fn parse_document(content: &str, source: &str) -> Result<Vec<JsonValue>, HawgError> {
    let value: JsonValue = serde_json::from_str(content).map_err(|e| HawgError::LoadError {
        path: source.to_string(),
        reason: e.to_string(),
    })?;
    match value {
        JsonValue::Array(nodes) => Ok(nodes),
        other => Err(HawgError::MalformedInput(format!(
            "{}: document must be a JSON array, got {}",
            source,
            kind_of(&other)
        ))),
    }
}

/// Read and parse a document file
pub fn load_document(path: &Path) -> Result<Vec<JsonValue>, HawgError> {
    if !path.is_file() {
        return Err(HawgError::InvalidPath(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|e| HawgError::LoadError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let doc = parse_document(&content, &path.display().to_string())?;
    tracing::debug!(path = %path.display(), nodes = doc.len(), "loaded document");
    Ok(doc)
}

/// Serialize a document
pub fn to_json_string(doc: &[JsonValue], pretty: bool) -> Result<String, HawgError> {
    if pretty {
        Ok(serde_json::to_string_pretty(doc)?)
    } else {
        Ok(serde_json::to_string(doc)?)
    }
}

fn kind_of(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
