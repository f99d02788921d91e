//! Reference-field configuration
//!
//! Only fields named in the [`ReferenceFields`] table are interpreted as
//! holding node references; every other field is opaque data. The table is
//! validated once when it is built and is immutable afterwards.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::HawgError;
use crate::vocab::is_reserved;

/// Descriptor for a single reference field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSpec {
    /// Type given to inline objects under this field that declare none
    pub default_type: Option<String>,
}

/// The reference-field table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFields {
    fields: BTreeMap<String, FieldSpec>,
}

/// One entry as written in a config file (TOML or the JSON table shape)
#[derive(Debug, Deserialize)]
struct FieldEntry {
    #[serde(default, alias = "defaultType")]
    default_type: Option<String>,
    #[serde(default = "default_true", alias = "isReferenceField")]
    is_reference_field: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    reference_fields: BTreeMap<String, FieldEntry>,
}

impl Default for ReferenceFields {
    fn default() -> Self {
        let builtin: [(&str, Option<&str>); 8] = [
            ("root", None),
            ("member", None),
            ("sourceSelector", Some("Selector")),
            ("baseURL", Some("BaseURL")),
            ("backgroundImage", Some("DataSource")),
            ("dataSource", Some("DataSource")),
            ("annotation", Some("Annotation")),
            ("renderOption", Some("Style")),
        ];
        let fields = builtin
            .into_iter()
            .map(|(name, default_type)| {
                (
                    name.to_string(),
                    FieldSpec {
                        default_type: default_type.map(String::from),
                    },
                )
            })
            .collect();
        Self { fields }
    }
}

impl ReferenceFields {
    /// An empty table: every field is plain data
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Add a reference field, validating its name and default type
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        default_type: Option<&str>,
    ) -> Result<Self, HawgError> {
        let name = name.into();
        let spec = FieldSpec {
            default_type: default_type.map(String::from),
        };
        validate_entry(&name, &spec)?;
        self.fields.insert(name, spec);
        Ok(self)
    }

    /// Parse a TOML config: `[reference_fields.<name>] default_type = "..."`
    pub fn from_toml_str(content: &str) -> Result<Self, HawgError> {
        let file: ConfigFile = toml::from_str(content)?;
        Self::from_entries(file.reference_fields)
    }

    /// Parse the JSON table shape: `{"<name>": {"defaultType": "...", "isReferenceField": true}}`
    pub fn from_json_str(content: &str) -> Result<Self, HawgError> {
        let entries: BTreeMap<String, FieldEntry> = serde_json::from_str(content)?;
        Self::from_entries(entries)
    }

    /// Load a table from disk; `.json` files use the JSON shape, anything else TOML
    pub fn load(path: &Path) -> Result<Self, HawgError> {
        if !path.is_file() {
            return Err(HawgError::InvalidPath(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let fields = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        tracing::debug!(path = %path.display(), fields = fields.len(), "loaded reference fields");
        Ok(fields)
    }

    fn from_entries(entries: BTreeMap<String, FieldEntry>) -> Result<Self, HawgError> {
        let mut fields = BTreeMap::new();
        for (name, entry) in entries {
            if !entry.is_reference_field {
                continue;
            }
            let spec = FieldSpec {
                default_type: entry.default_type,
            };
            validate_entry(&name, &spec)?;
            fields.insert(name, spec);
        }
        Ok(Self { fields })
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn is_reference(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn default_type(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|s| s.default_type.as_deref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn validate_entry(name: &str, spec: &FieldSpec) -> Result<(), HawgError> {
    if name.is_empty() {
        return Err(HawgError::InvalidConfig(
            "reference field name cannot be empty".to_string(),
        ));
    }
    if is_reserved(name) {
        return Err(HawgError::InvalidConfig(format!(
            "reference field '{}' uses a reserved '@' name",
            name
        )));
    }
    if let Some(t) = &spec.default_type {
        if t.is_empty() {
            return Err(HawgError::InvalidConfig(format!(
                "default type of reference field '{}' cannot be empty",
                name
            )));
        }
    }
    Ok(())
}
