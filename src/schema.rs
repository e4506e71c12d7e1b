//! Field schema supplied by the caller.
//!
//! Mirrors the `relatedModels` payload the web client hands to view parsers:
//! `{ "<model>": { "<field>": { "type": "...", "relation": "...", ... } } }`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::ArchError;

/// Metadata for one field of one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMeta {
    #[serde(rename = "type", default)]
    pub field_type: String,
    /// Related model for relational fields.
    #[serde(default)]
    pub relation: Option<String>,
    /// Schema-level label.
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub no_label: bool,
    /// Field drives manual row ordering.
    #[serde(default)]
    pub is_handle: bool,
    /// Anything else the server sent along.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FieldMeta {
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            ..Self::default()
        }
    }

    pub fn related(mut self, model: impl Into<String>) -> Self {
        self.relation = Some(model.into());
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.string = Some(label.into());
        self
    }

    pub fn handle(mut self) -> Self {
        self.is_handle = true;
        self
    }
}

pub type ModelFields = HashMap<String, FieldMeta>;

/// Model name to field name to metadata. Read-only during a parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema {
    models: HashMap<String, ModelFields>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, ArchError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ArchError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn with_field(
        mut self,
        model: impl Into<String>,
        field: impl Into<String>,
        meta: FieldMeta,
    ) -> Self {
        self.models
            .entry(model.into())
            .or_default()
            .insert(field.into(), meta);
        self
    }

    pub fn model(&self, model: &str) -> Option<&ModelFields> {
        self.models.get(model)
    }

    pub fn field(&self, model: &str, field: &str) -> Option<&FieldMeta> {
        self.models.get(model).and_then(|fields| fields.get(field))
    }

    /// Related model of `model.field`, if the field is relational.
    pub fn relation(&self, model: &str, field: &str) -> Option<&str> {
        self.field(model, field)
            .and_then(|meta| meta.relation.as_deref())
            .filter(|relation| !relation.is_empty())
    }
}
