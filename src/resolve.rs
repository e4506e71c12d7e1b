//! Resolve Module for the Gantt Arch Parser
//!
//! Turns individual arch nodes into structured specs. The parsers never look
//! at field widgets or button actions themselves; they go through the
//! [`FieldResolver`], [`ButtonResolver`] and [`WidgetResolver`] seams, which
//! callers may replace.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::markup::ArchNode;
use crate::schema::{FieldMeta, FieldSchema};

pub const VIEW_TYPE_GANTT: &str = "gantt_ps";
pub const VIEW_TYPE_LIST: &str = "list";

pub const HANDLE_WIDGET: &str = "handle";

// ═══════════════════════════════════════════════════════════════════════════════
// NODE KINDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parsing-relevant kind of an arch node, decided once per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind<'a> {
    Field,
    Button,
    /// `<groupby>` carrying the grouped field's name.
    GroupBy(&'a str),
    Widget,
    Other,
}

impl<'a> NodeKind<'a> {
    pub fn of(node: &'a ArchNode) -> Self {
        match node.tag.as_str() {
            "field" => Self::Field,
            "button" => Self::Button,
            "widget" => Self::Widget,
            "groupby" => match node.non_empty_attr("name") {
                Some(name) => Self::GroupBy(name),
                None => Self::Other,
            },
            _ => Self::Other,
        }
    }
}

/// Arch boolean semantics: `0`, `false` and `False` are false, anything else is
/// true. A present but empty attribute is `true_if_empty`.
pub fn arch_parse_boolean(value: Option<&str>, true_if_empty: bool) -> bool {
    match value.map(str::trim) {
        None => false,
        Some("") => true_if_empty,
        Some("0") | Some("false") | Some("False") => false,
        Some(_) => true,
    }
}

fn attr_map(node: &ArchNode) -> BTreeMap<String, String> {
    node.attrs.iter().cloned().collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPECS
// ═══════════════════════════════════════════════════════════════════════════════

/// A resolved field reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    /// Display label: the node's `string`, else the schema label.
    pub string: Option<String>,
    pub widget: Option<String>,
    pub field_type: String,
    pub attrs: BTreeMap<String, String>,
    pub is_handle: bool,
    pub field: FieldMeta,
    pub view_type: String,
}

/// Action metadata of a button node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonAction {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub button_type: Option<String>,
    pub string: Option<String>,
    pub icon: Option<String>,
    pub title: Option<String>,
    pub class_name: String,
    pub context: Option<String>,
    pub special: Option<String>,
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonSpec {
    /// Sequential within one extracted button set.
    pub id: usize,
    #[serde(flatten)]
    pub action: ButtonAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetInfo {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSpec {
    pub id: String,
    #[serde(flatten)]
    pub widget: WidgetInfo,
}

/// Why a resolver refused a node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("<{tag}> node has no name")]
    MissingName { tag: String },

    #[error("model '{model}' is not part of the schema")]
    UnknownModel { model: String },

    #[error("field '{field}' does not exist on model '{model}'")]
    UnknownField { model: String, field: String },

    #[error("button has neither a name nor a special action")]
    MissingAction,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLVER SEAMS
// ═══════════════════════════════════════════════════════════════════════════════

pub trait FieldResolver: Sync {
    fn resolve_field(
        &self,
        node: &ArchNode,
        schema: &FieldSchema,
        model: &str,
        view_type: &str,
    ) -> Result<FieldSpec, Rejection>;
}

pub trait ButtonResolver: Sync {
    fn resolve_button(&self, node: &ArchNode) -> Result<ButtonAction, Rejection>;
}

pub trait WidgetResolver: Sync {
    fn resolve_widget(&self, node: &ArchNode) -> Result<WidgetInfo, Rejection>;
}

impl<T: FieldResolver + ?Sized> FieldResolver for &T {
    fn resolve_field(
        &self,
        node: &ArchNode,
        schema: &FieldSchema,
        model: &str,
        view_type: &str,
    ) -> Result<FieldSpec, Rejection> {
        (**self).resolve_field(node, schema, model, view_type)
    }
}

impl<T: ButtonResolver + ?Sized> ButtonResolver for &T {
    fn resolve_button(&self, node: &ArchNode) -> Result<ButtonAction, Rejection> {
        (**self).resolve_button(node)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STANDARD RESOLVERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves `<field name="...">` against the model's schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFieldResolver;

impl FieldResolver for StandardFieldResolver {
    fn resolve_field(
        &self,
        node: &ArchNode,
        schema: &FieldSchema,
        model: &str,
        view_type: &str,
    ) -> Result<FieldSpec, Rejection> {
        let name = node.non_empty_attr("name").ok_or_else(|| Rejection::MissingName {
            tag: node.tag.clone(),
        })?;

        let fields = schema.model(model).ok_or_else(|| Rejection::UnknownModel {
            model: model.to_string(),
        })?;
        let meta = fields.get(name).ok_or_else(|| Rejection::UnknownField {
            model: model.to_string(),
            field: name.to_string(),
        })?;

        let widget = node.non_empty_attr("widget").map(str::to_string);
        let is_handle = widget.as_deref() == Some(HANDLE_WIDGET)
            || arch_parse_boolean(node.attr("handle"), true)
            || meta.is_handle;

        Ok(FieldSpec {
            name: name.to_string(),
            string: node
                .non_empty_attr("string")
                .map(str::to_string)
                .or_else(|| meta.string.clone()),
            widget,
            field_type: meta.field_type.clone(),
            attrs: attr_map(node),
            is_handle,
            field: meta.clone(),
            view_type: view_type.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardButtonResolver;

impl ButtonResolver for StandardButtonResolver {
    fn resolve_button(&self, node: &ArchNode) -> Result<ButtonAction, Rejection> {
        let owned = |key: &str| node.non_empty_attr(key).map(str::to_string);

        let name = owned("name");
        let special = owned("special");
        if name.is_none() && special.is_none() {
            return Err(Rejection::MissingAction);
        }

        Ok(ButtonAction {
            name,
            button_type: owned("type"),
            string: owned("string"),
            icon: owned("icon"),
            title: owned("title"),
            class_name: node.attr("class").unwrap_or_default().to_string(),
            context: owned("context"),
            special,
            attrs: attr_map(node),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardWidgetResolver;

impl WidgetResolver for StandardWidgetResolver {
    fn resolve_widget(&self, node: &ArchNode) -> Result<WidgetInfo, Rejection> {
        let name = node.non_empty_attr("name").ok_or_else(|| Rejection::MissingName {
            tag: node.tag.clone(),
        })?;
        Ok(WidgetInfo {
            name: name.to_string(),
            attrs: attr_map(node),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FIELD IDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-call field id counters: the Nth occurrence of `name` gets `name_N`.
#[derive(Debug, Default)]
pub struct FieldIdAllocator {
    next: HashMap<String, usize>,
}

impl FieldIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, name: &str) -> String {
        let counter = self.next.entry(name.to_string()).or_insert(0);
        let id = format!("{}_{}", name, counter);
        *counter += 1;
        id
    }
}
