//! # Gantt View Arch Parser
//!
//! Turns a gantt view arch plus a field schema into a [`ViewDescriptor`] for the
//! rendering and data-binding layers.
//!
//! ## Identifier Invariants
//!
//! 1. **Field ids**: the Nth occurrence of field `f` within one parse call is `f_N`.
//!    Group-by subtrees are separate calls with their own counters.
//!
//! 2. **Column ids**: `column_<k>` follows strict top-level document order. Fields nested in a
//!    `<groupby>` never produce top-level columns.
//!
//! 3. **Button ids**: header buttons and each group-by's row buttons are independent
//!    sequences starting at 0.
//!
//! 4. **No mutation**: input trees are never annotated. The node to field id association is
//!    returned as a side table keyed by [`NodePath`].
//!
//! ## Failure Model
//!
//! A bad field, button or widget node, or a group-by whose field has no related model, is
//! skipped and reported as a [`Diagnostic`]. The only fatal condition is a top-level arch with
//! no usable field ([`ArchError::NoValidFields`]).

#[cfg(feature = "napi")]
use napi_derive::napi;

mod arch_parser;
mod error;
mod markup;
mod options;
mod resolve;
mod schema;
mod sublist;
mod visitor;


pub use arch_parser::{
    is_column_visible, ColumnSpec, GroupByDescriptor, ViewArchParser, ViewDescriptor,
    COLUMN_TYPE_FIELD,
};
pub use error::*;
pub use markup::{parse_arch, ArchNode, NodePath};
pub use options::{ParseOptions, DEFAULT_LIMIT};
pub use resolve::{
    arch_parse_boolean, ButtonAction, ButtonResolver, ButtonSpec, FieldIdAllocator,
    FieldResolver, FieldSpec, NodeKind, Rejection, StandardButtonResolver, StandardFieldResolver,
    StandardWidgetResolver, WidgetInfo, WidgetResolver, WidgetSpec, VIEW_TYPE_GANTT,
    VIEW_TYPE_LIST,
};
pub use schema::{FieldMeta, FieldSchema, ModelFields};
pub use sublist::{SubListInfo, SubListParser};
pub use visitor::{walk, ArchVisitor, VisitAction};

/// Parse arch markup with the standard resolvers and default options.
pub fn parse_view_arch(
    arch: &str,
    schema: &FieldSchema,
    model_name: &str,
) -> Result<ViewDescriptor, ArchError> {
    ViewArchParser::new().parse_str(arch, schema, model_name)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

/// `models` is the client's `relatedModels` payload, `options` an optional [`ParseOptions`] object.
#[cfg(feature = "napi")]
#[napi]
pub fn parse_view_arch_native(
    arch: String,
    models: serde_json::Value,
    model_name: String,
    options: Option<serde_json::Value>,
) -> napi::Result<serde_json::Value> {
    let schema =
        FieldSchema::from_value(models).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let options = match options {
        Some(value) => serde_json::from_value::<ParseOptions>(value)
            .map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => ParseOptions::default(),
    };

    let descriptor = ViewArchParser::new()
        .with_options(options)
        .parse_str(&arch, &schema, &model_name)
        .map_err(|e| napi::Error::from_reason(format!("[{}] {}", e.code(), e)))?;

    serde_json::to_value(descriptor).map_err(|e| napi::Error::from_reason(e.to_string()))
}
