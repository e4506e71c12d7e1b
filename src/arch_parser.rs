//! Arch Parser Module for the Gantt View
//!
//! Parses the top-level gantt arch into a [`ViewDescriptor`]:
//!
//! 1. **Fields** become field specs and columns. The Nth occurrence of a name is `name_N`.
//! 2. **Buttons** become header buttons with their own id sequence.
//! 3. **Widgets** go to the widget registry and produce no column.
//! 4. **Group-bys** hand their subtree to [`SubListParser`] against the grouped field's
//!    related model. Their fields never become top-level columns.
//!
//! Anything else is transparent. Bad nodes are skipped with a [`Diagnostic`]; the only
//! fatal outcome is an arch without a single usable field.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{
    ArchError, Diagnostic, DIAG_GROUPBY_NO_RELATION, DIAG_INVALID_BUTTON, DIAG_INVALID_FIELD,
    DIAG_INVALID_WIDGET,
};
use crate::markup::{parse_arch, ArchNode, NodePath};
use crate::options::ParseOptions;
use crate::resolve::{
    arch_parse_boolean, ButtonResolver, ButtonSpec, FieldIdAllocator, FieldResolver, FieldSpec,
    NodeKind, StandardButtonResolver, StandardFieldResolver, StandardWidgetResolver,
    WidgetResolver, WidgetSpec, VIEW_TYPE_GANTT,
};
use crate::schema::FieldSchema;
use crate::sublist::{SubListInfo, SubListParser};
use crate::visitor::{walk, ArchVisitor, VisitAction};

pub const COLUMN_TYPE_FIELD: &str = "field";

// ═══════════════════════════════════════════════════════════════════════════════
// DESCRIPTOR TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// `column_<k>` in top-level encounter order.
    pub id: String,
    pub field_id: String,
    #[serde(rename = "type")]
    pub column_type: &'static str,
    pub class_name: String,
    /// `optional` attribute (`show` / `hide`); absent means always shown.
    pub optional: Option<String>,
    pub column_visible: bool,
    pub has_label: bool,
    pub label: String,
    #[serde(flatten)]
    pub field: FieldSpec,
}

impl ColumnSpec {
    pub fn is_optional(&self) -> bool {
        self.optional.is_some()
    }
}

/// Rows of one group-by field, parsed against its related model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByDescriptor {
    pub related_model: String,
    /// Where the `<groupby>` node sits in the top-level arch.
    pub path: NodePath,
    pub fields: BTreeMap<String, FieldSpec>,
    pub buttons: Vec<ButtonSpec>,
    /// Relative to `path`.
    pub field_ids: BTreeMap<NodePath, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDescriptor {
    pub model: String,
    pub field_nodes: BTreeMap<String, FieldSpec>,
    pub columns: Vec<ColumnSpec>,
    pub header_buttons: Vec<ButtonSpec>,
    pub widget_nodes: BTreeMap<String, WidgetSpec>,
    pub group_by: BTreeMap<String, GroupByDescriptor>,
    pub handle_field: Option<String>,
    pub field_ids: BTreeMap<NodePath, String>,
    /// Top-level diagnostics first, then group-by ones in document order.
    pub diagnostics: Vec<Diagnostic>,
    pub arch: String,
    pub limit: u32,
}

impl ViewDescriptor {
    pub fn column_ids(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.id.as_str()).collect()
    }
}

/// A column is only hidden when `column_invisible` is a literal truth.
/// Expressions are left to the renderer.
pub fn is_column_visible(column_invisible: Option<&str>) -> bool {
    !matches!(
        column_invisible.map(str::trim),
        Some("1") | Some("True") | Some("true")
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ViewArchParser<
    F = StandardFieldResolver,
    B = StandardButtonResolver,
    W = StandardWidgetResolver,
> {
    field_resolver: F,
    button_resolver: B,
    widget_resolver: W,
    options: ParseOptions,
}

impl ViewArchParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: FieldResolver, B: ButtonResolver, W: WidgetResolver> ViewArchParser<F, B, W> {
    pub fn with_resolvers(field_resolver: F, button_resolver: B, widget_resolver: W) -> Self {
        Self {
            field_resolver,
            button_resolver,
            widget_resolver,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Read arch markup, then [`parse`](Self::parse) it.
    pub fn parse_str(
        &self,
        arch: &str,
        schema: &FieldSchema,
        model_name: &str,
    ) -> Result<ViewDescriptor, ArchError> {
        let tree = parse_arch(arch)?;
        self.parse(&tree, schema, model_name)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(model = model_name))]
    pub fn parse(
        &self,
        tree: &ArchNode,
        schema: &FieldSchema,
        model_name: &str,
    ) -> Result<ViewDescriptor, ArchError> {
        let mut collector = ArchCollector {
            parser: self,
            schema,
            model_name,
            field_ids: FieldIdAllocator::new(),
            next_column_id: 0,
            next_button_id: 0,
            next_widget_id: 0,
            field_nodes: BTreeMap::new(),
            columns: Vec::new(),
            header_buttons: Vec::new(),
            widget_nodes: BTreeMap::new(),
            handle_field: None,
            node_field_ids: BTreeMap::new(),
            group_by_jobs: Vec::new(),
            diagnostics: Vec::new(),
        };
        walk(&mut collector, tree);

        let ArchCollector {
            field_nodes,
            columns,
            header_buttons,
            widget_nodes,
            handle_field,
            node_field_ids,
            group_by_jobs,
            mut diagnostics,
            ..
        } = collector;

        if field_nodes.is_empty() {
            tracing::error!(
                model = model_name,
                arch = %tree.to_markup(),
                "no valid fields found in gantt arch"
            );
            return Err(ArchError::NoValidFields {
                model: model_name.to_string(),
            });
        }

        let group_by = self.parse_group_bys(group_by_jobs, schema, &mut diagnostics);

        tracing::debug!(
            fields = field_nodes.len(),
            columns = columns.len(),
            group_by = group_by.len(),
            skipped = diagnostics.len(),
            "gantt arch parsed"
        );

        Ok(ViewDescriptor {
            model: model_name.to_string(),
            field_nodes,
            columns,
            header_buttons,
            widget_nodes,
            group_by,
            handle_field,
            field_ids: node_field_ids,
            diagnostics,
            arch: tree.to_markup(),
            limit: self.options.limit,
        })
    }

    /// Results are merged in document order whichever path ran them.
    fn parse_group_bys(
        &self,
        jobs: Vec<GroupByJob<'_>>,
        schema: &FieldSchema,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> BTreeMap<String, GroupByDescriptor> {
        let sub_parser = SubListParser::with_resolvers(&self.field_resolver, &self.button_resolver);
        let run = |job: &GroupByJob<'_>| sub_parser.parse(job.node, schema, &job.related_model);

        let results: Vec<SubListInfo> = if self.options.parallel_group_by {
            jobs.par_iter().map(run).collect()
        } else {
            jobs.iter().map(run).collect()
        };

        let mut group_by = BTreeMap::new();
        for (job, info) in jobs.into_iter().zip(results) {
            diagnostics.extend(info.diagnostics.into_iter().map(|d| d.rebased(&job.path)));
            group_by.insert(
                job.field_name,
                GroupByDescriptor {
                    related_model: job.related_model,
                    path: job.path,
                    fields: info.fields,
                    buttons: info.buttons,
                    field_ids: info.field_ids,
                },
            );
        }
        group_by
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAVERSAL STATE
// ═══════════════════════════════════════════════════════════════════════════════

struct GroupByJob<'a> {
    field_name: String,
    related_model: String,
    node: &'a ArchNode,
    path: NodePath,
}

struct ArchCollector<'a, 'p, F, B, W> {
    parser: &'p ViewArchParser<F, B, W>,
    schema: &'p FieldSchema,
    model_name: &'p str,
    field_ids: FieldIdAllocator,
    next_column_id: usize,
    next_button_id: usize,
    next_widget_id: usize,
    field_nodes: BTreeMap<String, FieldSpec>,
    columns: Vec<ColumnSpec>,
    header_buttons: Vec<ButtonSpec>,
    widget_nodes: BTreeMap<String, WidgetSpec>,
    handle_field: Option<String>,
    node_field_ids: BTreeMap<NodePath, String>,
    group_by_jobs: Vec<GroupByJob<'a>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, F, B, W> ArchCollector<'a, '_, F, B, W>
where
    F: FieldResolver,
    B: ButtonResolver,
    W: WidgetResolver,
{
    fn skip(&mut self, code: &'static str, message: String, node: &ArchNode, path: &NodePath) {
        self.diagnostics.push(Diagnostic::emit(
            code,
            message,
            &node.tag,
            path,
            self.model_name,
        ));
    }

    fn visit_field(&mut self, node: &ArchNode, path: &NodePath) {
        let spec = match self.parser.field_resolver.resolve_field(
            node,
            self.schema,
            self.model_name,
            VIEW_TYPE_GANTT,
        ) {
            Ok(spec) => spec,
            Err(rejection) => {
                self.skip(
                    DIAG_INVALID_FIELD,
                    format!("Skipping invalid or incomplete field node: {}", rejection),
                    node,
                    path,
                );
                return;
            }
        };

        let field_id = self.field_ids.allocate(&spec.name);
        if spec.is_handle && self.handle_field.is_none() {
            self.handle_field = Some(spec.name.clone());
        }

        let has_label =
            !(arch_parse_boolean(node.attr("nolabel"), false) || spec.field.no_label);
        let column = ColumnSpec {
            id: format!("column_{}", self.next_column_id),
            field_id: field_id.clone(),
            column_type: COLUMN_TYPE_FIELD,
            class_name: node.attr("class").unwrap_or_default().to_string(),
            optional: node.non_empty_attr("optional").map(str::to_string),
            column_visible: is_column_visible(node.attr("column_invisible")),
            has_label,
            label: spec.string.clone().unwrap_or_else(|| spec.name.clone()),
            field: spec.clone(),
        };
        self.next_column_id += 1;

        self.node_field_ids.insert(path.clone(), field_id.clone());
        self.field_nodes.insert(field_id, spec);
        self.columns.push(column);
    }

    fn visit_group_by(&mut self, field_name: &str, node: &'a ArchNode, path: &NodePath) {
        let schema = self.schema;
        let Some(related_model) = schema.relation(self.model_name, field_name) else {
            self.skip(
                DIAG_GROUPBY_NO_RELATION,
                format!(
                    "GroupBy field {} has no related model. Skipping.",
                    field_name
                ),
                node,
                path,
            );
            return;
        };

        self.group_by_jobs.push(GroupByJob {
            field_name: field_name.to_string(),
            related_model: related_model.to_string(),
            node,
            path: path.clone(),
        });
    }

    fn visit_button(&mut self, node: &ArchNode, path: &NodePath) {
        match self.parser.button_resolver.resolve_button(node) {
            Ok(action) => {
                self.header_buttons.push(ButtonSpec {
                    id: self.next_button_id,
                    action,
                });
                self.next_button_id += 1;
            }
            Err(rejection) => self.skip(
                DIAG_INVALID_BUTTON,
                format!("Skipping invalid button node: {}", rejection),
                node,
                path,
            ),
        }
    }

    fn visit_widget(&mut self, node: &ArchNode, path: &NodePath) {
        match self.parser.widget_resolver.resolve_widget(node) {
            Ok(widget) => {
                let id = format!("widget_{}", self.next_widget_id);
                self.next_widget_id += 1;
                self.widget_nodes
                    .insert(id.clone(), WidgetSpec { id, widget });
            }
            Err(rejection) => self.skip(
                DIAG_INVALID_WIDGET,
                format!("Skipping invalid widget node: {}", rejection),
                node,
                path,
            ),
        }
    }
}

impl<'a, F, B, W> ArchVisitor<'a> for ArchCollector<'a, '_, F, B, W>
where
    F: FieldResolver,
    B: ButtonResolver,
    W: WidgetResolver,
{
    fn visit_node(&mut self, node: &'a ArchNode, path: &NodePath) -> VisitAction {
        match NodeKind::of(node) {
            NodeKind::Field => self.visit_field(node, path),
            NodeKind::GroupBy(field_name) => self.visit_group_by(field_name, node, path),
            NodeKind::Button => self.visit_button(node, path),
            NodeKind::Widget => self.visit_widget(node, path),
            NodeKind::Other => return VisitAction::Descend,
        }
        VisitAction::SkipChildren
    }
}
