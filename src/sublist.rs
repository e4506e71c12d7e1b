//! Parses a nested list-like subtree (group-by rows) into field specs and
//! buttons scoped to one target model.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{Diagnostic, DIAG_INVALID_BUTTON, DIAG_INVALID_FIELD};
use crate::markup::{ArchNode, NodePath};
use crate::resolve::{
    ButtonResolver, ButtonSpec, FieldIdAllocator, FieldResolver, FieldSpec, NodeKind,
    StandardButtonResolver, StandardFieldResolver, VIEW_TYPE_LIST,
};
use crate::schema::FieldSchema;
use crate::visitor::{walk, ArchVisitor, VisitAction};

/// Result of one sub-list parse. Paths are relative to the subtree root.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubListInfo {
    pub fields: BTreeMap<String, FieldSpec>,
    pub buttons: Vec<ButtonSpec>,
    /// Which node produced which field id.
    pub field_ids: BTreeMap<NodePath, String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default)]
pub struct SubListParser<F = StandardFieldResolver, B = StandardButtonResolver> {
    field_resolver: F,
    button_resolver: B,
}

impl SubListParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: FieldResolver, B: ButtonResolver> SubListParser<F, B> {
    pub fn with_resolvers(field_resolver: F, button_resolver: B) -> Self {
        Self {
            field_resolver,
            button_resolver,
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(model = model_name))]
    pub fn parse(&self, tree: &ArchNode, schema: &FieldSchema, model_name: &str) -> SubListInfo {
        let mut collector = SubListCollector {
            parser: self,
            schema,
            model_name,
            field_ids: FieldIdAllocator::new(),
            next_button_id: 0,
            info: SubListInfo::default(),
        };
        walk(&mut collector, tree);
        tracing::debug!(
            fields = collector.info.fields.len(),
            buttons = collector.info.buttons.len(),
            "sub-list parsed"
        );
        collector.info
    }
}

struct SubListCollector<'p, F, B> {
    parser: &'p SubListParser<F, B>,
    schema: &'p FieldSchema,
    model_name: &'p str,
    field_ids: FieldIdAllocator,
    next_button_id: usize,
    info: SubListInfo,
}

impl<'a, F: FieldResolver, B: ButtonResolver> ArchVisitor<'a> for SubListCollector<'_, F, B> {
    fn visit_node(&mut self, node: &'a ArchNode, path: &NodePath) -> VisitAction {
        match NodeKind::of(node) {
            NodeKind::Button => {
                match self.parser.button_resolver.resolve_button(node) {
                    Ok(action) => {
                        self.info.buttons.push(ButtonSpec {
                            id: self.next_button_id,
                            action,
                        });
                        self.next_button_id += 1;
                    }
                    Err(rejection) => self.info.diagnostics.push(Diagnostic::emit(
                        DIAG_INVALID_BUTTON,
                        format!("Skipping invalid button node: {}", rejection),
                        &node.tag,
                        path,
                        self.model_name,
                    )),
                }
                VisitAction::SkipChildren
            }
            NodeKind::Field => {
                match self.parser.field_resolver.resolve_field(
                    node,
                    self.schema,
                    self.model_name,
                    VIEW_TYPE_LIST,
                ) {
                    Ok(spec) => {
                        let field_id = self.field_ids.allocate(&spec.name);
                        self.info.field_ids.insert(path.clone(), field_id.clone());
                        self.info.fields.insert(field_id, spec);
                    }
                    Err(rejection) => self.info.diagnostics.push(Diagnostic::emit(
                        DIAG_INVALID_FIELD,
                        format!("Skipping invalid field node: {}", rejection),
                        &node.tag,
                        path,
                        self.model_name,
                    )),
                }
                VisitAction::SkipChildren
            }
            _ => VisitAction::Descend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_arch;
    use crate::schema::FieldMeta;
    use pretty_assertions::assert_eq;

    fn stage_schema() -> FieldSchema {
        FieldSchema::new()
            .with_field("stage", "name", FieldMeta::new("char"))
            .with_field("stage", "fold", FieldMeta::new("boolean"))
    }

    #[test]
    fn test_fields_and_buttons_in_wrappers() {
        let tree = parse_arch(
            r#"<groupby name="stage_id">
                <field name="name"/>
                <div class="o_row">
                    <field name="fold"/>
                    <button name="action_fold" type="object"/>
                </div>
                <field name="name"/>
                <button name="action_open" type="object"/>
            </groupby>"#,
        )
        .unwrap();

        let info = SubListParser::new().parse(&tree, &stage_schema(), "stage");
        let ids: Vec<&str> = info.fields.keys().map(|k| k.as_str()).collect();
        assert_eq!(ids, vec!["fold_0", "name_0", "name_1"]);

        let buttons: Vec<(usize, Option<&str>)> = info
            .buttons
            .iter()
            .map(|b| (b.id, b.action.name.as_deref()))
            .collect();
        assert_eq!(
            buttons,
            vec![(0, Some("action_fold")), (1, Some("action_open"))]
        );

        assert_eq!(
            info.field_ids.get(&NodePath::from(vec![1, 0])).map(String::as_str),
            Some("fold_0")
        );
        assert_eq!(
            info.field_ids.get(&NodePath::from(vec![2])).map(String::as_str),
            Some("name_1")
        );
        assert!(info.diagnostics.is_empty());
        assert!(info.fields.values().all(|f| f.view_type == VIEW_TYPE_LIST));
    }

    #[test]
    fn test_invalid_nodes_are_skipped() {
        let tree = ArchNode::new("groupby")
            .with_child(ArchNode::new("field").with_attr("name", "missing"))
            .with_child(ArchNode::new("field"))
            .with_child(ArchNode::new("button").with_attr("string", "No action"))
            .with_child(ArchNode::new("button").with_attr("name", "ok"))
            .with_child(ArchNode::new("field").with_attr("name", "name"));

        let info = SubListParser::new().parse(&tree, &stage_schema(), "stage");
        assert_eq!(info.fields.len(), 1);
        assert!(info.fields.contains_key("name_0"));
        assert_eq!(info.buttons.len(), 1);
        assert_eq!(info.buttons[0].id, 0);

        let codes: Vec<&str> = info.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![DIAG_INVALID_FIELD, DIAG_INVALID_FIELD, DIAG_INVALID_BUTTON]
        );
        assert_eq!(info.field_ids.len(), 1);
    }

    #[test]
    fn test_field_children_are_not_visited() {
        let tree = ArchNode::new("groupby").with_child(
            ArchNode::new("field")
                .with_attr("name", "name")
                .with_child(ArchNode::new("field").with_attr("name", "fold")),
        );
        let info = SubListParser::new().parse(&tree, &stage_schema(), "stage");
        assert_eq!(info.fields.len(), 1);
        assert!(info.fields.contains_key("name_0"));
    }

    #[test]
    fn test_unknown_model_yields_nothing() {
        let tree = ArchNode::new("groupby").with_child(ArchNode::new("field").with_attr("name", "name"));
        let info = SubListParser::new().parse(&tree, &stage_schema(), "res.partner");
        assert!(info.fields.is_empty());
        assert_eq!(info.diagnostics.len(), 1);
    }
}
