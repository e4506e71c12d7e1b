//! Markup Module for the Gantt Arch Parser
//!
//! Reads view arch text into an owned [`ArchNode`] tree and writes any subtree
//! back out in the same textual form. Arches are XML, so parsing goes through
//! xml5ever: elements nest exactly as written and names keep their case.
//!
//! Conversion, traversal and serialization all run on explicit stacks, so the
//! depth of an arch is bounded by memory rather than by the call stack.

use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use tendril::TendrilSink;
use xml5ever::driver::parse_document;
use xml5ever::serialize::{
    serialize, SerializeOpts, Serialize as MarkupSerialize, Serializer as MarkupSerializer,
    TraversalScope,
};
use xml5ever::{LocalName, Namespace, QualName};

use crate::error::ArchError;

// ═══════════════════════════════════════════════════════════════════════════════
// TREE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// One element of a view arch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchNode {
    pub tag: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<ArchNode>,
}

impl ArchNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: ArchNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, treating an empty string as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|value| !value.is_empty())
    }

    /// Serialize this node and its subtree back to arch markup.
    pub fn to_markup(&self) -> String {
        let mut out = Vec::new();
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::IncludeNode,
        };
        // Writing into a Vec cannot fail.
        match serialize(&mut out, self, opts) {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => String::new(),
        }
    }
}

// Dropping nested child vectors would otherwise recurse once per level.
impl Drop for ArchNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Position of a node below the root handed to a parse call.
///
/// The root itself is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }

    /// Rebase a path that is relative to the node at `self`.
    pub fn join(&self, relative: &NodePath) -> Self {
        let mut steps = self.0.clone();
        steps.extend_from_slice(&relative.0);
        Self(steps)
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(steps: Vec<usize>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        let parts: Vec<String> = self.0.iter().map(|step| step.to_string()).collect();
        write!(f, "{}", parts.join("/"))
    }
}

// Paths key JSON maps, so they serialize as their display form.
impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// `prefix:local` as written in the source.
fn full_name(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

/// An element under conversion and the DOM children it has not consumed yet.
struct Frame {
    node: ArchNode,
    pending: std::vec::IntoIter<Handle>,
}

impl Frame {
    /// `None` for anything but an element: text, comments and processing
    /// instructions carry nothing for the arch.
    fn open(handle: &Handle) -> Option<Self> {
        let NodeData::Element { name, attrs, .. } = &handle.data else {
            return None;
        };

        let attrs = attrs
            .borrow()
            .iter()
            .map(|attr| (full_name(&attr.name), attr.value.to_string()))
            .collect();

        Some(Self {
            node: ArchNode {
                tag: full_name(name),
                attrs,
                children: Vec::new(),
            },
            pending: handle.children.borrow().clone().into_iter(),
        })
    }
}

fn convert_element(root: &Handle) -> Option<ArchNode> {
    let mut stack = vec![Frame::open(root)?];

    while let Some(frame) = stack.last_mut() {
        if let Some(child) = frame.pending.next() {
            stack.extend(Frame::open(&child));
            continue;
        }

        let Some(done) = stack.pop() else { break };
        match stack.last_mut() {
            Some(parent) => parent.node.children.push(done.node),
            None => return Some(done.node),
        }
    }
    None
}

/// Parse arch markup into a single-rooted tree.
///
/// The input must be well-formed XML. Anything the XML tree builder flags,
/// including a second root element, is an [`ArchError::Markup`].
pub fn parse_arch(markup: &str) -> Result<ArchNode, ArchError> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut markup.as_bytes())
        .map_err(|e| ArchError::Markup(e.to_string()))?;

    let root = dom
        .document
        .children
        .borrow()
        .iter()
        .find_map(convert_element);

    let root = root.ok_or(ArchError::EmptyArch)?;
    if !dom.errors.is_empty() {
        let messages: Vec<&str> = dom.errors.iter().map(|e| e.as_ref()).collect();
        return Err(ArchError::Markup(messages.join("; ")));
    }
    Ok(root)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

fn qual_name(name: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(name))
}

enum Step<'a> {
    Open(&'a ArchNode),
    Close(&'a ArchNode),
}

impl MarkupSerialize for ArchNode {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: MarkupSerializer,
    {
        let mut steps: Vec<Step<'_>> = match traversal_scope {
            TraversalScope::IncludeNode => vec![Step::Open(self)],
            TraversalScope::ChildrenOnly(_) => self.children.iter().rev().map(Step::Open).collect(),
        };

        while let Some(step) = steps.pop() {
            match step {
                Step::Open(node) => {
                    let names: Vec<QualName> =
                        node.attrs.iter().map(|(name, _)| qual_name(name)).collect();
                    let attrs = names
                        .iter()
                        .zip(node.attrs.iter())
                        .map(|(name, (_, value))| (name, value.as_str()));
                    serializer.start_elem(qual_name(&node.tag), attrs)?;

                    steps.push(Step::Close(node));
                    steps.extend(node.children.iter().rev().map(Step::Open));
                }
                Step::Close(node) => serializer.end_elem(qual_name(&node.tag))?,
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_siblings_stay_siblings() {
        let root = parse_arch(
            r#"<gantt_ps><field name="a"/><field name="b"/><button name="go"/></gantt_ps>"#,
        )
        .unwrap();
        assert_eq!(root.tag, "gantt_ps");
        let tags: Vec<&str> = root.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["field", "field", "button"]);
        assert_eq!(root.children[1].attr("name"), Some("b"));
    }

    #[test]
    fn test_prolog_comments_and_text_are_dropped() {
        let root = parse_arch(
            r#"<?xml version="1.0"?>
            <!-- header -->
            <gantt_ps>
                text
                <!-- inline -->
                <field name="a"/>
            </gantt_ps>"#,
        )
        .unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].tag, "field");
    }

    #[test]
    fn test_elements_nest_as_written() {
        // HTML content models would move or drop all of these.
        let root = parse_arch(
            r#"<gantt_ps>
                <p><groupby name="stage_id"><div><field name="name"/></div></groupby></p>
                <template><field name="a"/></template>
                <table><field name="b"/></table>
                <button name="outer"><button name="inner"/></button>
            </gantt_ps>"#,
        )
        .unwrap();
        let tags: Vec<&str> = root.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["p", "template", "table", "button"]);

        let groupby = &root.children[0].children[0];
        assert_eq!(groupby.tag, "groupby");
        assert_eq!(groupby.children[0].children[0].attr("name"), Some("name"));
        assert_eq!(root.children[1].children[0].attr("name"), Some("a"));
        assert_eq!(root.children[2].children[0].attr("name"), Some("b"));
        assert_eq!(root.children[3].children[0].attr("name"), Some("inner"));
    }

    #[test]
    fn test_names_keep_their_case() {
        let root = parse_arch(r#"<gantt_ps><Field Name="a"/></gantt_ps>"#).unwrap();
        assert_eq!(root.children[0].tag, "Field");
        assert_eq!(root.children[0].attr("Name"), Some("a"));
    }

    #[test]
    fn test_empty_and_malformed_arch() {
        assert!(matches!(parse_arch("   "), Err(ArchError::EmptyArch)));
        assert!(matches!(parse_arch("<!-- only -->"), Err(ArchError::EmptyArch)));
        assert!(matches!(
            parse_arch(r#"<field name="a"/><field name="b"/>"#),
            Err(ArchError::Markup(_))
        ));
        assert!(matches!(
            parse_arch(r#"<gantt_ps><field name="a"></gantt_ps>"#),
            Err(ArchError::Markup(_))
        ));
    }

    #[test]
    fn test_markup_reparses_to_same_tree() {
        let tree = ArchNode::new("gantt_ps")
            .with_attr("string", "Tasks & \"plans\"")
            .with_child(
                ArchNode::new("field")
                    .with_attr("name", "task_name")
                    .with_attr("invisible", "priority > 1"),
            )
            .with_child(
                ArchNode::new("groupby")
                    .with_attr("name", "stage_id")
                    .with_child(ArchNode::new("field").with_attr("name", "name")),
            );

        let markup = tree.to_markup();
        assert!(markup.contains("&amp;"));
        assert!(markup.starts_with(r#"<gantt_ps string="#));
        assert_eq!(parse_arch(&markup).unwrap(), tree);
    }

    fn nested_markup(depth: usize) -> String {
        let mut markup = String::from("<gantt_ps>");
        markup.push_str(&"<div>".repeat(depth));
        markup.push_str(r#"<field name="deep"/>"#);
        markup.push_str(&"</div>".repeat(depth));
        markup.push_str("</gantt_ps>");
        markup
    }

    #[test]
    fn test_deep_nesting_parses_and_serializes() {
        let depth = 10_000;
        let markup = nested_markup(depth);
        let root = parse_arch(&markup).unwrap();

        let mut node = &root;
        let mut levels = 0;
        while let Some(child) = node.children.first() {
            node = child;
            levels += 1;
        }
        assert_eq!(levels, depth + 1);
        assert_eq!(node.attr("name"), Some("deep"));

        let echoed = root.to_markup();
        assert!(echoed.starts_with("<gantt_ps><div><div>"));
        assert!(echoed.ends_with("</div></div></gantt_ps>"));
        assert_eq!(echoed.matches("<div>").count(), depth);
    }

    #[test]
    fn test_node_path_display() {
        assert_eq!(NodePath::root().to_string(), "/");
        let path = NodePath::root().child(0).child(2);
        assert_eq!(path.to_string(), "0/2");
        assert_eq!(NodePath::from(vec![1]).join(&path).to_string(), "1/0/2");
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"0/2\"");
    }
}
