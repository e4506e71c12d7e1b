use crate::markup::{ArchNode, NodePath};

/// What the walker does after a node has been visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    /// Visit the node's children next.
    Descend,
    /// The node was fully handled; leave its subtree alone.
    SkipChildren,
}

/// The single traversal mechanism for arch trees.
///
/// Rules:
/// 1. Depth-first, document order, the root included.
/// 2. Every node is visited at most once.
/// 3. Pruning is expressed by returning [`VisitAction::SkipChildren`], never by manual recursion.
pub trait ArchVisitor<'a> {
    fn visit_node(&mut self, node: &'a ArchNode, path: &NodePath) -> VisitAction;
}

/// Walk `root` depth-first on an explicit stack.
pub fn walk<'a, V: ArchVisitor<'a> + ?Sized>(visitor: &mut V, root: &'a ArchNode) {
    let mut stack = vec![(root, NodePath::root())];

    while let Some((node, path)) = stack.pop() {
        if visitor.visit_node(node, &path) == VisitAction::SkipChildren {
            continue;
        }
        for (index, child) in node.children.iter().enumerate().rev() {
            stack.push((child, path.child(index)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TagRecorder {
        seen: Vec<(String, String)>,
        prune: &'static str,
    }

    impl<'a> ArchVisitor<'a> for TagRecorder {
        fn visit_node(&mut self, node: &'a ArchNode, path: &NodePath) -> VisitAction {
            self.seen.push((node.tag.clone(), path.to_string()));
            if node.tag == self.prune {
                VisitAction::SkipChildren
            } else {
                VisitAction::Descend
            }
        }
    }

    fn sample() -> ArchNode {
        ArchNode::new("root")
            .with_child(
                ArchNode::new("group")
                    .with_child(ArchNode::new("field"))
                    .with_child(ArchNode::new("button")),
            )
            .with_child(ArchNode::new("groupby").with_child(ArchNode::new("field")))
    }

    #[test]
    fn test_walk_document_order() {
        let tree = sample();
        let mut recorder = TagRecorder {
            seen: Vec::new(),
            prune: "",
        };
        walk(&mut recorder, &tree);
        let seen: Vec<(&str, &str)> = recorder
            .seen
            .iter()
            .map(|(tag, path)| (tag.as_str(), path.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("root", "/"),
                ("group", "0"),
                ("field", "0/0"),
                ("button", "0/1"),
                ("groupby", "1"),
                ("field", "1/0"),
            ]
        );
    }

    #[test]
    fn test_skip_children_prunes_subtree() {
        let tree = sample();
        let mut recorder = TagRecorder {
            seen: Vec::new(),
            prune: "groupby",
        };
        walk(&mut recorder, &tree);
        assert_eq!(recorder.seen.len(), 5);
        assert_eq!(recorder.seen.last().unwrap().0, "groupby");
    }

    struct LeafFinder {
        visited: usize,
        leaf: Option<NodePath>,
    }

    impl<'a> ArchVisitor<'a> for LeafFinder {
        fn visit_node(&mut self, node: &'a ArchNode, path: &NodePath) -> VisitAction {
            self.visited += 1;
            if node.children.is_empty() {
                self.leaf = Some(path.clone());
            }
            VisitAction::Descend
        }
    }

    #[test]
    fn test_walk_deep_chain() {
        let depth = 5_000;
        let mut tree = ArchNode::new("field");
        for _ in 0..depth {
            tree = ArchNode::new("div").with_child(tree);
        }

        let mut finder = LeafFinder {
            visited: 0,
            leaf: None,
        };
        walk(&mut finder, &tree);
        assert_eq!(finder.visited, depth + 1);
        assert_eq!(finder.leaf, Some(NodePath::from(vec![0; depth])));
    }
}
