//! Rooted binary tree model.
//!
//! Trees are arena-backed: nodes live in a `Vec` and refer to each other by
//! [`NodeId`]. Each node carries an optional label (required for leaves), an
//! optional branch length (treated as 1 when absent), and an optional height.
//! The reader collaborator produces these values; the core never parses.

use crate::error::{ArboraError, Result};

/// Identifier of a node within its owning [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the underlying arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single vertex of a rooted tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    label: Option<String>,
    branch_length: Option<f64>,
    height: Option<f64>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    /// Returns the node's label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns the branch length above this node, defaulting to 1.
    #[must_use]
    pub fn branch_length_or_default(&self) -> f64 {
        self.branch_length.unwrap_or(1.0)
    }

    /// Returns the raw branch length, if one was supplied.
    #[must_use]
    pub fn branch_length(&self) -> Option<f64> {
        self.branch_length
    }

    /// Returns the node height, if one was supplied or derived.
    #[must_use]
    pub fn height(&self) -> Option<f64> {
        self.height
    }

    /// Returns the ordered child list (empty for leaves).
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns the parent, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns whether this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted tree over arena-allocated nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// Returns the root node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the node behind `id`.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns node ids in post-order (children before parents).
    #[must_use]
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        // Two-stack iterative post-order keeps deep chains off the call stack.
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend_from_slice(self.node(id).children());
        }
        order.reverse();
        order
    }

    /// Returns the leaves in left-to-right order.
    #[must_use]
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if node.is_leaf() {
                leaves.push(id);
            } else {
                // Push right before left so left-most leaves surface first.
                stack.extend(node.children().iter().rev().copied());
            }
        }
        leaves
    }

    /// Returns each leaf's label, falling back to the stringified node id.
    #[must_use]
    pub fn tip_labels(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .map(|id| match self.node(id).label() {
                Some(label) => label.to_owned(),
                None => id.0.to_string(),
            })
            .collect()
    }

    /// Verifies that every internal node has exactly two children and every
    /// leaf carries a label.
    ///
    /// # Errors
    /// Returns [`ArboraError::MalformedTree`] naming the offending node.
    pub fn validate_binary(&self, tree_index: usize) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            let arity = node.children.len();
            if arity != 0 && arity != 2 {
                return Err(ArboraError::MalformedTree {
                    tree_index,
                    detail: format!("internal node {index} has {arity} children"),
                });
            }
            if arity == 0 && node.label.is_none() {
                return Err(ArboraError::MalformedTree {
                    tree_index,
                    detail: format!("leaf node {index} has no label"),
                });
            }
        }
        Ok(())
    }

    /// Rewrites leaf labels through `rename`; unmapped labels are kept.
    ///
    /// Readers use this to apply Nexus translate tables after parsing.
    pub fn rename_leaves(&mut self, rename: &std::collections::HashMap<String, String>) {
        for id in self.leaves() {
            let node = &mut self.nodes[id.0];
            if let Some(label) = &node.label {
                if let Some(new_label) = rename.get(label) {
                    node.label = Some(new_label.clone());
                }
            }
        }
    }

    /// Derives node heights from branch lengths: leaves sit at height 0 and
    /// an internal node sits at the maximum over children of child height
    /// plus the child's branch length (default 1).
    pub fn assign_heights_from_branch_lengths(&mut self) {
        for id in self.post_order() {
            let node = self.node(id);
            let height = if node.is_leaf() {
                0.0
            } else {
                node.children()
                    .iter()
                    .map(|&child| {
                        let child_node = self.node(child);
                        child_node.height().unwrap_or(0.0) + child_node.branch_length_or_default()
                    })
                    .fold(0.0_f64, f64::max)
            };
            self.nodes[id.0].height = Some(height);
        }
    }
}

/// Incremental constructor for [`Tree`] values.
///
/// # Examples
/// ```
/// use arbora_core::TreeBuilder;
///
/// let mut builder = TreeBuilder::new();
/// let a = builder.leaf("A");
/// let b = builder.leaf("B");
/// let ab = builder.join(a, b);
/// let c = builder.leaf("C");
/// let root = builder.join(ab, c);
/// let tree = builder.finish(root);
/// assert_eq!(tree.tip_labels(), ["A", "B", "C"]);
/// ```
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
}

impl TreeBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a labelled leaf.
    pub fn leaf(&mut self, label: impl Into<String>) -> NodeId {
        self.push(Node {
            label: Some(label.into()),
            branch_length: None,
            height: None,
            children: Vec::new(),
            parent: None,
        })
    }

    /// Adds an unlabelled leaf; [`Tree::tip_labels`] will stringify its id.
    pub fn unlabelled_leaf(&mut self) -> NodeId {
        self.push(Node {
            label: None,
            branch_length: None,
            height: None,
            children: Vec::new(),
            parent: None,
        })
    }

    /// Adds an internal node over exactly two children.
    pub fn join(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.join_children(vec![left, right])
    }

    /// Adds an internal node over an arbitrary child list.
    ///
    /// Parsers use this to represent polytomies faithfully;
    /// [`Tree::validate_binary`] rejects them downstream.
    pub fn join_children(&mut self, children: Vec<NodeId>) -> NodeId {
        let id = self.push(Node {
            label: None,
            branch_length: None,
            height: None,
            children: children.clone(),
            parent: None,
        });
        for child in children {
            self.nodes[child.0].parent = Some(id);
        }
        id
    }

    /// Sets the branch length above `id`.
    pub fn set_branch_length(&mut self, id: NodeId, length: f64) {
        self.nodes[id.0].branch_length = Some(length);
    }

    /// Sets the height of `id`.
    pub fn set_height(&mut self, id: NodeId, height: f64) {
        self.nodes[id.0].height = Some(height);
    }

    /// Sets the label of `id` (internal labels are tolerated and ignored for
    /// clade identity).
    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) {
        self.nodes[id.0].label = Some(label.into());
    }

    /// Finalises the tree with `root` as its root node.
    #[must_use]
    pub fn finish(self, root: NodeId) -> Tree {
        Tree {
            nodes: self.nodes,
            root,
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caterpillar() -> Tree {
        let mut builder = TreeBuilder::new();
        let a = builder.leaf("A");
        let b = builder.leaf("B");
        let ab = builder.join(a, b);
        let c = builder.leaf("C");
        let root = builder.join(ab, c);
        builder.set_branch_length(a, 1.0);
        builder.set_branch_length(b, 2.0);
        builder.set_branch_length(ab, 0.5);
        builder.set_branch_length(c, 3.0);
        builder.finish(root)
    }

    #[test]
    fn post_order_visits_children_first() {
        let tree = caterpillar();
        let order = tree.post_order();
        assert_eq!(order.last(), Some(&tree.root()));
        let position = |id: NodeId| order.iter().position(|&x| x == id).expect("present");
        for id in &order {
            for &child in tree.node(*id).children() {
                assert!(position(child) < position(*id));
            }
        }
    }

    #[test]
    fn tip_labels_fall_back_to_ids() {
        let mut builder = TreeBuilder::new();
        let a = builder.leaf("A");
        let anon = builder.unlabelled_leaf();
        let root = builder.join(a, anon);
        let tree = builder.finish(root);
        assert_eq!(tree.tip_labels(), ["A".to_owned(), "1".to_owned()]);
    }

    #[test]
    fn validate_binary_rejects_polytomy() {
        let mut builder = TreeBuilder::new();
        let a = builder.leaf("A");
        let b = builder.leaf("B");
        let c = builder.leaf("C");
        let root = builder.join_children(vec![a, b, c]);
        let tree = builder.finish(root);
        let err = tree.validate_binary(7).expect_err("polytomies must fail");
        assert!(matches!(err, ArboraError::MalformedTree { tree_index: 7, .. }));
    }

    #[test]
    fn heights_derive_from_branch_lengths() {
        let mut tree = caterpillar();
        tree.assign_heights_from_branch_lengths();
        // Leaves sit at zero; the cherry sits at max(1, 2) = 2; the root at
        // max(2 + 0.5, 3) = 3.
        let root_height = tree.node(tree.root()).height();
        assert_eq!(root_height, Some(3.0));
    }
}
