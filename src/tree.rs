//! An ordered n-ary tree stored in an arena, shared by the CST and the AST.
//!
//! Nodes own their children through the arena; the parent index is kept for
//! navigation only.

use crate::token::Pos;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// May still gain children while the tree is being built.
    Branch,
    Leaf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node<L> {
    pub label: L,
    pub kind: NodeKind,
    pub pos: Option<Pos>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tree<L> {
    nodes: Vec<Node<L>>,
}

impl<L> Tree<L> {
    /// Returns the root, or `None` if the tree is empty.
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId::ROOT)
    }

    pub fn get(&self, id: NodeId) -> &Node<L> {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<L> {
        &mut self.nodes[id.index()]
    }

    pub fn label(&self, id: NodeId) -> &L {
        &self.get(id).label
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.get(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Distance from the root.
    pub fn depth(&self, id: NodeId) -> usize {
        std::iter::successors(self.parent(id), |p| self.parent(*p)).count()
    }

    /// Visits every node in pre-order along with its depth.
    pub fn walk(&self, mut visit: impl FnMut(NodeId, usize)) {
        let Some(root) = self.root() else {
            return;
        };
        let mut stack = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            visit(id, depth);
            for child in self.children(id).iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
    }
}

/// Streaming construction: `add_node` appends under the cursor and, for
/// branches, descends into the new node; `close_children` climbs back.
#[derive(Debug)]
pub struct TreeBuilder<L> {
    tree: Tree<L>,
    open: Vec<NodeId>,
}

impl<L> Default for TreeBuilder<L> {
    fn default() -> Self {
        TreeBuilder {
            tree: Tree { nodes: Vec::new() },
            open: Vec::new(),
        }
    }
}

impl<L> TreeBuilder<L> {
    pub fn new() -> TreeBuilder<L> {
        TreeBuilder::default()
    }

    pub fn add_node(&mut self, label: L, kind: NodeKind, pos: Option<Pos>) -> NodeId {
        let id = NodeId(u32::try_from(self.tree.nodes.len()).unwrap_or(u32::MAX));
        let parent = self.current();
        self.tree.nodes.push(Node {
            label,
            kind,
            pos,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.tree.get_mut(parent).children.push(id);
        }
        if kind == NodeKind::Branch {
            self.open.push(id);
        }
        id
    }

    pub fn add_branch(&mut self, label: L, pos: Option<Pos>) -> NodeId {
        self.add_node(label, NodeKind::Branch, pos)
    }

    pub fn add_leaf(&mut self, label: L, pos: Option<Pos>) -> NodeId {
        self.add_node(label, NodeKind::Leaf, pos)
    }

    /// Moves the cursor back to the parent of the current node.
    pub fn close_children(&mut self) {
        self.open.pop();
    }

    pub fn current(&self) -> Option<NodeId> {
        self.open.last().copied()
    }

    /// The tree built so far; open branches are simply left as they are.
    pub fn finish(self) -> Tree<L> {
        self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Tree<&'static str> {
        let mut b = TreeBuilder::new();
        b.add_branch("root", None);
        b.add_branch("a", Some(Pos::new(1, 0)));
        b.add_leaf("a1", None);
        b.add_leaf("a2", None);
        b.close_children();
        b.add_leaf("b", None);
        b.close_children();
        b.finish()
    }

    #[test]
    fn builds_with_cursor() {
        let tree = sample();
        let root = tree.root().map(|r| *tree.label(r));
        assert_eq!(root, Some("root"));
        let labels: Vec<_> = tree
            .children(NodeId::ROOT)
            .iter()
            .map(|c| *tree.label(*c))
            .collect();
        assert_eq!(labels, ["a", "b"]);
        let a = tree.children(NodeId::ROOT)[0];
        assert_eq!(tree.children(a).len(), 2);
        assert_eq!(tree.parent(tree.children(a)[1]), Some(a));
        assert_eq!(tree.depth(tree.children(a)[0]), 2);
    }

    #[test]
    fn walk_is_preorder() {
        let tree = sample();
        let mut seen = Vec::new();
        tree.walk(|id, depth| seen.push((*tree.label(id), depth)));
        assert_eq!(
            seen,
            [("root", 0), ("a", 1), ("a1", 2), ("a2", 2), ("b", 1)]
        );
    }

    #[test]
    fn leaves_do_not_move_cursor() {
        let mut b = TreeBuilder::new();
        let root = b.add_branch(0, None);
        b.add_leaf(1, None);
        assert_eq!(b.current(), Some(root));
        b.close_children();
        assert_eq!(b.current(), None);
    }
}
