//! Depth-first iteration over tree nodes.

use crate::container::{ElementTree, NodeId, NodeRef};

/// Lazy pre-order walk. Each call to `flatten` starts a fresh walk.
pub struct Flatten<'a> {
    tree: &'a ElementTree,
    stack: Vec<NodeId>,
}

impl<'a> Flatten<'a> {
    pub(crate) fn new(tree: &'a ElementTree, starts: &[NodeId]) -> Self {
        Self {
            tree,
            stack: starts.iter().rev().copied().collect(),
        }
    }
}

impl<'a> Iterator for Flatten<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let Some(node) = self.tree.node(id) else {
                continue;
            };
            let mark = self.stack.len();
            self.stack.extend(node.children().map(|c| c.id()));
            self.stack[mark..].reverse();
            return Some(node);
        }
        None
    }
}
