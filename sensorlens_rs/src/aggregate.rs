//! Sum-of-children recomputation.
//!
//! After filtering, every node with children must hold the field-wise sum of
//! its direct children. Leaves keep their own measurements.

use crate::measurement::SensorValues;
use crate::tree::{DirectoryTree, NodeId};

/// Restore the sum-of-children invariant on the whole forest in one
/// children-first pass.
pub fn recompute(tree: &mut DirectoryTree) {
    let order = tree.preorder();
    for id in order.into_iter().rev() {
        if !tree.is_leaf(id) {
            refresh_from_children(tree, id);
        }
    }
}

/// Walk from `leaf` up to its root, refreshing every ancestor from its own
/// children. Converges to the same state as [`recompute`] once called for
/// every leaf.
pub fn recompute_from(tree: &mut DirectoryTree, leaf: NodeId) {
    let mut current = tree.parent(leaf);
    while let Some(parent) = current {
        refresh_from_children(tree, parent);
        current = tree.parent(parent);
    }
}

fn refresh_from_children(tree: &mut DirectoryTree, id: NodeId) {
    let total = SensorValues::sum(
        tree.children(id)
            .iter()
            .map(|child| &tree.node(*child).values),
    );
    tree.node_mut(id).values = total;
}

/// Nodes whose value differs from the sum of their children.
pub fn violations(tree: &DirectoryTree) -> Vec<NodeId> {
    tree.preorder()
        .into_iter()
        .filter(|id| !tree.is_leaf(*id))
        .filter(|id| {
            let expected = SensorValues::sum(
                tree.children(*id)
                    .iter()
                    .map(|child| &tree.node(*child).values),
            );
            tree.node(*id).values != expected
        })
        .collect()
}
