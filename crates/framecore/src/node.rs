use crate::TreeError;
use std::collections::HashMap;

pub type NodeId = usize;

/// Storage shared by the structural operations below. Nodes refer to each
/// other by id; the map owns every node, `parent` is only a back reference.
pub(crate) type Arena<P> = HashMap<NodeId, TreeNode<P>>;

/// A node of an n-ary tree carrying an arbitrary payload
#[derive(Debug, Clone)]
pub struct TreeNode<P> {
    pub(crate) node_id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) payload: P,
}

impl<P> TreeNode<P> {
    /// Detached node; the id is assigned when it is registered
    pub fn new(payload: P) -> Self {
        Self {
            node_id: 0,
            parent: None,
            children: Vec::new(),
            payload,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in fan-out order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

fn require<P>(arena: &Arena<P>, id: NodeId) -> Result<&TreeNode<P>, TreeError> {
    arena.get(&id).ok_or(TreeError::UnknownId(id))
}

/// Make `child` the last child of `parent`.
///
/// A child that already hangs somewhere else is detached first so it never
/// has two parents.
pub(crate) fn add_child<P>(
    arena: &mut Arena<P>,
    parent: NodeId,
    child: NodeId,
) -> Result<(), TreeError> {
    require(arena, parent)?;
    let previous = require(arena, child)?.parent;
    if parent == child {
        return Err(TreeError::Structural(format!(
            "node {} cannot be its own child",
            child
        )));
    }

    if let Some(previous) = previous {
        if let Some(node) = arena.get_mut(&previous) {
            node.children.retain(|c| *c != child);
        }
    }
    if let Some(node) = arena.get_mut(&child) {
        node.parent = Some(parent);
    }
    if let Some(node) = arena.get_mut(&parent) {
        node.children.push(child);
    }
    Ok(())
}

/// Remove the `parent -> child` edge, keeping sibling order
pub(crate) fn remove_child_reference<P>(
    arena: &mut Arena<P>,
    parent: NodeId,
    child: NodeId,
) -> Result<(), TreeError> {
    let parent_node = arena.get_mut(&parent).ok_or(TreeError::UnknownId(parent))?;
    let position = parent_node
        .children
        .iter()
        .position(|c| *c == child)
        .ok_or(TreeError::NotAChild { parent, child })?;
    parent_node.children.remove(position);

    if let Some(node) = arena.get_mut(&child) {
        if node.parent == Some(parent) {
            node.parent = None;
        }
    }
    Ok(())
}

/// Detach a node and, recursively, all of its descendants.
///
/// Children are handled before their parent. Non-recursive deletion of a
/// node that still has children is refused without touching anything.
pub(crate) fn delete_node<P>(
    arena: &mut Arena<P>,
    id: NodeId,
    recursive: bool,
) -> Result<(), TreeError> {
    let node = require(arena, id)?;
    if !node.children.is_empty() && !recursive {
        return Err(TreeError::Structural(format!(
            "node {} has {} children, non-recursive deletion requested",
            id,
            node.children.len()
        )));
    }

    // Reversed pre-order visits every descendant before its ancestors
    for current in subtree_ids(arena, id)?.into_iter().rev() {
        if let Some(parent) = arena.get(&current).and_then(|n| n.parent) {
            remove_child_reference(arena, parent, current)?;
        }
        if let Some(node) = arena.get_mut(&current) {
            node.children.clear();
            node.parent = None;
        }
    }
    Ok(())
}

/// Ids of the subtree rooted at `id`: the node itself, then each child's
/// subtree in child order
pub(crate) fn subtree_ids<P>(arena: &Arena<P>, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
    let mut ids = Vec::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        let node = require(arena, current)?;
        ids.push(current);
        stack.extend(node.children.iter().rev().copied());
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(ids: &[NodeId]) -> Arena<()> {
        ids.iter()
            .map(|id| {
                let mut node = TreeNode::new(());
                node.node_id = *id;
                (*id, node)
            })
            .collect()
    }

    #[test]
    fn test_add_child_moves_between_parents() {
        let mut nodes = arena(&[0, 1, 2]);
        add_child(&mut nodes, 0, 2).unwrap();
        add_child(&mut nodes, 1, 2).unwrap();

        assert!(nodes[&0].is_leaf());
        assert_eq!(nodes[&1].children(), &[2]);
        assert_eq!(nodes[&2].parent(), Some(1));
    }

    #[test]
    fn test_remove_child_reference_preserves_order() {
        let mut nodes = arena(&[0, 1, 2, 3]);
        for child in [1, 2, 3] {
            add_child(&mut nodes, 0, child).unwrap();
        }

        remove_child_reference(&mut nodes, 0, 2).unwrap();
        assert_eq!(nodes[&0].children(), &[1, 3]);
        assert_eq!(nodes[&2].parent(), None);

        let err = remove_child_reference(&mut nodes, 0, 2).unwrap_err();
        assert_eq!(err, TreeError::NotAChild { parent: 0, child: 2 });
    }

    #[test]
    fn test_delete_lone_node_is_noop() {
        let mut nodes = arena(&[7]);
        delete_node(&mut nodes, 7, false).unwrap();
        assert!(nodes[&7].is_leaf());
        assert_eq!(nodes[&7].parent(), None);
    }

    #[test]
    fn test_subtree_ids_pre_order() {
        let mut nodes = arena(&[0, 1, 2, 3, 4]);
        add_child(&mut nodes, 0, 1).unwrap();
        add_child(&mut nodes, 1, 2).unwrap();
        add_child(&mut nodes, 1, 3).unwrap();
        add_child(&mut nodes, 0, 4).unwrap();

        assert_eq!(subtree_ids(&nodes, 0).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(subtree_ids(&nodes, 1).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_delete_deep_chain_post_order() {
        let ids: Vec<NodeId> = (0..20_000).collect();
        let mut nodes = arena(&ids);
        for pair in ids.windows(2) {
            add_child(&mut nodes, pair[0], pair[1]).unwrap();
        }

        delete_node(&mut nodes, 1, true).unwrap();

        assert!(nodes.values().all(|n| n.is_leaf() && n.parent().is_none()));
    }
}
