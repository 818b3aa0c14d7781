use crate::node::{self, Arena, NodeId, TreeNode};
use crate::TreeError;
use std::collections::HashSet;

/// Identity allocator and lookup table for the nodes of one tree.
///
/// Each tree owns its own registry; nothing is shared between trees.
#[derive(Debug)]
pub struct NodeRegistry<P> {
    nodes: Arena<P>,
    node_ids: Vec<NodeId>,
    next_id: NodeId,
}

impl<P> NodeRegistry<P> {
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
            node_ids: Vec::new(),
            next_id: 0,
        }
    }

    /// Next id that `register` would hand out.
    ///
    /// Ids are not recycled: deleting nodes does not lower the watermark,
    /// only `clear` resets it.
    pub fn get_new_id(&self) -> NodeId {
        self.next_id
    }

    /// Register a node, either under `explicit_id` or a freshly allocated id
    pub fn register(
        &mut self,
        mut node: TreeNode<P>,
        explicit_id: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        let id = match explicit_id {
            Some(id) if self.nodes.contains_key(&id) => {
                return Err(TreeError::DuplicateId(id));
            }
            Some(id) => id,
            None => self.get_new_id(),
        };

        let watermark = id
            .checked_add(1)
            .ok_or_else(|| TreeError::Structural(format!("node id {} is out of range", id)))?;
        node.node_id = id;
        self.next_id = self.next_id.max(watermark);
        self.node_ids.push(id);
        self.nodes.insert(id, node);
        tracing::debug!("Registered node {}", id);
        Ok(id)
    }

    /// Factory shorthand: wrap `payload` in a node and register it
    pub fn create(&mut self, payload: P, explicit_id: Option<NodeId>) -> Result<NodeId, TreeError> {
        self.register(TreeNode::new(payload), explicit_id)
    }

    pub fn find_by_id(&self, id: NodeId) -> Result<&TreeNode<P>, TreeError> {
        if self.nodes.is_empty() {
            return Err(TreeError::EmptyRegistry);
        }
        self.nodes.get(&id).ok_or(TreeError::UnknownId(id))
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode<P>> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode<P>> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Registered ids in insertion order
    pub fn ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode<P>> {
        self.node_ids.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        node::add_child(&mut self.nodes, parent, child)
    }

    pub fn remove_child_reference(
        &mut self,
        parent: NodeId,
        child: NodeId,
    ) -> Result<(), TreeError> {
        node::remove_child_reference(&mut self.nodes, parent, child)
    }

    pub fn is_leaf(&self, id: NodeId) -> Result<bool, TreeError> {
        Ok(self.find_by_id(id)?.is_leaf())
    }

    /// Structural deletion only: the subtree is detached but its ids stay
    /// registered. Use `delete` to drop the bookkeeping as well.
    pub fn delete_node(&mut self, id: NodeId, recursive: bool) -> Result<(), TreeError> {
        node::delete_node(&mut self.nodes, id, recursive)
    }

    pub fn subtree_ids(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        node::subtree_ids(&self.nodes, id)
    }

    /// Delete the subtree rooted at `id` and unregister all of its ids.
    ///
    /// Returns the removed ids in pre-order. Nothing is unregistered when
    /// the structural deletion is refused.
    pub fn delete(&mut self, id: NodeId, recursive: bool) -> Result<Vec<NodeId>, TreeError> {
        if !self.nodes.contains_key(&id) {
            return Err(TreeError::UnknownId(id));
        }

        let removed = self.subtree_ids(id)?;
        self.delete_node(id, recursive)?;

        for removed_id in &removed {
            self.nodes.remove(removed_id);
        }
        let gone: HashSet<NodeId> = removed.iter().copied().collect();
        self.node_ids.retain(|existing| !gone.contains(existing));
        tracing::debug!("Deleted {} nodes under {}", removed.len(), id);
        Ok(removed)
    }

    /// Drop every node and reset id allocation
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.node_ids.clear();
        self.next_id = 0;
    }
}

impl<P> Default for NodeRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
