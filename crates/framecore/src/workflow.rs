use crate::events::{EventBus, ExecutionId, TreeEvent};
use crate::{Kwargs, NodeId, NodeRegistry, Plugin, PluginOutput, TreeError, TreeNode, Value};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Id given to the root node unless the caller picks one
pub const ROOT_ID: NodeId = 0;

/// Payload of a workflow tree node: a display name and the plugin it runs
#[derive(Clone)]
pub struct WorkflowNode {
    pub name: String,
    pub plugin: Arc<dyn Plugin>,
}

impl std::fmt::Debug for WorkflowNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowNode")
            .field("name", &self.name)
            .field("plugin_type", &self.plugin.plugin_type())
            .finish()
    }
}

/// Lifecycle of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeState {
    Empty,
    Rooted,
    Populated,
}

/// Tree of plugins executed depth-first with fan-out to every child
#[derive(Debug, Default)]
pub struct WorkflowTree {
    registry: NodeRegistry<WorkflowNode>,
    root: Option<NodeId>,
    last_added: Option<NodeId>,
    events: Option<EventBus>,
}

impl WorkflowTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit execution events on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn state(&self) -> TreeState {
        match self.root {
            None => TreeState::Empty,
            Some(_) if self.registry.len() == 1 => TreeState::Rooted,
            Some(_) => TreeState::Populated,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Node the next parentless `add_node` will attach to
    pub fn last_added(&self) -> Option<NodeId> {
        self.last_added
    }

    pub fn registry(&self) -> &NodeRegistry<WorkflowNode> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&TreeNode<WorkflowNode>, TreeError> {
        self.registry.find_by_id(id)
    }

    pub fn plugin(&self, id: NodeId) -> Result<Arc<dyn Plugin>, TreeError> {
        Ok(Arc::clone(&self.node(id)?.payload().plugin))
    }

    /// Create the root node. Only valid on an empty tree.
    pub fn set_root(
        &mut self,
        name: impl Into<String>,
        plugin: Arc<dyn Plugin>,
    ) -> Result<NodeId, TreeError> {
        self.install_root(name.into(), plugin, ROOT_ID)
    }

    fn install_root(
        &mut self,
        name: String,
        plugin: Arc<dyn Plugin>,
        id: NodeId,
    ) -> Result<NodeId, TreeError> {
        if let Some(root) = self.root {
            return Err(TreeError::Structural(format!(
                "tree already has root node {}",
                root
            )));
        }

        tracing::debug!("Setting root node '{}' ({})", name, plugin.plugin_type());
        let id = self.registry.create(WorkflowNode { name, plugin }, Some(id))?;
        self.root = Some(id);
        self.last_added = Some(id);
        Ok(id)
    }

    /// Add a node to the tree.
    ///
    /// On an empty tree the node becomes the root. Otherwise it is attached
    /// to `parent` or, when no parent is given, to the most recently added
    /// node, not the root. Repeated parentless calls therefore build a
    /// single chain; pass `parent` explicitly to branch.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        plugin: Arc<dyn Plugin>,
        parent: Option<NodeId>,
        node_id: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        let name = name.into();
        if self.root.is_none() {
            return self.install_root(name, plugin, node_id.unwrap_or(ROOT_ID));
        }

        let parent = parent
            .or(self.last_added)
            .or(self.root)
            .ok_or(TreeError::NotInitialized)?;
        if !self.registry.contains(parent) {
            return Err(TreeError::UnknownId(parent));
        }

        tracing::debug!(
            "Adding node '{}' ({}) under {}",
            name,
            plugin.plugin_type(),
            parent
        );
        let id = self.registry.create(WorkflowNode { name, plugin }, node_id)?;
        if let Err(e) = self.registry.add_child(parent, id) {
            let _ = self.registry.delete(id, true);
            return Err(e);
        }
        self.last_added = Some(id);
        Ok(id)
    }

    /// Delete a node and unregister its ids, returning them in pre-order
    pub fn delete_node(&mut self, id: NodeId, recursive: bool) -> Result<Vec<NodeId>, TreeError> {
        let parent = self.registry.find_by_id(id)?.parent();
        let removed = self.registry.delete(id, recursive)?;

        if self.root.is_some_and(|root| removed.contains(&root)) {
            self.root = None;
            self.last_added = None;
        } else if self.last_added.is_some_and(|last| removed.contains(&last)) {
            self.last_added = parent.or(self.root);
        }
        Ok(removed)
    }

    /// Back to the empty state
    pub fn clear(&mut self) {
        self.registry.clear();
        self.root = None;
        self.last_added = None;
    }

    /// Ids of nodes whose plugin reports `key` with a value equal to `value`,
    /// in insertion order
    pub fn find_nodes_by_plugin_key(&self, key: &str, value: &Value) -> Vec<NodeId> {
        self.registry
            .iter()
            .filter(|node| node.payload().plugin.get_property(key).as_ref() == Some(value))
            .map(|node| node.node_id())
            .collect()
    }

    /// Every root-to-leaf path, depth-first in child order
    pub fn chains(&self) -> Vec<Vec<NodeId>> {
        let mut chains = Vec::new();
        let Some(root) = self.root else {
            return chains;
        };

        let mut stack = vec![vec![root]];
        while let Some(path) = stack.pop() {
            let Some(node) = path.last().and_then(|id| self.registry.get(*id)) else {
                continue;
            };
            if node.is_leaf() {
                chains.push(path);
                continue;
            }
            for child in node.children().iter().rev() {
                let mut next = path.clone();
                next.push(*child);
                stack.push(next);
            }
        }
        chains
    }

    /// Run the whole tree once.
    ///
    /// The root gets `input`; every node hands its own copy of its output
    /// to each child in order. Nothing is returned: plugins keep whatever
    /// they produce. The first plugin error stops the traversal.
    pub async fn execute_process(&self, input: Value, kwargs: Kwargs) -> Result<(), TreeError> {
        let root = self.root.ok_or(TreeError::NotInitialized)?;
        let execution_id = Uuid::new_v4();
        let start = Instant::now();

        tracing::info!("Starting tree execution {} from node {}", execution_id, root);
        self.emit(TreeEvent::ExecutionStarted {
            execution_id,
            root_id: root,
            timestamp: Utc::now(),
        });

        let result = self.visit(execution_id, root, input, kwargs).await;
        self.finish(execution_id, start, result.is_ok());
        result
    }

    /// Depth-first walk over an explicit stack of pending `(node, input)`
    async fn visit(
        &self,
        execution_id: ExecutionId,
        root: NodeId,
        input: Value,
        kwargs: Kwargs,
    ) -> Result<(), TreeError> {
        let mut pending = vec![(root, input, kwargs)];
        while let Some((id, data, kwargs)) = pending.pop() {
            let output = self.run_node(execution_id, id, data, kwargs).await?;
            // Reversed so the first child is popped first
            for child in self.node(id)?.children().iter().rev() {
                pending.push((*child, output.result.clone(), output.kwargs.clone()));
            }
        }
        Ok(())
    }

    /// Run the plugins along one root-to-leaf path and return the last output
    pub async fn execute_chain(
        &self,
        chain: &[NodeId],
        input: Value,
        kwargs: Kwargs,
    ) -> Result<PluginOutput, TreeError> {
        let (first, rest) = chain
            .split_first()
            .ok_or_else(|| TreeError::Structural("empty chain".to_string()))?;
        let mut previous = *first;
        for id in rest {
            if !self.node(previous)?.children().contains(id) {
                return Err(TreeError::NotAChild {
                    parent: previous,
                    child: *id,
                });
            }
            previous = *id;
        }

        let execution_id = Uuid::new_v4();
        let start = Instant::now();
        self.emit(TreeEvent::ExecutionStarted {
            execution_id,
            root_id: *first,
            timestamp: Utc::now(),
        });

        let mut output = PluginOutput {
            result: input,
            kwargs,
        };
        for id in chain {
            match self.run_node(execution_id, *id, output.result, output.kwargs).await {
                Ok(next) => output = next,
                Err(e) => {
                    self.finish(execution_id, start, false);
                    return Err(e);
                }
            }
        }
        self.finish(execution_id, start, true);
        Ok(output)
    }

    async fn run_node(
        &self,
        execution_id: ExecutionId,
        id: NodeId,
        data: Value,
        kwargs: Kwargs,
    ) -> Result<PluginOutput, TreeError> {
        let plugin = self.plugin(id)?;
        let plugin_type = plugin.plugin_type().to_string();
        self.emit(TreeEvent::NodeStarted {
            execution_id,
            node_id: id,
            plugin_type,
            timestamp: Utc::now(),
        });

        let start = Instant::now();
        match plugin.execute(data, kwargs).await {
            Ok(output) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                tracing::debug!("Node {} completed in {}ms", id, duration_ms);
                self.emit(TreeEvent::NodeCompleted {
                    execution_id,
                    node_id: id,
                    duration_ms,
                    timestamp: Utc::now(),
                });
                Ok(output)
            }
            Err(e) => {
                tracing::error!("Node {} failed: {}", id, e);
                self.emit(TreeEvent::NodeFailed {
                    execution_id,
                    node_id: id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(TreeError::PluginExecution {
                    node_id: id,
                    source: e,
                })
            }
        }
    }

    fn finish(&self, execution_id: ExecutionId, start: Instant, success: bool) {
        self.emit(TreeEvent::ExecutionCompleted {
            execution_id,
            success,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: TreeEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }

    /// Serializable snapshot of the tree's shape
    pub fn summary(&self) -> TreeSummary {
        TreeSummary {
            root: self.root,
            nodes: self
                .registry
                .iter()
                .map(|node| NodeSummary {
                    id: node.node_id(),
                    name: node.payload().name.clone(),
                    plugin_type: node.payload().plugin.plugin_type().to_string(),
                    parent: node.parent(),
                    children: node.children().to_vec(),
                })
                .collect(),
        }
    }
}

/// Shape of a tree, for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSummary {
    pub root: Option<NodeId>,
    pub nodes: Vec<NodeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub name: String,
    pub plugin_type: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}
