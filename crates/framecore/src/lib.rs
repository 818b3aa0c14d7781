//! Core abstractions for the frame processing engine
//!
//! This crate provides the plugin trait, the generic node tree with its
//! id registry, and the workflow tree that chains plugins together. It has
//! no knowledge of worker pools.

mod error;
pub mod events;
mod node;
mod plugin;
mod registry;
mod value;
mod workflow;

pub use error::{PluginError, TreeError};
pub use events::{EventBus, ExecutionId, TreeEvent};
pub use node::{NodeId, TreeNode};
pub use plugin::{Plugin, PluginOutput};
pub use registry::NodeRegistry;
pub use value::{Kwargs, Value};
pub use workflow::{NodeSummary, TreeState, TreeSummary, WorkflowNode, WorkflowTree, ROOT_ID};

/// Result type for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;
