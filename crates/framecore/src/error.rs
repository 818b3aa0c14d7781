use crate::NodeId;
use thiserror::Error;

/// Errors raised by tree and registry mutation or by tree execution
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Node id {0} is already registered")]
    DuplicateId(NodeId),

    #[error("Unknown node id: {0}")]
    UnknownId(NodeId),

    #[error("Registry is empty")]
    EmptyRegistry,

    #[error("Node {child} is not a child of node {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Tree has no root node")]
    NotInitialized,

    #[error("Plugin of node {node_id} failed: {source}")]
    PluginExecution {
        node_id: NodeId,
        #[source]
        source: PluginError,
    },
}

/// Errors raised by a plugin's `execute`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Panicked: {0}")]
    Panicked(String),
}

impl PluginError {
    /// Name of the error class, used when a fault crosses a thread boundary
    pub fn kind(&self) -> &'static str {
        match self {
            PluginError::MissingInput(_) => "missing_input",
            PluginError::InvalidInputType { .. } => "invalid_input_type",
            PluginError::Configuration(_) => "configuration",
            PluginError::ExecutionFailed(_) => "execution_failed",
            PluginError::Panicked(_) => "panicked",
        }
    }
}
