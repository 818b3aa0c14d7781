use crate::WorkerId;
use framecore::{PluginError, TreeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Workers {workers:?} neither produced output nor finished within {grace_ms}ms")]
    StalledWorker { workers: Vec<WorkerId>, grace_ms: u64 },

    #[error("Workers {0:?} died without reporting")]
    WorkerPanicked(Vec<WorkerId>),

    #[error("Channel '{0}' closed unexpectedly")]
    ChannelClosed(&'static str),

    #[error("Input is closed, no more work can be submitted")]
    InputClosed,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a dispatcher ended up in the Faulted state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerFault {
    #[error("work function failed: {0}")]
    Callable(#[from] PluginError),

    #[error("channel '{0}' closed")]
    ChannelClosed(&'static str),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unknown plugin type: {0}")]
    UnknownPluginType(String),

    #[error("Plugin '{plugin_type}' is missing required parameters {parameters:?}")]
    MissingParameters {
        plugin_type: String,
        parameters: Vec<String>,
    },

    #[error("Plugin '{plugin_type}' does not accept parameters {parameters:?}")]
    UnknownParameters {
        plugin_type: String,
        parameters: Vec<String>,
    },

    #[error("Failed to create plugin '{plugin_type}': {source}")]
    Creation {
        plugin_type: String,
        #[source]
        source: PluginError,
    },
}
