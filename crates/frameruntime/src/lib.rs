//! Frame processing runtime
//!
//! This crate provides the multi-worker execution engine: the dispatcher
//! loop each worker runs, the pool controller that owns the channels and
//! the termination protocol, the plugin catalog, and the runtime that ties
//! trees and pools together.

mod catalog;
mod config;
mod dispatcher;
mod error;
mod pool;
mod runtime;
mod work;

pub use catalog::{ParameterDefinition, PluginCatalog, PluginFactory, PluginMetadata};
pub use config::PoolConfig;
pub use dispatcher::{
    Dispatcher, DispatcherChannels, Envelope, WorkToken, WorkerId, WorkerReport, WorkerStatus,
};
pub use error::{CatalogError, PoolError, RuntimeError, WorkerFault};
pub use pool::{PoolHandle, WorkerPool};
pub use runtime::{BatchReport, FrameRuntime, StageSpec};
pub use work::{chain_work_fn, expand_chains, process_work_fn, ChainFrame, WorkArgs, WorkFn};
