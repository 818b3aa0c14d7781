use crate::work::{chain_work_fn, expand_chains, process_work_fn, ChainFrame};
use crate::{PluginCatalog, PoolConfig, PoolError, RuntimeError, WorkArgs, WorkerPool, WorkerReport};
use framecore::{EventBus, NodeId, PluginOutput, TreeEvent, Value, WorkflowTree};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One stage of a tree to be built from the catalog
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub name: String,
    pub plugin_type: String,
    pub config: HashMap<String, Value>,
    /// `None` attaches to the previously added stage
    pub parent: Option<NodeId>,
}

impl StageSpec {
    pub fn new(plugin_type: impl Into<String>) -> Self {
        let plugin_type = plugin_type.into();
        Self {
            name: plugin_type.clone(),
            plugin_type,
            config: HashMap::new(),
            parent: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Outcome of a pooled batch
#[derive(Debug)]
pub struct BatchReport<T, R> {
    pub run_id: Uuid,
    pub submitted: usize,
    pub sentinel_acks: usize,
    pub results: Vec<(T, R)>,
    pub workers: Vec<WorkerReport>,
}

impl<T, R> BatchReport<T, R> {
    pub fn faulted_workers(&self) -> usize {
        self.workers.iter().filter(|r| r.status.is_faulted()).count()
    }
}

/// Main runtime: plugin catalog, pool configuration and event bus
pub struct FrameRuntime {
    catalog: Arc<PluginCatalog>,
    config: PoolConfig,
    event_bus: EventBus,
}

impl FrameRuntime {
    /// Create a new runtime with an empty catalog and default settings
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self::with_catalog(Arc::new(PluginCatalog::new()), config)
    }

    /// Create a new runtime with a pre-populated catalog
    pub fn with_catalog(catalog: Arc<PluginCatalog>, config: PoolConfig) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size.max(1));
        Self {
            catalog,
            config,
            event_bus,
        }
    }

    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<TreeEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Build a tree from stage specs; the first stage becomes the root
    pub fn build_tree(&self, stages: &[StageSpec]) -> Result<WorkflowTree, RuntimeError> {
        let mut tree = WorkflowTree::new().with_events(self.event_bus.clone());
        for stage in stages {
            let plugin = self.catalog.create_plugin(&stage.plugin_type, &stage.config)?;
            tree.add_node(stage.name.clone(), plugin, stage.parent, None)?;
        }
        tracing::info!("Built tree with {} nodes", tree.len());
        Ok(tree)
    }

    /// Run every root-to-leaf chain of `tree` over `frames` on the pool
    pub fn run_chains(
        &self,
        tree: Arc<WorkflowTree>,
        frames: impl IntoIterator<Item = usize>,
        args: WorkArgs,
        cancel: &CancellationToken,
    ) -> Result<BatchReport<ChainFrame, PluginOutput>, PoolError> {
        let items = expand_chains(&tree, frames);
        let work = chain_work_fn(tree);
        self.run_batch(work, items, args, cancel)
    }

    /// Run the whole tree once per frame on the pool
    pub fn run_frames(
        &self,
        tree: Arc<WorkflowTree>,
        frames: impl IntoIterator<Item = usize>,
        args: WorkArgs,
        cancel: &CancellationToken,
    ) -> Result<BatchReport<usize, ()>, PoolError> {
        let work = process_work_fn(tree);
        self.run_batch(work, frames.into_iter().collect(), args, cancel)
    }

    fn run_batch<T, R>(
        &self,
        work: crate::WorkFn<T, R>,
        items: Vec<T>,
        args: WorkArgs,
        cancel: &CancellationToken,
    ) -> Result<BatchReport<T, R>, PoolError>
    where
        T: Clone + std::fmt::Debug + Send + 'static,
        R: Send + 'static,
    {
        let mut pool = WorkerPool::start_shared(work, args, self.config.clone())?;
        let run_id = pool.run_id();
        pool.submit_all(items)?;
        pool.close_input()?;

        let results = pool.drain_with_cancel(cancel)?;
        let submitted = pool.submitted();
        let sentinel_acks = pool.sentinel_acks();
        let workers = pool.join()?;

        Ok(BatchReport {
            run_id,
            submitted,
            sentinel_acks,
            results,
            workers,
        })
    }
}

impl Default for FrameRuntime {
    fn default() -> Self {
        Self::new()
    }
}
