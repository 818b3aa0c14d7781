use framecore::{Kwargs, NodeId, PluginError, PluginOutput, TreeError, Value, WorkflowTree};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Work function run by every dispatcher of a pool
pub type WorkFn<T, R> = Arc<dyn Fn(T, &WorkArgs) -> Result<R, PluginError> + Send + Sync>;

/// Side arguments forwarded verbatim with every token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkArgs {
    pub args: Vec<Value>,
    pub kwargs: Kwargs,
}

impl WorkArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Kwargs handed to a tree for one frame: the fixed kwargs, the frame
    /// index under `"frame"` and positional args under `"args"`
    fn tree_kwargs(&self, frame: usize) -> Kwargs {
        let mut kwargs = self.kwargs.clone();
        kwargs.insert("frame".to_string(), Value::from(frame));
        if !self.args.is_empty() {
            kwargs.insert("args".to_string(), Value::Array(self.args.clone()));
        }
        kwargs
    }
}

/// Composite work item: one root-to-leaf chain applied to one frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainFrame {
    pub chain: Vec<NodeId>,
    pub frame: usize,
}

/// Pre-expand a tree and a frame range into `(chain, frame)` work items,
/// frame-major
pub fn expand_chains(
    tree: &WorkflowTree,
    frames: impl IntoIterator<Item = usize>,
) -> Vec<ChainFrame> {
    let chains = tree.chains();
    frames
        .into_iter()
        .flat_map(|frame| {
            chains.iter().map(move |chain| ChainFrame {
                chain: chain.clone(),
                frame,
            })
        })
        .collect()
}

fn into_plugin_error(error: TreeError) -> PluginError {
    match error {
        TreeError::PluginExecution { source, .. } => source,
        other => PluginError::ExecutionFailed(other.to_string()),
    }
}

/// Work function running one chain of `tree` per item; the frame index is
/// the chain's input value
pub fn chain_work_fn(tree: Arc<WorkflowTree>) -> WorkFn<ChainFrame, PluginOutput> {
    Arc::new(move |item: ChainFrame, args: &WorkArgs| {
        let kwargs = args.tree_kwargs(item.frame);
        let input = Value::from(item.frame);
        futures::executor::block_on(tree.execute_chain(&item.chain, input, kwargs))
            .map_err(into_plugin_error)
    })
}

/// Work function running the whole tree once per frame. Results stay with
/// the plugins, so each item yields `()`.
pub fn process_work_fn(tree: Arc<WorkflowTree>) -> WorkFn<usize, ()> {
    Arc::new(move |frame: usize, args: &WorkArgs| {
        let kwargs = args.tree_kwargs(frame);
        futures::executor::block_on(tree.execute_process(Value::from(frame), kwargs))
            .map_err(into_plugin_error)
    })
}
