use crate::{Kwargs, PluginError, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Core trait that every unit of computation attached to a tree node implements
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique type identifier (e.g., "math.offset", "debug.log")
    fn plugin_type(&self) -> &str;

    /// Process one input and return the value handed to every child
    async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError>;

    /// Enumerable metadata used by `WorkflowTree::find_nodes_by_plugin_key`.
    ///
    /// `"plugin_type"` is answered by default; implementations add their own
    /// keys and should fall back to this default for unknown ones.
    fn get_property(&self, key: &str) -> Option<Value> {
        match key {
            "plugin_type" => Some(Value::from(self.plugin_type())),
            _ => None,
        }
    }
}

/// Output of a plugin invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginOutput {
    pub result: Value,
    pub kwargs: Kwargs,
}

impl PluginOutput {
    pub fn new(result: impl Into<Value>) -> Self {
        Self {
            result: result.into(),
            kwargs: Kwargs::new(),
        }
    }

    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}
