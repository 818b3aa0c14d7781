use crate::optional_number;
use async_trait::async_trait;
use framecore::{Kwargs, Plugin, PluginError, PluginOutput, Value};
use frameruntime::{ParameterDefinition, PluginFactory, PluginMetadata};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Simulates an expensive stage by holding each item for a fixed time.
///
/// The wait blocks the calling thread: pool workers drive trees with a
/// plain executor, so there is no timer driver to yield to.
pub struct DelayPlugin {
    delay: Duration,
}

#[async_trait]
impl Plugin for DelayPlugin {
    fn plugin_type(&self) -> &str {
        "time.delay"
    }

    async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError> {
        std::thread::sleep(self.delay);
        Ok(PluginOutput::new(data).with_kwargs(kwargs))
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        match key {
            "delay_ms" => Some(Value::Number(self.delay.as_millis() as f64)),
            "plugin_type" => Some(Value::from(self.plugin_type())),
            _ => None,
        }
    }
}

pub struct DelayPluginFactory;

impl PluginFactory for DelayPluginFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
        let delay_ms = optional_number(config, "delay_ms")?.unwrap_or(10.0);
        if delay_ms < 0.0 {
            return Err(PluginError::Configuration(
                "delay_ms must not be negative".to_string(),
            ));
        }
        Ok(Arc::new(DelayPlugin {
            delay: Duration::from_millis(delay_ms as u64),
        }))
    }

    fn plugin_type(&self) -> &str {
        "time.delay"
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            description: "Hold each item for the specified milliseconds".to_string(),
            category: "time".to_string(),
            parameters: vec![ParameterDefinition::new("delay_ms", "Delay per item", false)],
        }
    }
}
