use crate::optional_number;
use async_trait::async_trait;
use framecore::{Kwargs, Plugin, PluginError, PluginOutput, Value};
use frameruntime::{ParameterDefinition, PluginFactory, PluginMetadata};
use std::collections::HashMap;
use std::sync::Arc;

/// Logs what passes through it and forwards it unchanged
pub struct DebugPlugin {
    label: String,
}

#[async_trait]
impl Plugin for DebugPlugin {
    fn plugin_type(&self) -> &str {
        "debug.log"
    }

    async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError> {
        tracing::info!("DEBUG [{}]: {:?}", self.label, data);
        for (key, value) in &kwargs {
            tracing::debug!("  {}: {:?}", key, value);
        }
        Ok(PluginOutput::new(data).with_kwargs(kwargs))
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        match key {
            "label" => Some(Value::from(self.label.as_str())),
            "plugin_type" => Some(Value::from(self.plugin_type())),
            _ => None,
        }
    }
}

pub struct DebugPluginFactory;

impl PluginFactory for DebugPluginFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
        let label = config
            .get("label")
            .and_then(|v| v.as_str())
            .unwrap_or("debug")
            .to_string();
        Ok(Arc::new(DebugPlugin { label }))
    }

    fn plugin_type(&self) -> &str {
        "debug.log"
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            description: "Logs values for debugging".to_string(),
            category: "debug".to_string(),
            parameters: vec![ParameterDefinition::new("label", "Log prefix", false)],
        }
    }
}

/// Fails on one frame (read from the `frame` kwarg), passes everything else.
/// Handy for exercising fault handling.
pub struct FailOnPlugin {
    frame: i64,
}

#[async_trait]
impl Plugin for FailOnPlugin {
    fn plugin_type(&self) -> &str {
        "debug.fail_on"
    }

    async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError> {
        let frame = kwargs.get("frame").and_then(|v| v.as_i64());
        if frame == Some(self.frame) {
            return Err(PluginError::ExecutionFailed(format!(
                "frame {} rejected",
                self.frame
            )));
        }
        Ok(PluginOutput::new(data).with_kwargs(kwargs))
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        match key {
            "frame" => Some(Value::from(self.frame)),
            "plugin_type" => Some(Value::from(self.plugin_type())),
            _ => None,
        }
    }
}

pub struct FailOnPluginFactory;

impl PluginFactory for FailOnPluginFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
        let frame = optional_number(config, "frame")?
            .ok_or_else(|| PluginError::Configuration("Missing config: frame".to_string()))?;
        Ok(Arc::new(FailOnPlugin {
            frame: frame as i64,
        }))
    }

    fn plugin_type(&self) -> &str {
        "debug.fail_on"
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            description: "Fails on one frame index".to_string(),
            category: "debug".to_string(),
            parameters: vec![ParameterDefinition::new("frame", "Frame index to reject", true)],
        }
    }
}
