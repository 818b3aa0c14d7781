use crate::{optional_number, required_number};
use async_trait::async_trait;
use framecore::{Kwargs, Plugin, PluginError, PluginOutput, Value};
use frameruntime::{ParameterDefinition, PluginFactory, PluginMetadata};
use std::collections::HashMap;
use std::sync::Arc;

/// Apply `op` to a number or, element-wise, to an array of numbers
fn map_numbers(data: &Value, op: &dyn Fn(f64) -> f64) -> Result<Value, PluginError> {
    match data {
        Value::Number(n) => Ok(Value::Number(op(*n))),
        Value::Array(items) => items
            .iter()
            .map(|item| map_numbers(item, op))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(PluginError::InvalidInputType {
            field: "data".to_string(),
            expected: "number or array of numbers".to_string(),
            actual: other.type_name().to_string(),
        }),
    }
}

/// Add a constant to every sample
pub struct OffsetPlugin {
    amount: f64,
}

impl OffsetPlugin {
    pub fn new(amount: f64) -> Self {
        Self { amount }
    }
}

#[async_trait]
impl Plugin for OffsetPlugin {
    fn plugin_type(&self) -> &str {
        "math.offset"
    }

    async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError> {
        let amount = self.amount;
        let result = map_numbers(&data, &|n| n + amount)?;
        Ok(PluginOutput::new(result).with_kwargs(kwargs))
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        match key {
            "amount" => Some(Value::Number(self.amount)),
            "plugin_type" => Some(Value::from(self.plugin_type())),
            _ => None,
        }
    }
}

pub struct OffsetPluginFactory;

impl PluginFactory for OffsetPluginFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
        Ok(Arc::new(OffsetPlugin::new(required_number(config, "amount")?)))
    }

    fn plugin_type(&self) -> &str {
        "math.offset"
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            description: "Add a constant to every sample".to_string(),
            category: "math".to_string(),
            parameters: vec![ParameterDefinition::new("amount", "Value to add", true)],
        }
    }
}

/// Multiply every sample by a factor
pub struct ScalePlugin {
    factor: f64,
}

impl ScalePlugin {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

#[async_trait]
impl Plugin for ScalePlugin {
    fn plugin_type(&self) -> &str {
        "math.scale"
    }

    async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError> {
        let factor = self.factor;
        let result = map_numbers(&data, &|n| n * factor)?;
        Ok(PluginOutput::new(result).with_kwargs(kwargs))
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        match key {
            "factor" => Some(Value::Number(self.factor)),
            "plugin_type" => Some(Value::from(self.plugin_type())),
            _ => None,
        }
    }
}

pub struct ScalePluginFactory;

impl PluginFactory for ScalePluginFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
        Ok(Arc::new(ScalePlugin::new(required_number(config, "factor")?)))
    }

    fn plugin_type(&self) -> &str {
        "math.scale"
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            description: "Multiply every sample by a factor".to_string(),
            category: "math".to_string(),
            parameters: vec![ParameterDefinition::new("factor", "Multiplier", true)],
        }
    }
}

/// Clamp every sample into `[min, max]`
pub struct ClampPlugin {
    min: f64,
    max: f64,
}

impl ClampPlugin {
    pub fn new(min: f64, max: f64) -> Result<Self, PluginError> {
        if min > max {
            return Err(PluginError::Configuration(format!(
                "min ({}) is greater than max ({})",
                min, max
            )));
        }
        Ok(Self { min, max })
    }
}

#[async_trait]
impl Plugin for ClampPlugin {
    fn plugin_type(&self) -> &str {
        "math.clamp"
    }

    async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError> {
        let (min, max) = (self.min, self.max);
        let result = map_numbers(&data, &|n| n.clamp(min, max))?;
        Ok(PluginOutput::new(result).with_kwargs(kwargs))
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        match key {
            "min" => Some(Value::Number(self.min)),
            "max" => Some(Value::Number(self.max)),
            "plugin_type" => Some(Value::from(self.plugin_type())),
            _ => None,
        }
    }
}

pub struct ClampPluginFactory;

impl PluginFactory for ClampPluginFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
        let min = optional_number(config, "min")?.unwrap_or(f64::MIN);
        let max = optional_number(config, "max")?.unwrap_or(f64::MAX);
        Ok(Arc::new(ClampPlugin::new(min, max)?))
    }

    fn plugin_type(&self) -> &str {
        "math.clamp"
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            description: "Clamp every sample into [min, max]".to_string(),
            category: "math".to_string(),
            parameters: vec![
                ParameterDefinition::new("min", "Lower bound", false),
                ParameterDefinition::new("max", "Upper bound", false),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offset_maps_arrays() {
        let plugin = OffsetPlugin::new(1.5);
        let input = Value::Array(vec![Value::Number(1.0), Value::Array(vec![Value::Number(2.0)])]);

        let output = plugin.execute(input, Kwargs::new()).await.unwrap();

        assert_eq!(
            output.result,
            Value::Array(vec![Value::Number(2.5), Value::Array(vec![Value::Number(3.5)])])
        );
    }

    #[tokio::test]
    async fn test_scale_rejects_strings() {
        let plugin = ScalePlugin::new(2.0);
        let err = plugin.execute(Value::from("x"), Kwargs::new()).await.unwrap_err();
        assert!(matches!(err, PluginError::InvalidInputType { .. }));
    }

    #[test]
    fn test_clamp_factory_validates_bounds() {
        let mut config = HashMap::new();
        config.insert("min".to_string(), Value::Number(5.0));
        config.insert("max".to_string(), Value::Number(1.0));
        assert!(ClampPluginFactory.create(&config).is_err());
    }
}
