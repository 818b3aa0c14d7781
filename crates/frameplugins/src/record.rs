use async_trait::async_trait;
use framecore::{Kwargs, Plugin, PluginError, PluginOutput, Value};
use frameruntime::{ParameterDefinition, PluginFactory, PluginMetadata};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One value captured by a recorder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub label: String,
    pub frame: Option<i64>,
    pub value: Value,
}

/// Shared sink that recorder plugins write into; cloning shares the storage
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Arc<RwLock<Vec<Record>>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, record: Record) {
        self.records.write().await.push(record);
    }

    /// Records sorted by frame, then label
    pub async fn snapshot(&self) -> Vec<Record> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| a.frame.cmp(&b.frame).then_with(|| a.label.cmp(&b.label)));
        records
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

/// Captures every value reaching it, tagged with the `frame` kwarg
pub struct RecordPlugin {
    label: String,
    store: RecordStore,
}

impl RecordPlugin {
    pub fn new(label: impl Into<String>, store: RecordStore) -> Self {
        Self {
            label: label.into(),
            store,
        }
    }
}

#[async_trait]
impl Plugin for RecordPlugin {
    fn plugin_type(&self) -> &str {
        "sink.record"
    }

    async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError> {
        self.store
            .push(Record {
                label: self.label.clone(),
                frame: kwargs.get("frame").and_then(|v| v.as_i64()),
                value: data.clone(),
            })
            .await;
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

/// Creates recorders that all write into the factory's store
pub struct RecordPluginFactory {
    store: RecordStore,
}

impl RecordPluginFactory {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }
}

impl PluginFactory for RecordPluginFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
        let label = config
            .get("label")
            .and_then(|v| v.as_str())
            .unwrap_or("record");
        Ok(Arc::new(RecordPlugin::new(label, self.store.clone())))
    }

    fn plugin_type(&self) -> &str {
        "sink.record"
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            description: "Capture values for later inspection".to_string(),
            category: "sink".to_string(),
            parameters: vec![ParameterDefinition::new(
                "label",
                "Tag stored with each value",
                false,
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_are_tagged_with_frame() {
        let store = RecordStore::new();
        let plugin = RecordPlugin::new("leaf", store.clone());
        let mut kwargs = Kwargs::new();
        kwargs.insert("frame".to_string(), Value::Number(4.0));

        let output = plugin.execute(Value::Number(9.0), kwargs).await.unwrap();

        assert_eq!(output.result, Value::Number(9.0));
        assert_eq!(
            store.snapshot().await,
            vec![Record {
                label: "leaf".to_string(),
                frame: Some(4),
                value: Value::Number(9.0),
            }]
        );
    }
}
