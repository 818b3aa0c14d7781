//! Standard plugin library
//!
//! Collection of built-in plugins for common frame operations

mod debug;
mod math;
mod record;
mod time;

pub use debug::{DebugPlugin, DebugPluginFactory, FailOnPlugin, FailOnPluginFactory};
pub use math::{
    ClampPlugin, ClampPluginFactory, OffsetPlugin, OffsetPluginFactory, ScalePlugin,
    ScalePluginFactory,
};
pub use record::{Record, RecordPlugin, RecordPluginFactory, RecordStore};
pub use time::{DelayPlugin, DelayPluginFactory};

use framecore::{PluginError, Value};
use frameruntime::PluginCatalog;
use std::collections::HashMap;
use std::sync::Arc;

/// Register all standard plugins with a catalog.
///
/// Returns the store that every `sink.record` plugin created from this
/// catalog writes into.
pub fn register_all(catalog: &mut PluginCatalog) -> RecordStore {
    let store = RecordStore::new();
    catalog.register(Arc::new(math::OffsetPluginFactory));
    catalog.register(Arc::new(math::ScalePluginFactory));
    catalog.register(Arc::new(math::ClampPluginFactory));
    catalog.register(Arc::new(debug::DebugPluginFactory));
    catalog.register(Arc::new(debug::FailOnPluginFactory));
    catalog.register(Arc::new(time::DelayPluginFactory));
    catalog.register(Arc::new(record::RecordPluginFactory::new(store.clone())));
    store
}

pub(crate) fn optional_number(
    config: &HashMap<String, Value>,
    key: &str,
) -> Result<Option<f64>, PluginError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| PluginError::InvalidInputType {
                field: key.to_string(),
                expected: "number".to_string(),
                actual: value.type_name().to_string(),
            }),
    }
}

pub(crate) fn required_number(
    config: &HashMap<String, Value>,
    key: &str,
) -> Result<f64, PluginError> {
    optional_number(config, key)?
        .ok_or_else(|| PluginError::Configuration(format!("Missing config: {}", key)))
}
