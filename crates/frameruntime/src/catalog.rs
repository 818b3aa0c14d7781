use crate::CatalogError;
use framecore::{Plugin, PluginError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating plugin instances
pub trait PluginFactory: Send + Sync {
    /// Create a new plugin instance with the given configuration
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError>;

    /// Plugin type identifier
    fn plugin_type(&self) -> &str;

    /// Optional: description and accepted parameters
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::default()
    }
}

/// Metadata about a plugin type
#[derive(Debug, Clone)]
pub struct PluginMetadata {
    pub description: String,
    pub category: String,
    pub parameters: Vec<ParameterDefinition>,
}

impl Default for PluginMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
        }
    }
}

/// Catalog of available plugin types
pub struct PluginCatalog {
    factories: HashMap<String, Arc<dyn PluginFactory>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a plugin factory, replacing any factory of the same type
    pub fn register(&mut self, factory: Arc<dyn PluginFactory>) {
        let plugin_type = factory.plugin_type().to_string();
        tracing::info!("Registering plugin type: {}", plugin_type);
        self.factories.insert(plugin_type, factory);
    }

    /// Create a plugin instance from a plugin type and config
    pub fn create_plugin(
        &self,
        plugin_type: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Arc<dyn Plugin>, CatalogError> {
        let factory = self
            .factories
            .get(plugin_type)
            .ok_or_else(|| CatalogError::UnknownPluginType(plugin_type.to_string()))?;
        check_parameters(plugin_type, &factory.metadata(), config)?;

        let plugin = factory.create(config).map_err(|source| CatalogError::Creation {
            plugin_type: plugin_type.to_string(),
            source,
        })?;
        tracing::debug!("Created plugin {} with {} parameters", plugin_type, config.len());
        Ok(plugin)
    }

    /// Check `config` against the parameters a plugin type declares
    pub fn validate_config(
        &self,
        plugin_type: &str,
        config: &HashMap<String, Value>,
    ) -> Result<(), CatalogError> {
        let factory = self
            .factories
            .get(plugin_type)
            .ok_or_else(|| CatalogError::UnknownPluginType(plugin_type.to_string()))?;
        check_parameters(plugin_type, &factory.metadata(), config)
    }

    /// Registered plugin types, sorted
    pub fn list_plugin_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn get_metadata(&self, plugin_type: &str) -> Option<PluginMetadata> {
        self.factories.get(plugin_type).map(|f| f.metadata())
    }

    pub fn contains(&self, plugin_type: &str) -> bool {
        self.factories.contains_key(plugin_type)
    }
}

impl Default for PluginCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Required parameters must be present and non-null. Keys outside the
/// declared set are rejected, unless the factory declares no parameters.
fn check_parameters(
    plugin_type: &str,
    metadata: &PluginMetadata,
    config: &HashMap<String, Value>,
) -> Result<(), CatalogError> {
    let missing: Vec<String> = metadata
        .parameters
        .iter()
        .filter(|p| p.required && config.get(&p.name).map_or(true, Value::is_null))
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::MissingParameters {
            plugin_type: plugin_type.to_string(),
            parameters: missing,
        });
    }

    if metadata.parameters.is_empty() {
        return Ok(());
    }
    let mut unknown: Vec<String> = config
        .keys()
        .filter(|key| !metadata.parameters.iter().any(|p| &p.name == *key))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        unknown.sort();
        return Err(CatalogError::UnknownParameters {
            plugin_type: plugin_type.to_string(),
            parameters: unknown,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use framecore::{Kwargs, PluginOutput};

    struct Passthrough;

    #[async_trait]
    impl Plugin for Passthrough {
        fn plugin_type(&self) -> &str {
            "test.pass"
        }

        async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError> {
            Ok(PluginOutput::new(data).with_kwargs(kwargs))
        }
    }

    struct PassthroughFactory;

    impl PluginFactory for PassthroughFactory {
        fn create(&self, _config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
            Ok(Arc::new(Passthrough))
        }

        fn plugin_type(&self) -> &str {
            "test.pass"
        }

        fn metadata(&self) -> PluginMetadata {
            PluginMetadata {
                parameters: vec![
                    ParameterDefinition::new("gain", "Multiplier", true),
                    ParameterDefinition::new("label", "Tag", false),
                ],
                ..PluginMetadata::default()
            }
        }
    }

    fn catalog() -> PluginCatalog {
        let mut catalog = PluginCatalog::new();
        catalog.register(Arc::new(PassthroughFactory));
        catalog
    }

    #[test]
    fn test_required_parameters_are_enforced() {
        let mut config = HashMap::new();
        config.insert("gain".to_string(), Value::Null);

        let err = catalog().create_plugin("test.pass", &config).err().unwrap();
        assert!(matches!(
            err,
            CatalogError::MissingParameters { ref parameters, .. } if parameters == &["gain"]
        ));

        config.insert("gain".to_string(), Value::Number(2.0));
        assert!(catalog().create_plugin("test.pass", &config).is_ok());
    }

    #[test]
    fn test_undeclared_parameters_are_rejected() {
        let mut config = HashMap::new();
        config.insert("gain".to_string(), Value::Number(1.0));
        config.insert("zeta".to_string(), Value::Null);
        config.insert("alpha".to_string(), Value::Null);

        let err = catalog().validate_config("test.pass", &config).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::UnknownParameters { ref parameters, .. }
                if parameters == &["alpha", "zeta"]
        ));
    }
}
