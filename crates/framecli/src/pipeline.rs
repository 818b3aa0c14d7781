// crates/framecli/src/pipeline.rs

use anyhow::{anyhow, bail, Context, Result};
use framecore::Value;
use frameruntime::StageSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Pipeline file: an ordered list of stages forming one tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub stages: Vec<StageEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntry {
    pub plugin_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Omitted means "attach to the previous stage"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

impl Pipeline {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline {}", path.display()))?;
        let pipeline: Pipeline = serde_json::from_str(&text)
            .with_context(|| format!("parsing pipeline {}", path.display()))?;
        if pipeline.stages.is_empty() {
            bail!("pipeline '{}' has no stages", pipeline.name);
        }
        Ok(pipeline)
    }

    pub fn example() -> Self {
        let stage = |plugin_type: &str, parent: Option<usize>, config: serde_json::Value| {
            StageEntry {
                plugin_type: plugin_type.to_string(),
                name: None,
                parent,
                config: serde_json::from_value(config).unwrap_or_default(),
            }
        };
        Pipeline {
            name: "Example pipeline".to_string(),
            description: Some("Scales each frame, then branches into two sinks".to_string()),
            stages: vec![
                stage("math.scale", None, serde_json::json!({ "factor": 2.0 })),
                stage("math.offset", None, serde_json::json!({ "amount": 0.5 })),
                stage("sink.record", None, serde_json::json!({ "label": "offset" })),
                stage("math.clamp", Some(0), serde_json::json!({ "min": 0.0, "max": 10.0 })),
                stage("sink.record", None, serde_json::json!({ "label": "clamped" })),
            ],
        }
    }

    pub fn stage_specs(&self) -> Vec<StageSpec> {
        self.stages
            .iter()
            .map(|entry| {
                let mut stage = StageSpec::new(entry.plugin_type.clone());
                if let Some(name) = &entry.name {
                    stage = stage.with_name(name.clone());
                }
                if let Some(parent) = entry.parent {
                    stage = stage.with_parent(parent);
                }
                for (key, value) in &entry.config {
                    stage = stage.with_config(key.clone(), json_to_value(value.clone()));
                }
                stage
            })
            .collect()
    }
}

/// Convert plain JSON into a plugin `Value`
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}

/// Parse `type[:key=value,...]`. The keys `name` and `parent` set the stage
/// name and parent id; everything else goes into the plugin config.
pub fn parse_stage(arg: &str) -> Result<StageSpec> {
    let (plugin_type, rest) = match arg.split_once(':') {
        Some((plugin_type, rest)) => (plugin_type, rest),
        None => (arg, ""),
    };
    if plugin_type.is_empty() {
        bail!("stage '{}' has no plugin type", arg);
    }

    let mut stage = StageSpec::new(plugin_type);
    for pair in rest.split(',').filter(|p| !p.is_empty()) {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value in stage '{}', got '{}'", arg, pair))?;
        stage = match key {
            "name" => stage.with_name(raw),
            "parent" => stage.with_parent(
                raw.parse::<usize>()
                    .with_context(|| format!("parent must be a node id, got '{}'", raw))?,
            ),
            _ => stage.with_config(key, parse_scalar(raw)),
        };
    }
    Ok(stage)
}

fn parse_scalar(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<f64>() {
        Value::Number(n)
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::from(raw)
    }
}
