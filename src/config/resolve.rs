//! Per-stage parameter resolution.
//!
//! Module parameters take precedence: globals only fill in keys the module
//! does not define. Every call builds fresh maps, the document's own module
//! parameters are never touched.

use crate::config::document::{ConfigDocument, StageSpec};
use crate::error::ConfigError;

use serde_json::{Map, Value};

/// A module reference with its effective parameters for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModule {
    pub name: String,
    pub language: String,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStage {
    pub name: String,
    pub spec: StageSpec,
    /// In the stage's declared order.
    pub modules: Vec<ResolvedModule>,
}

impl ResolvedStage {
    pub fn module(&self, name: &str) -> Option<&ResolvedModule> {
        self.modules.iter().find(|m| m.name == name)
    }
}

pub fn resolve_stage(document: &ConfigDocument, stage: &str) -> Result<ResolvedStage, ConfigError> {
    let spec = document
        .stage(stage)?
        .ok_or_else(|| ConfigError::UnknownStage(stage.to_string()))?;

    if spec.modules.is_empty() {
        return Err(ConfigError::EmptyStageModules(stage.to_string()));
    }

    let empty = Map::new();
    let globals = document.globals().unwrap_or(&empty);

    let mut modules = Vec::with_capacity(spec.modules.len());
    for name in &spec.modules {
        let module = document
            .module(name)?
            .ok_or_else(|| ConfigError::UnknownModule {
                stage: stage.to_string(),
                module: name.clone(),
            })?;

        modules.push(ResolvedModule {
            name: name.clone(),
            language: module.language,
            parameters: merge_globals(module.parameters, globals),
        });
    }

    Ok(ResolvedStage {
        name: stage.to_string(),
        spec,
        modules,
    })
}

/// Layer `globals` under `own`: own keys first (own values win), then any
/// global keys `own` lacks, in global order.
pub fn merge_globals(own: Map<String, Value>, globals: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = own;
    for (key, value) in globals {
        if !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
