//! Shared fixtures for unit tests.

use crate::config::ResolvedModule;
use crate::pipeline::{ModuleFailure, ModuleRunner};

use serde_json::{Value, json};
use std::collections::BTreeMap;

/// A valid document: a critical `peakdetector` stage and an unused `qc` stage.
pub(crate) fn sample() -> Value {
    json!({
        "pipeline": {
            "peakdetector": {
                "use": true, "required": true, "critical": true,
                "modules": ["peakdetector"]
            },
            "qc": {
                "use": false, "required": false, "critical": false,
                "modules": ["pipeline_qc"]
            }
        },
        "globals": {
            "mzroll_db_file": "peakdetector.mzrollDB",
            "methodId": "M004A",
            "chemical_class": "lipid",
            "MS1tol": "10ppm",
            "MS2tol": "20ppm",
            "mode": "positive",
            "collision_energies": "30",
            "dbname": "standards",
            "standard_db_user": "reader",
            "standard_db_passwd_key": "PW",
            "standard_db_host_key": "HOST"
        },
        "modules": {
            "peakdetector": {
                "language": "bin",
                "parameters": { "ms2": "-2", "minintensity": 1000 }
            },
            "pipeline_qc": {
                "language": "R",
                "parameters": { "referenceSample": "pool" }
            }
        }
    })
}

/// Build a document with the given stages (name, use, required, critical,
/// modules). Every referenced module is declared as an `R` module.
pub(crate) fn with_stages(stages: &[(&str, bool, bool, bool, &[&str])]) -> Value {
    let mut root = sample();
    let mut pipeline = serde_json::Map::new();
    for (name, use_stage, required, critical, modules) in stages {
        pipeline.insert(
            name.to_string(),
            json!({
                "use": use_stage, "required": required, "critical": critical,
                "modules": modules
            }),
        );
        for module in modules.iter() {
            root["modules"][*module] = json!({
                "language": "R",
                "parameters": { "stage_hint": name }
            });
        }
    }
    root["pipeline"] = Value::Object(pipeline);
    root
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Scripted {
    Recoverable,
    Fatal,
}

/// Records every invocation and fails the modules it was told to fail.
#[derive(Debug, Default)]
pub(crate) struct ScriptedRunner {
    pub calls: Vec<(String, String)>,
    script: BTreeMap<String, Scripted>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, module: &str) -> Self {
        self.script.insert(module.to_string(), Scripted::Recoverable);
        self
    }

    pub fn fatal(mut self, module: &str) -> Self {
        self.script.insert(module.to_string(), Scripted::Fatal);
        self
    }

    pub fn modules_called(&self) -> Vec<&str> {
        self.calls.iter().map(|(_, m)| m.as_str()).collect()
    }
}

impl ModuleRunner for ScriptedRunner {
    fn invoke(&mut self, stage: &str, module: &ResolvedModule) -> Result<(), ModuleFailure> {
        self.calls.push((stage.to_string(), module.name.clone()));
        match self.script.get(&module.name) {
            None => Ok(()),
            Some(Scripted::Recoverable) => Err(ModuleFailure::Recoverable(format!(
                "{} exited with status 1",
                module.name
            ))),
            Some(Scripted::Fatal) => Err(ModuleFailure::Fatal(anyhow::anyhow!(
                "cannot find binary for {}",
                module.name
            ))),
        }
    }
}
