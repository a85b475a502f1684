//! The configuration document and typed views over its sections.
//!
//! JSON shape:
//! {
//!   "pipeline": {                      // "stages" is accepted as well
//!     "search": {
//!       "use": true, "required": true, "critical": false,
//!       "modules": ["peakdetector"]
//!     }
//!   },
//!   "globals": { "methodId": "M004A", "MS1tol": "10ppm", ... },
//!   "modules": {
//!     "peakdetector": { "language": "bin", "parameters": { "ms2": "-2" } }
//!   }
//! }
//!
//! The raw tree is kept as a `serde_json::Value` (insertion ordered) so
//! overrides can address any leaf, and typed views are produced on demand.

use crate::config::schema;
use crate::error::ConfigError;

use anyhow::{Context, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Stage section names, in lookup order.
pub const STAGE_SECTIONS: [&str; 2] = ["pipeline", "stages"];

/// A schema-checked configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: Value,
}

/// One pipeline step as declared in the stage section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StageSpec {
    #[serde(rename = "use")]
    pub use_stage: bool,
    pub required: bool,
    pub critical: bool,
    pub modules: Vec<String>,
}

/// One external unit of work.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModuleSpec {
    pub language: String,
    pub parameters: Map<String, Value>,
}

impl ConfigDocument {
    /// Validate `root` against the fixed schemas and wrap it.
    pub fn from_value(root: Value) -> Result<Self, ConfigError> {
        schema::validate(&root)?;
        Ok(Self { root })
    }

    /// Parse a JSON document; `origin` is used in error messages.
    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: origin.to_string(),
            source,
        })?;
        Self::from_value(root)
    }

    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text, &path.display().to_string())
    }

    /// Write the document as pretty JSON (4-space indent).
    ///
    /// The parent folder must already exist and the file must be a `.json`.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            bail!("write path folder {} does not exist", parent.display());
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            bail!("output file {} is not a .json file", path.display());
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.root
            .serialize(&mut ser)
            .context("serialize configuration")?;
        buf.push(b'\n');

        fs::write(path, buf).with_context(|| format!("write config {}", path.display()))?;
        Ok(())
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Name of the top-level key holding the stages in this document.
    pub fn stage_section(&self) -> &'static str {
        STAGE_SECTIONS
            .iter()
            .copied()
            .find(|key| self.root.get(*key).is_some())
            .unwrap_or(STAGE_SECTIONS[0])
    }

    fn section(&self, key: &str) -> Option<&Map<String, Value>> {
        self.root.get(key).and_then(Value::as_object)
    }

    /// Stage names in document order.
    pub fn stage_names(&self) -> Vec<String> {
        self.section(self.stage_section())
            .map(|stages| stages.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Typed view of one stage; `None` if the stage is not declared.
    pub fn stage(&self, name: &str) -> Result<Option<StageSpec>, ConfigError> {
        let section = self.stage_section();
        self.typed_entry(section, name, "stage spec")
    }

    /// Typed (owned) view of one module; `None` if the module is not declared.
    pub fn module(&self, name: &str) -> Result<Option<ModuleSpec>, ConfigError> {
        self.typed_entry("modules", name, "module spec")
    }

    pub fn globals(&self) -> Option<&Map<String, Value>> {
        self.section("globals")
    }

    /// Convenience lookup for a scalar global rendered as text.
    pub fn global_str(&self, key: &str) -> Option<&str> {
        self.globals()?.get(key)?.as_str()
    }

    fn typed_entry<T: DeserializeOwned>(
        &self,
        section: &str,
        name: &str,
        expected: &str,
    ) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.section(section).and_then(|s| s.get(name)) else {
            return Ok(None);
        };
        T::deserialize(value)
            .map(Some)
            .map_err(|e| ConfigError::SchemaViolation {
                path: format!("{}.{}", section, name),
                expected: expected.to_string(),
                actual: e.to_string(),
            })
    }
}
