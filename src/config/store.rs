//! Working configuration for one run: current document plus the snapshots
//! that preceded each applied override.

use crate::config::document::ConfigDocument;
use crate::config::overrides::Override;
use crate::error::ConfigError;

use anyhow::Context;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    current: ConfigDocument,
    history: Vec<ConfigDocument>,
}

impl ConfigStore {
    pub fn new(document: ConfigDocument) -> Self {
        Self {
            current: document,
            history: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let document = ConfigDocument::load(path)?;
        debug!(path = %path.display(), stages = document.stage_names().len(), "loaded config");
        Ok(Self::new(document))
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.current
    }

    /// Earlier states, oldest first. One entry per applied override.
    pub fn history(&self) -> &[ConfigDocument] {
        &self.history
    }

    /// Apply one `dotted.path=value` override.
    ///
    /// The new tree is schema-checked before it replaces the current one; on
    /// any error the current document is left as it was.
    pub fn apply_override(&mut self, raw: &str) -> Result<(), ConfigError> {
        let ov: Override = raw.parse()?;
        let updated = ov.apply(self.current.as_value())?;
        let next = ConfigDocument::from_value(updated)?;

        info!(path = %ov.dotted_path(), value = %ov.raw_value, "applied config override");
        let previous = std::mem::replace(&mut self.current, next);
        self.history.push(previous);
        Ok(())
    }

    /// Apply overrides in order. Not transactional: on failure, overrides
    /// applied before the failing one stay applied.
    pub fn apply_overrides<I, S>(&mut self, overrides: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for raw in overrides {
            self.apply_override(raw.as_ref())?;
        }
        Ok(())
    }

    /// Persist the working document to `path` and return what reading it back
    /// yields. The caller must use the returned document from here on.
    pub fn commit(self, path: &Path) -> anyhow::Result<ConfigDocument> {
        self.current.write(path)?;
        let reloaded = ConfigDocument::load(path)
            .with_context(|| format!("reload persisted config {}", path.display()))?;
        info!(path = %path.display(), overrides = self.history.len(), "persisted effective config");
        Ok(reloaded)
    }
}
