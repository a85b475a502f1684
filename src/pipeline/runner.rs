//! The capability a stage uses to run one module.

use crate::config::ResolvedModule;

use std::fmt;

/// Why a module did not succeed.
#[derive(Debug)]
pub enum ModuleFailure {
    /// The module ran and reported failure. Absorbed into stage bookkeeping.
    Recoverable(String),
    /// Anything else (missing binary, unknown language, ...). Aborts the run.
    Fatal(anyhow::Error),
}

impl fmt::Display for ModuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable(reason) => write!(f, "pipeline failed: {}", reason),
            Self::Fatal(e) => write!(f, "{:#}", e),
        }
    }
}

impl std::error::Error for ModuleFailure {}

impl From<anyhow::Error> for ModuleFailure {
    fn from(e: anyhow::Error) -> Self {
        Self::Fatal(e)
    }
}

/// Runs a module with its resolved parameters. Blocks until the module is done.
pub trait ModuleRunner {
    fn invoke(&mut self, stage: &str, module: &ResolvedModule) -> Result<(), ModuleFailure>;
}
