//! Error taxonomy for configuration handling and pipeline execution.

use thiserror::Error;

/// Structural or referential problems with the configuration document.
///
/// None of these are ever downgraded: a run that hits one aborts before the
/// affected stage executes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("schema violation at '{path}': expected {expected}, found {actual}")]
    SchemaViolation {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("malformed override '{0}': expected dotted.path=value")]
    MalformedOverride(String),

    #[error("override path '{path}': '{segment}' is not defined in current config")]
    PathNotFound { path: String, segment: String },

    #[error("override path '{path}' ends at a {found}; only string, boolean or number leaves can be updated")]
    NotALeaf { path: String, found: &'static str },

    #[error("override path '{path}': '{value}' looks numeric but is not a finite number")]
    InvalidNumber { path: String, value: String },

    #[error("invalid step: {0} is not defined in pipeline")]
    UnknownStage(String),

    #[error("invalid pipeline step: {0} includes no modules")]
    EmptyStageModules(String),

    #[error("{stage} is an invalid pipeline step: {module} is not defined in modules")]
    UnknownModule { stage: String, module: String },

    #[error("config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("the {stage} pipe is {reason}")]
    InvalidStageFlags { stage: String, reason: &'static str },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("module {module} in pipe {stage} failed fatally: {source:#}")]
    ModuleFatal {
        stage: String,
        module: String,
        #[source]
        source: anyhow::Error,
    },
}
