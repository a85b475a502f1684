//! Config layer: the JSON document, its fixed schemas, dot-path overrides and
//! per-stage parameter resolution.
//!
//! This module is intentionally separate from execution. It owns:
//! - ConfigDocument (validated tree + typed StageSpec/ModuleSpec views)
//! - ConfigStore (override history + persist-then-reload)
//! - resolve_stage (globals layered into module parameters)

pub mod document;
pub mod overrides;
pub mod resolve;
pub mod schema;
pub mod store;

pub use document::{ConfigDocument, ModuleSpec, StageSpec};
pub use overrides::Override;
pub use resolve::{ResolvedModule, ResolvedStage, resolve_stage};
pub use store::ConfigStore;
