//! Execution layer: run stages in declared order through a `ModuleRunner`
//! and classify the outcomes.

pub mod coordinator;
pub mod runner;
pub mod stage;
pub mod status;

pub use coordinator::{RunCoordinator, RunOutcome, preflight};
pub use runner::{ModuleFailure, ModuleRunner};
pub use stage::{StageExecutor, StageState, check_stage_flags};
pub use status::{ModuleMessage, ModuleOutcome, RunStatus, StageOutcome};
