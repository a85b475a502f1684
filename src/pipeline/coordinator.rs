//! Run-level coordination: every stage in document order, halting on the
//! first critical failure or fatal error.

use crate::config::{ConfigDocument, ResolvedStage, resolve_stage};
use crate::error::RunError;
use crate::pipeline::runner::ModuleRunner;
use crate::pipeline::stage::{StageExecutor, check_stage_flags};
use crate::pipeline::status::RunStatus;

use tracing::{error, info};

/// How a run ended when no fatal error occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every stage was attempted. Individual stages may still have `fail` set.
    Completed(RunStatus),
    /// `stage` failed critically; later stages were not attempted.
    Halted { stage: String, status: RunStatus },
}

impl RunOutcome {
    pub fn status(&self) -> &RunStatus {
        match self {
            Self::Completed(status) | Self::Halted { status, .. } => status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

pub struct RunCoordinator<'a, R: ModuleRunner + ?Sized> {
    document: &'a ConfigDocument,
    runner: &'a mut R,
}

impl<'a, R: ModuleRunner + ?Sized> RunCoordinator<'a, R> {
    pub fn new(document: &'a ConfigDocument, runner: &'a mut R) -> Self {
        Self { document, runner }
    }

    pub fn run(self) -> Result<RunOutcome, RunError> {
        let mut status = RunStatus::new();
        let mut executor = StageExecutor::new(self.document, self.runner);

        for stage in self.document.stage_names() {
            let outcome = executor.execute(&stage).inspect_err(|e| {
                error!(stage = %stage, "halting execution: {}", e);
            })?;

            let critical = outcome.critical_fail;
            status.record(outcome);

            if critical {
                error!(
                    stage = %stage,
                    "pipeline stage \"{}\" experienced a critical failure. Halting execution.",
                    stage
                );
                return Ok(RunOutcome::Halted { stage, status });
            }
        }

        info!(stages = status.len(), failed = status.any_failed(), "pipeline finished");
        Ok(RunOutcome::Completed(status))
    }
}

/// Resolve every stage and check its flags without invoking anything.
pub fn preflight(document: &ConfigDocument) -> Result<Vec<ResolvedStage>, RunError> {
    document
        .stage_names()
        .iter()
        .map(|stage| {
            let resolved = resolve_stage(document, stage)?;
            check_stage_flags(stage, &resolved.spec)?;
            Ok(resolved)
        })
        .collect()
}
