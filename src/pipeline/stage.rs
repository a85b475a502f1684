//! One stage ("pipe") invocation.
//!
//! NotStarted -> Skipped                         (use = false)
//! NotStarted -> Running -> Succeeded            (every module succeeded)
//! NotStarted -> Running -> PartiallyFailed      (a module failed recoverably)
//!
//! Modules run strictly in declared order. After the first recoverable
//! failure the remaining modules are not invoked and are recorded as
//! "skipped after earlier failure".

use crate::config::{ConfigDocument, ResolvedStage, StageSpec, resolve_stage};
use crate::error::RunError;
use crate::pipeline::runner::{ModuleFailure, ModuleRunner};
use crate::pipeline::status::{ModuleMessage, ModuleOutcome, StageOutcome};

use chrono::Local;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    NotStarted,
    Skipped,
    Running,
    Succeeded,
    PartiallyFailed,
}

/// Reject inconsistent use/required/critical combinations.
///
/// Checked on every execution, since overrides may have changed the flags
/// after the document was first validated.
pub fn check_stage_flags(stage: &str, spec: &StageSpec) -> Result<(), RunError> {
    let reason = if spec.critical && !spec.use_stage {
        Some("set to not be used, but this pipe is critical")
    } else if spec.required && !spec.use_stage {
        Some("set to not be used, but this pipe is required")
    } else if spec.critical && !spec.required {
        Some("set as critical but not required; all critical steps are required")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(RunError::InvalidStageFlags {
            stage: stage.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub struct StageExecutor<'a, R: ModuleRunner + ?Sized> {
    document: &'a ConfigDocument,
    runner: &'a mut R,
    state: StageState,
}

impl<'a, R: ModuleRunner + ?Sized> StageExecutor<'a, R> {
    pub fn new(document: &'a ConfigDocument, runner: &'a mut R) -> Self {
        Self {
            document,
            runner,
            state: StageState::NotStarted,
        }
    }

    /// State reached by the most recent `execute` call.
    pub fn state(&self) -> StageState {
        self.state
    }

    fn transition(&mut self, stage: &str, next: StageState) {
        debug!(stage, from = ?self.state, to = ?next, "stage transition");
        self.state = next;
    }

    /// Run one stage. Referential and flag errors are returned before any
    /// module is invoked; a fatal module error is returned as soon as it occurs.
    pub fn execute(&mut self, stage: &str) -> Result<StageOutcome, RunError> {
        self.state = StageState::NotStarted;

        let resolved = resolve_stage(self.document, stage)?;
        check_stage_flags(stage, &resolved.spec)?;

        let started = Instant::now();
        info!(stage, modules = resolved.modules.len(), "running pipe");

        let outcome = if resolved.spec.use_stage {
            self.run_modules(&resolved)?
        } else {
            self.skip(&resolved)
        };

        info!(
            stage,
            elapsed_ms = started.elapsed().as_millis() as u64,
            fail = outcome.fail,
            critical_fail = outcome.critical_fail,
            "completed pipe"
        );
        Ok(outcome)
    }

    fn skip(&mut self, resolved: &ResolvedStage) -> StageOutcome {
        self.transition(&resolved.name, StageState::Skipped);

        let modules = resolved
            .modules
            .iter()
            .map(|m| ModuleOutcome {
                module: m.name.clone(),
                completion_time: Local::now(),
                message: ModuleMessage::NotRun,
            })
            .collect();

        StageOutcome {
            stage: resolved.name.clone(),
            ran: false,
            fail: false,
            critical_fail: false,
            modules,
        }
    }

    fn run_modules(&mut self, resolved: &ResolvedStage) -> Result<StageOutcome, RunError> {
        self.transition(&resolved.name, StageState::Running);

        let stage = resolved.name.as_str();
        let mut fail = false;
        let mut modules = Vec::with_capacity(resolved.modules.len());

        for module in &resolved.modules {
            let message = if fail {
                debug!(stage, module = %module.name, "skipping module after earlier failure");
                ModuleMessage::SkippedAfterFailure
            } else {
                info!(stage, module = %module.name, "running module");
                match self.runner.invoke(stage, module) {
                    Ok(()) => ModuleMessage::Success,
                    Err(ModuleFailure::Recoverable(reason)) => {
                        warn!(stage, module = %module.name, %reason, "module failed");
                        fail = true;
                        ModuleMessage::NonCriticalFailure
                    }
                    Err(ModuleFailure::Fatal(source)) => {
                        error!(stage, module = %module.name, "module failed fatally: {:#}", source);
                        return Err(RunError::ModuleFatal {
                            stage: stage.to_string(),
                            module: module.name.clone(),
                            source,
                        });
                    }
                }
            };

            modules.push(ModuleOutcome {
                module: module.name.clone(),
                completion_time: Local::now(),
                message,
            });
        }

        let spec = &resolved.spec;
        let critical_fail = (fail && spec.critical) || (fail && spec.required);

        let end_state = if fail {
            StageState::PartiallyFailed
        } else {
            StageState::Succeeded
        };
        self.transition(stage, end_state);

        Ok(StageOutcome {
            stage: stage.to_string(),
            ran: true,
            fail,
            critical_fail,
            modules,
        })
    }
}
