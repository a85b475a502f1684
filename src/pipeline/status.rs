//! Per-run bookkeeping: one StageOutcome per attempted stage, one
//! ModuleOutcome per referenced module.

use chrono::{DateTime, Local};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleMessage {
    Success,
    NonCriticalFailure,
    NotRun,
    /// An earlier module in the same stage failed, so this one was not invoked.
    SkippedAfterFailure,
}

impl ModuleMessage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonCriticalFailure => "failure of non-critical module",
            Self::NotRun => "not run",
            Self::SkippedAfterFailure => "skipped after earlier failure",
        }
    }
}

impl fmt::Display for ModuleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOutcome {
    pub module: String,
    pub completion_time: DateTime<Local>,
    pub message: ModuleMessage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: String,
    pub ran: bool,
    pub fail: bool,
    pub critical_fail: bool,
    /// In the stage's declared order.
    pub modules: Vec<ModuleOutcome>,
}

impl StageOutcome {
    pub fn module(&self, name: &str) -> Option<&ModuleOutcome> {
        self.modules.iter().find(|m| m.module == name)
    }

    pub fn messages(&self) -> Vec<ModuleMessage> {
        self.modules.iter().map(|m| m.message).collect()
    }
}

/// Stage outcomes in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatus {
    stages: Vec<StageOutcome>,
}

impl RunStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: StageOutcome) {
        self.stages.push(outcome);
    }

    pub fn get(&self, stage: &str) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn stages(&self) -> &[StageOutcome] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn any_failed(&self) -> bool {
        self.stages.iter().any(|s| s.fail)
    }
}
