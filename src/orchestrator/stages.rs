// src/orchestrator/stages.rs

//! Installer stages, their ordering and the per-run report
//!
//! The stage list is fixed. Each stage declares which earlier stages it
//! needs; a stage whose dependency was skipped is skipped too.

use crate::error::Error;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Installer stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Interpreter version gate
    RuntimeVersion,
    /// pip3 requirements
    Dependencies,
    /// Current user and, when privileged, the target account
    Identity,
    /// Directory defaults and write-back
    Configuration,
    /// Character set and tables
    Schema,
    /// Reserved sentinel rows
    Seed,
    /// PYTHONPATH export in the target's shell start-up file
    ShellEnvironment,
    /// Recursive ownership change of the install root
    Ownership,
    /// systemd unit rendering and reload
    ServiceUnits,
}

impl Stage {
    /// Get all stages in order
    pub fn all() -> &'static [Stage] {
        &[
            Self::RuntimeVersion,
            Self::Dependencies,
            Self::Identity,
            Self::Configuration,
            Self::Schema,
            Self::Seed,
            Self::ShellEnvironment,
            Self::Ownership,
            Self::ServiceUnits,
        ]
    }

    /// Get the next stage after this one
    pub fn next(&self) -> Option<Stage> {
        let all = Self::all();
        all.iter()
            .position(|s| s == self)
            .and_then(|i| all.get(i + 1))
            .copied()
    }

    /// Stages that must have completed for this one to run
    pub fn depends_on(&self) -> &'static [Stage] {
        match self {
            Self::RuntimeVersion | Self::Identity | Self::Configuration => &[],
            Self::Dependencies => &[Self::RuntimeVersion],
            Self::Schema => &[Self::Configuration],
            Self::Seed => &[Self::Schema],
            Self::ShellEnvironment | Self::Ownership => &[Self::Identity],
            Self::ServiceUnits => &[Self::Identity, Self::Ownership],
        }
    }

    /// Whether the stage only runs for the administrative account
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::ShellEnvironment | Self::Ownership | Self::ServiceUnits
        )
    }

    /// Get a human-readable name for the stage
    pub fn name(&self) -> &'static str {
        match self {
            Self::RuntimeVersion => "Runtime version",
            Self::Dependencies => "Python dependencies",
            Self::Identity => "Identity",
            Self::Configuration => "Configuration",
            Self::Schema => "Database schema",
            Self::Seed => "Reserved rows",
            Self::ShellEnvironment => "Shell environment",
            Self::Ownership => "File ownership",
            Self::ServiceUnits => "systemd units",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How a stage ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Ran to completion
    Completed(String),
    /// Deliberately not run
    Skipped(String),
    /// Fatal error; the run stopped here
    Failed { code: i32, message: String },
    /// An earlier stage failed
    NotRun,
}

impl StageOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// One stage's entry in the report
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub duration: Duration,
}

/// Everything that happened during one installer run
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub privileged: bool,
    records: Vec<StageRecord>,
    error: Option<Error>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            privileged: false,
            records: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn record(&mut self, stage: Stage, outcome: StageOutcome, duration: Duration) {
        self.records.push(StageRecord {
            stage,
            outcome,
            duration,
        });
    }

    pub(crate) fn fail(&mut self, stage: Stage, error: Error, duration: Duration) {
        self.record(
            stage,
            StageOutcome::Failed {
                code: error.code(),
                message: error.to_string(),
            },
            duration,
        );
        self.error = Some(error);
    }

    /// Stop before any stage runs; every stage is recorded as not run
    pub(crate) fn abort(&mut self, error: Error) {
        for stage in Stage::all() {
            self.record(*stage, StageOutcome::NotRun, Duration::ZERO);
        }
        self.error = Some(error);
    }

    /// Per-stage records in execution order
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Outcome of a stage, if it was reached
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.records
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    /// Whether a stage ran to completion
    pub fn completed(&self, stage: Stage) -> bool {
        self.outcome(stage).is_some_and(StageOutcome::is_completed)
    }

    /// The fatal error that stopped the run
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into the fatal error, if there was one
    pub fn into_result(self) -> crate::Result<Self> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }

    /// Get a summary of all stages
    pub fn summary(&self) -> Vec<(Stage, String)> {
        self.records
            .iter()
            .map(|r| {
                let status = match &r.outcome {
                    StageOutcome::Completed(detail) if detail.is_empty() => "done".to_string(),
                    StageOutcome::Completed(detail) => format!("done: {}", detail),
                    StageOutcome::Skipped(reason) => format!("skipped: {}", reason),
                    StageOutcome::Failed { code, message } => {
                        format!("failed ({}): {}", code, message)
                    }
                    StageOutcome::NotRun => "not run".to_string(),
                };
                (r.stage, status)
            })
            .collect()
    }
}
