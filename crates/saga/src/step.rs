//! Step policies, outcomes and the per-step record kept in run reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether a step's failure stops the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepPolicy {
    /// Failure ends the run.
    Fatal,
    /// Failure is logged and recorded; the run continues without the side effect.
    BestEffort,
}

impl StepPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepPolicy::Fatal => "fatal",
            StepPolicy::BestEffort => "best_effort",
        }
    }
}

impl std::fmt::Display for StepPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single step in a declarative flow table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDefinition<S> {
    pub name: &'static str,
    pub policy: StepPolicy,
    /// State the run reaches once this step has been executed.
    pub reaches: S,
}

impl<S> StepDefinition<S> {
    pub const fn fatal(name: &'static str, reaches: S) -> Self {
        Self {
            name,
            policy: StepPolicy::Fatal,
            reaches,
        }
    }

    pub const fn best_effort(name: &'static str, reaches: S) -> Self {
        Self {
            name,
            policy: StepPolicy::BestEffort,
            reaches,
        }
    }
}

/// What happened when a step ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    /// A best-effort step failed; its side effect is missing.
    Degraded { error: String },
    /// A fatal step failed and ended the run.
    Failed { error: String },
}

impl StepOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, StepOutcome::Degraded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }
}

/// Record of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: &'static str,
    pub policy: StepPolicy,
    pub outcome: StepOutcome,
    pub started_at: DateTime<Utc>,
}
