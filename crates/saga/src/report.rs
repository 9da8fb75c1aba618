//! Run reports returned by the orchestrators.

use common::{CartLine, RunId};
use serde::Serialize;

use crate::error::{FailureClass, SagaError};
use crate::services::{Invoice, Shipment, Shortage};
use crate::state::{ReplenishmentState, SaleState};
use crate::step::StepRecord;

/// Message returned when no product is at or below the threshold.
pub const NO_REPLENISHMENT_NEEDED: &str = "no replenishment needed";

/// Message returned after a replenishment run bought stock.
pub const REPLENISHMENT_COMPLETED: &str = "replenishment completed";

/// Why a run ended in its failure state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    /// The step that failed, if the failure came from a step.
    pub step: Option<&'static str>,
    pub class: FailureClass,
    pub message: String,
}

impl RunFailure {
    pub(crate) fn from_error(error: &SagaError, steps: &[StepRecord]) -> Self {
        let step = steps
            .iter()
            .rev()
            .find(|record| record.outcome.is_failed())
            .map(|record| record.step);
        Self {
            step,
            class: error.class(),
            message: error.to_string(),
        }
    }
}

/// Why a sale stopped at stock validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// Inventory reported at least one shortage.
    InsufficientStock,
    /// Inventory could not be asked; treated as unavailable.
    ValidationUnavailable { error: String },
}

fn degraded(steps: &[StepRecord]) -> Vec<&'static str> {
    steps
        .iter()
        .filter(|record| record.outcome.is_degraded())
        .map(|record| record.step)
        .collect()
}

/// Outcome of one sale run.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReport {
    pub run_id: RunId,
    pub state: SaleState,
    pub steps: Vec<StepRecord>,
    /// The cart as captured, after zero-quantity lines were dropped.
    pub cart: Vec<CartLine>,
    pub shortages: Vec<Shortage>,
    pub abort_reason: Option<AbortReason>,
    pub invoice: Option<Invoice>,
    pub shipment: Option<Shipment>,
    pub failure: Option<RunFailure>,
}

impl SaleReport {
    pub fn is_completed(&self) -> bool {
        self.state == SaleState::Completed
    }

    /// Names of best-effort steps that failed during the run.
    pub fn degraded_steps(&self) -> Vec<&'static str> {
        degraded(&self.steps)
    }

    /// Returns the record of the named step, if it ran.
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.step == name)
    }
}

/// Outcome of one replenishment run.
#[derive(Debug, Clone, Serialize)]
pub struct ReplenishmentReport {
    pub run_id: RunId,
    pub state: ReplenishmentState,
    pub message: String,
    pub purchased: Vec<CartLine>,
    pub steps: Vec<StepRecord>,
    pub failure: Option<RunFailure>,
}

impl ReplenishmentReport {
    pub fn is_completed(&self) -> bool {
        self.state == ReplenishmentState::Completed
    }

    /// Names of best-effort steps that failed during the run.
    pub fn degraded_steps(&self) -> Vec<&'static str> {
        degraded(&self.steps)
    }

    /// Returns the record of the named step, if it ran.
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.step == name)
    }
}
