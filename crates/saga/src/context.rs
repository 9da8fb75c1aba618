//! Per-run working state.
//!
//! Each run owns its context outright; orchestrators hold no mutable state,
//! so overlapping runs never see each other's cart or batch.

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use common::RunId;
use tokio::sync::watch;

use crate::error::{Result, SagaError};
use crate::state::FlowState;
use crate::step::{StepDefinition, StepOutcome, StepPolicy, StepRecord};

/// Creates a linked cancellation handle and signal for one run.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(Some(rx)))
}

/// Owner side of a run's cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Requests cancellation. Only the cart-capture wait observes it.
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// Receiver side of a run's cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Option<watch::Receiver<bool>>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self(None)
    }

    /// Returns true if cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&mut self) {
        let Some(rx) = self.0.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // handle dropped without cancelling
                return std::future::pending().await;
            }
        }
    }
}

/// Tracks the state machine and step records of one run.
#[derive(Debug)]
pub struct StepTracker<S> {
    run_id: RunId,
    state: S,
    steps: Vec<StepRecord>,
    started: Instant,
    failure: Option<SagaError>,
}

impl<S: FlowState> StepTracker<S> {
    pub fn new(run_id: RunId, initial: S) -> Self {
        Self {
            run_id,
            state: initial,
            steps: Vec::new(),
            started: Instant::now(),
            failure: None,
        }
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Moves the run to `to`, rejecting transitions the machine forbids.
    pub fn transition(&mut self, to: S) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(SagaError::InvalidTransition {
                flow: S::FLOW,
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        tracing::debug!(run_id = %self.run_id, from = %self.state, %to, "state transition");
        self.state = to;
        Ok(())
    }

    /// Runs one step and records its outcome according to its policy.
    ///
    /// Returns `Ok(Some(value))` on success and `Ok(None)` when a best-effort
    /// step degraded. A fatal failure is recorded and returned as `Err`; the
    /// state is left where it was so the caller decides the terminal state.
    pub async fn execute<T, F>(&mut self, step: &StepDefinition<S>, call: F) -> Result<Option<T>>
    where
        F: Future<Output = Result<T>>,
    {
        let started_at = Utc::now();
        tracing::info!(run_id = %self.run_id, step = step.name, policy = %step.policy, "saga step started");

        match call.await {
            Ok(value) => {
                self.record(step, StepOutcome::Succeeded, started_at);
                self.transition(step.reaches)?;
                tracing::info!(run_id = %self.run_id, step = step.name, "saga step completed");
                Ok(Some(value))
            }
            Err(e) => match step.policy {
                StepPolicy::BestEffort => {
                    tracing::warn!(
                        run_id = %self.run_id,
                        step = step.name,
                        error = %e,
                        "best-effort step degraded, continuing"
                    );
                    metrics::counter!("saga_step_degraded", "flow" => S::FLOW, "step" => step.name)
                        .increment(1);
                    self.record(
                        step,
                        StepOutcome::Degraded {
                            error: e.to_string(),
                        },
                        started_at,
                    );
                    self.transition(step.reaches)?;
                    Ok(None)
                }
                StepPolicy::Fatal => {
                    tracing::error!(run_id = %self.run_id, step = step.name, error = %e, "saga step failed");
                    self.record(
                        step,
                        StepOutcome::Failed {
                            error: e.to_string(),
                        },
                        started_at,
                    );
                    Err(e)
                }
            },
        }
    }

    /// Runs a step whose result the flow cannot do without.
    pub async fn required<T, F>(&mut self, step: &StepDefinition<S>, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.execute(step, call)
            .await?
            .ok_or(SagaError::PolicyMismatch { step: step.name })
    }

    /// Ends the run in the failure state, keeping the cause for the report.
    pub fn fail(&mut self, error: SagaError) {
        if self.state.can_transition_to(S::FAILED) {
            self.state = S::FAILED;
        }
        self.failure = Some(error);
    }

    pub fn failure(&self) -> Option<&SagaError> {
        self.failure.as_ref()
    }

    /// Consumes the tracker, yielding its final state, records and failure.
    pub fn finish(self) -> (S, Vec<StepRecord>, Option<SagaError>) {
        (self.state, self.steps, self.failure)
    }

    fn record(
        &mut self,
        step: &StepDefinition<S>,
        outcome: StepOutcome,
        started_at: chrono::DateTime<Utc>,
    ) {
        self.steps.push(StepRecord {
            step: step.name,
            policy: step.policy,
            outcome,
            started_at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::sale;
    use crate::state::SaleState;

    fn tracker() -> StepTracker<SaleState> {
        StepTracker::new(RunId::new(), SaleState::NotStarted)
    }

    #[tokio::test]
    async fn test_successful_step_advances_state() {
        let mut t = tracker();
        let value = t
            .execute(&sale::LOAD_CATALOG, async { Ok::<_, SagaError>(42) })
            .await
            .unwrap();
        assert_eq!(value, Some(42));
        assert_eq!(t.state(), SaleState::CatalogLoaded);
        assert_eq!(t.steps()[0].outcome, StepOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_best_effort_failure_degrades_and_advances() {
        let mut t = tracker();
        t.transition(SaleState::CatalogLoaded).unwrap();
        t.transition(SaleState::CartCaptured).unwrap();

        let value: Option<()> = t
            .execute(&sale::RECORD_SALE, async {
                Err(SagaError::LedgerService("down".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(value, None);
        assert_eq!(t.state(), SaleState::SaleRecorded);
        assert!(t.steps()[0].outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_fatal_failure_keeps_state_and_returns_error() {
        let mut t = tracker();
        let result: Result<Option<()>> = t
            .execute(&sale::LOAD_CATALOG, async {
                Err(SagaError::InventoryService("down".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(t.state(), SaleState::NotStarted);
        assert!(t.steps()[0].outcome.is_failed());

        t.fail(result.unwrap_err());
        assert_eq!(t.state(), SaleState::Failed);
        assert!(t.failure().is_some());
    }

    #[tokio::test]
    async fn test_required_on_degraded_step_is_a_policy_mismatch() {
        let mut t = tracker();
        t.transition(SaleState::CatalogLoaded).unwrap();
        t.transition(SaleState::CartCaptured).unwrap();

        let result: Result<()> = t
            .required(&sale::RECORD_SALE, async {
                Err(SagaError::LedgerService("down".to_string()))
            })
            .await;
        assert!(matches!(
            result,
            Err(SagaError::PolicyMismatch { step: "record_sale" })
        ));
    }

    #[tokio::test]
    async fn test_out_of_order_step_is_rejected() {
        let mut t = tracker();
        let result = t
            .execute(&sale::GENERATE_INVOICE, async { Ok::<_, SagaError>(()) })
            .await;
        assert!(matches!(
            result,
            Err(SagaError::InvalidTransition { flow: "sale", .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_signal_fires() {
        let (handle, mut signal) = cancellation();
        assert!(!signal.is_cancelled());
        handle.cancel();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_signal_does_not_fire() {
        let mut signal = CancelSignal::never();
        let fired = tokio::time::timeout(std::time::Duration::from_millis(20), signal.cancelled())
            .await
            .is_ok();
        assert!(!fired);
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_fire() {
        let (handle, mut signal) = cancellation();
        drop(handle);
        let fired = tokio::time::timeout(std::time::Duration::from_millis(20), signal.cancelled())
            .await
            .is_ok();
        assert!(!fired);
    }
}
