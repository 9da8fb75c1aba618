//! Sale saga: catalog → cart → ledger → validation → invoice → debit →
//! invoice fetch → shipment → delivery.

use common::{CartLine, ORIGIN_ORCHESTRATOR, Product, RunId, StockDirection};

use crate::config::SagaConfig;
use crate::context::{CancelSignal, StepTracker};
use crate::error::{Result, SagaError};
use crate::flows::sale;
use crate::report::{AbortReason, RunFailure, SaleReport};
use crate::services::{Collaborators, Invoice, InvoiceDelivery, Shipment, Shortage};
use crate::state::SaleState;

/// Working state of one sale run.
struct SaleContext {
    run_id: RunId,
    origin: String,
    working_cart: Vec<CartLine>,
    shortages: Vec<Shortage>,
    abort_reason: Option<AbortReason>,
    invoice: Option<Invoice>,
    shipment: Option<Shipment>,
    tracker: StepTracker<SaleState>,
}

impl SaleContext {
    fn new(origin: &str) -> Self {
        let run_id = RunId::new();
        Self {
            run_id,
            origin: origin.to_string(),
            working_cart: Vec::new(),
            shortages: Vec::new(),
            abort_reason: None,
            invoice: None,
            shipment: None,
            tracker: StepTracker::new(run_id, SaleState::NotStarted),
        }
    }

    fn abort_no_stock(&mut self, reason: AbortReason) -> Result<()> {
        self.tracker.transition(SaleState::AbortedNoStock)?;
        self.abort_reason = Some(reason);
        Ok(())
    }

    fn into_report(self) -> SaleReport {
        let (state, steps, failure) = self.tracker.finish();
        let failure = failure.map(|e| RunFailure::from_error(&e, &steps));
        SaleReport {
            run_id: self.run_id,
            state,
            steps,
            cart: self.working_cart,
            shortages: self.shortages,
            abort_reason: self.abort_reason,
            invoice: self.invoice,
            shipment: self.shipment,
            failure,
        }
    }
}

/// Drives sale runs against a set of collaborators.
///
/// Holds no per-run state: concurrent runs share only the collaborators.
/// Nothing serializes overlapping runs, so two sales validated against the
/// same stock can both be debited.
#[derive(Debug, Clone)]
pub struct SaleOrchestrator {
    collaborators: Collaborators,
    config: SagaConfig,
}

impl SaleOrchestrator {
    pub fn new(collaborators: Collaborators, config: SagaConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    /// Runs one sale to a terminal state.
    pub async fn run(&self) -> Result<SaleReport> {
        self.run_with_cancel(CancelSignal::never()).await
    }

    /// Runs one sale; `cancel` can abandon the wait for the customer's cart.
    ///
    /// Collaborator failures end up in the report. `Err` is returned only
    /// when the flow definition itself is inconsistent.
    #[tracing::instrument(skip(self, cancel), fields(flow = "sale"))]
    pub async fn run_with_cancel(&self, cancel: CancelSignal) -> Result<SaleReport> {
        metrics::counter!("saga_executions_total", "flow" => "sale").increment(1);
        let mut ctx = SaleContext::new(ORIGIN_ORCHESTRATOR);
        tracing::info!(run_id = %ctx.run_id, "sale run started");

        match self.drive(&mut ctx, cancel).await {
            Ok(()) => {}
            Err(e) if e.is_flow_defect() => return Err(e),
            Err(e) => ctx.tracker.fail(e),
        }

        let elapsed = ctx.tracker.elapsed_secs();
        let report = ctx.into_report();
        metrics::histogram!("saga_duration_seconds", "flow" => "sale").record(elapsed);

        match report.state {
            SaleState::Completed => {
                metrics::counter!("saga_completed", "flow" => "sale").increment(1);
                tracing::info!(
                    run_id = %report.run_id,
                    degraded = ?report.degraded_steps(),
                    duration = elapsed,
                    "sale completed"
                );
            }
            SaleState::AbortedNoStock => {
                metrics::counter!("saga_aborted_no_stock").increment(1);
                tracing::warn!(
                    run_id = %report.run_id,
                    shortages = report.shortages.len(),
                    reason = ?report.abort_reason,
                    "sale aborted: stock not available"
                );
            }
            state => {
                metrics::counter!("saga_failed", "flow" => "sale").increment(1);
                tracing::warn!(
                    run_id = %report.run_id,
                    %state,
                    failure = ?report.failure,
                    "sale failed"
                );
            }
        }

        Ok(report)
    }

    async fn drive(&self, ctx: &mut SaleContext, mut cancel: CancelSignal) -> Result<()> {
        let c = &self.collaborators;

        let catalog = ctx
            .tracker
            .required(&sale::LOAD_CATALOG, c.inventory.load_catalog(&ctx.origin))
            .await?;
        tracing::info!(run_id = %ctx.run_id, products = catalog.len(), "catalog loaded");

        ctx.working_cart = ctx
            .tracker
            .required(
                &sale::CAPTURE_CART,
                self.capture_cart(&catalog, &ctx.origin, &mut cancel),
            )
            .await?;
        tracing::info!(run_id = %ctx.run_id, lines = ctx.working_cart.len(), "cart captured");

        // Recorded before validation: an aborted sale still leaves a ledger entry.
        ctx.tracker
            .execute(
                &sale::RECORD_SALE,
                c.ledger.record_sale(&ctx.working_cart, &ctx.origin),
            )
            .await?;

        let validation = match ctx
            .tracker
            .required(
                &sale::VALIDATE_STOCK,
                c.inventory.validate_stock(&ctx.working_cart),
            )
            .await
        {
            Ok(validation) => validation,
            Err(e) if e.is_flow_defect() => return Err(e),
            Err(e) => {
                return ctx.abort_no_stock(AbortReason::ValidationUnavailable {
                    error: e.to_string(),
                });
            }
        };
        if !validation.available {
            for shortage in &validation.shortages {
                tracing::info!(
                    run_id = %ctx.run_id,
                    product = %shortage.name,
                    in_stock = shortage.in_stock,
                    requested = shortage.requested,
                    "shortage"
                );
            }
            ctx.shortages = validation.shortages;
            return ctx.abort_no_stock(AbortReason::InsufficientStock);
        }

        ctx.tracker
            .required(
                &sale::GENERATE_INVOICE,
                c.billing
                    .generate_invoice(&ctx.working_cart, &ctx.origin, StockDirection::Sale),
            )
            .await?;

        // An invoice now exists; a failure here is not compensated.
        ctx.tracker
            .required(
                &sale::DEBIT_STOCK,
                c.inventory
                    .apply_stock_delta(&ctx.working_cart, StockDirection::Sale),
            )
            .await?;

        ctx.invoice = ctx
            .tracker
            .execute(
                &sale::FETCH_INVOICE,
                c.billing.fetch_latest_invoice(&ctx.origin),
            )
            .await?
            .flatten();
        if ctx.invoice.is_none() {
            tracing::info!(run_id = %ctx.run_id, "no invoice available, continuing");
        }

        ctx.shipment = ctx
            .tracker
            .execute(
                &sale::REQUEST_SHIPMENT,
                c.transport
                    .request_shipment(ctx.invoice.as_ref(), &ctx.origin),
            )
            .await?;

        let delivery = InvoiceDelivery {
            invoice: ctx.invoice.clone(),
            shipment: ctx.shipment.clone(),
        };
        ctx.tracker
            .execute(
                &sale::DELIVER_INVOICE,
                c.storefront.deliver_invoice(&delivery, &ctx.origin),
            )
            .await?;

        Ok(())
    }

    /// Waits for the customer's cart, bounded by the configured maximum wait
    /// and abandoned if `cancel` fires.
    async fn capture_cart(
        &self,
        catalog: &[Product],
        origin: &str,
        cancel: &mut CancelSignal,
    ) -> Result<Vec<CartLine>> {
        if cancel.is_cancelled() {
            return Err(SagaError::CartCaptureCancelled);
        }

        let capture = self.collaborators.storefront.capture_cart(catalog, origin);
        let bounded = async {
            match self.config.cart_capture_max_wait {
                Some(limit) => match tokio::time::timeout(limit, capture).await {
                    Ok(result) => result,
                    Err(_) => Err(SagaError::CartCaptureTimedOut(limit)),
                },
                None => capture.await,
            }
        };

        let cart = tokio::select! {
            result = bounded => result?,
            () = cancel.cancelled() => return Err(SagaError::CartCaptureCancelled),
        };

        let cart: Vec<CartLine> = cart.into_iter().filter(|line| line.quantity > 0).collect();
        if cart.is_empty() {
            return Err(SagaError::EmptyCart);
        }
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::context::cancellation;
    use crate::services::InMemoryCollaborators;
    use crate::step::StepOutcome;

    fn setup(selection: Vec<(i64, i64)>) -> (SaleOrchestrator, InMemoryCollaborators) {
        let services = InMemoryCollaborators::new();
        services.storefront.set_selection(selection);
        let orchestrator = SaleOrchestrator::new(services.collaborators(), SagaConfig::default());
        (orchestrator, services)
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (orchestrator, services) = setup(vec![(2, 3), (3, 1)]);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.state, SaleState::Completed);
        assert!(report.degraded_steps().is_empty());
        assert_eq!(report.steps.len(), sale::STEPS.len());
        assert_eq!(services.inventory.stock_of(2), Some(7));
        assert_eq!(services.inventory.stock_of(3), Some(19));
        assert_eq!(services.billing.invoice_count(), 1);
        assert_eq!(services.transport.shipment_count(), 1);
        assert_eq!(services.storefront.deliveries().len(), 1);
        assert!(report.invoice.is_some());
        assert!(report.shipment.is_some());
    }

    #[tokio::test]
    async fn test_zero_quantity_lines_are_dropped() {
        let (orchestrator, services) = setup(vec![(2, 0), (3, 2)]);

        let report = orchestrator.run().await.unwrap();

        assert!(report.is_completed());
        assert_eq!(report.cart.len(), 1);
        assert_eq!(report.cart[0].product_id, 3);
        let applied = services.inventory.applied_deltas();
        assert_eq!(applied[0].lines, vec![(3, 2)]);
    }

    #[tokio::test]
    async fn test_empty_cart_fails_before_any_mutation() {
        let (orchestrator, services) = setup(vec![(2, 0)]);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.state, SaleState::Failed);
        let failure = report.failure.unwrap();
        assert_eq!(failure.step, Some("capture_cart"));
        assert_eq!(services.ledger.sale_count(), 0);
        assert_eq!(services.inventory.validation_count(), 0);
    }

    #[tokio::test]
    async fn test_catalog_failure_fails_immediately() {
        let (orchestrator, services) = setup(vec![(2, 1)]);
        services.inventory.set_fail_on_load(true);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.state, SaleState::Failed);
        assert_eq!(report.steps.len(), 1);
        assert_eq!(services.storefront.capture_count(), 0);
    }

    #[tokio::test]
    async fn test_validation_unreachable_fails_closed() {
        let (orchestrator, services) = setup(vec![(2, 1)]);
        services.inventory.set_fail_on_validate(true);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.state, SaleState::AbortedNoStock);
        assert!(report.shortages.is_empty());
        assert!(matches!(
            report.abort_reason,
            Some(AbortReason::ValidationUnavailable { .. })
        ));
        assert!(report.failure.is_none());
        assert_eq!(services.billing.invoice_count(), 0);
        assert!(services.inventory.applied_deltas().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cart_capture_times_out() {
        let services = InMemoryCollaborators::new();
        services.storefront.set_selection(vec![(2, 1)]);
        services.storefront.set_capture_delay(Duration::from_secs(120));
        let config = SagaConfig {
            cart_capture_max_wait: Some(Duration::from_secs(30)),
            ..SagaConfig::default()
        };
        let orchestrator = SaleOrchestrator::new(services.collaborators(), config);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.state, SaleState::Failed);
        let failure = report.failure.unwrap();
        assert_eq!(failure.class, crate::error::FailureClass::Timeout);
        assert_eq!(services.ledger.sale_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cart_capture_can_be_cancelled() {
        let services = InMemoryCollaborators::new();
        services.storefront.set_selection(vec![(2, 1)]);
        services.storefront.set_capture_delay(Duration::from_secs(120));
        let orchestrator = SaleOrchestrator::new(services.collaborators(), SagaConfig::default());

        let (handle, signal) = cancellation();
        let run = tokio::spawn(async move { orchestrator.run_with_cancel(signal).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.state, SaleState::Failed);
        assert_eq!(
            report.step("capture_cart").map(|r| &r.outcome),
            Some(&StepOutcome::Failed {
                error: "Cart capture cancelled".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_missing_invoice_still_ships() {
        let (orchestrator, services) = setup(vec![(2, 1)]);
        services.billing.set_fail_on_fetch(true);

        let report = orchestrator.run().await.unwrap();

        assert!(report.is_completed());
        assert_eq!(report.degraded_steps(), vec!["fetch_latest_invoice"]);
        assert!(report.invoice.is_none());
        assert_eq!(services.transport.shipment_count(), 1);
        assert_eq!(services.transport.last_invoice(), None);
    }

    #[tokio::test]
    async fn test_delivery_failure_still_completes() {
        let (orchestrator, services) = setup(vec![(2, 1)]);
        services.storefront.set_fail_on_deliver(true);
        services.transport.set_fail(true);

        let report = orchestrator.run().await.unwrap();

        assert!(report.is_completed());
        assert_eq!(
            report.degraded_steps(),
            vec!["request_shipment", "deliver_invoice"]
        );
    }
}
