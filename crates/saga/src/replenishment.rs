//! Replenishment saga: restock every product at or below the low-stock
//! threshold up to the target level.

use common::{CartLine, ORIGIN_ORCHESTRATOR, ORIGIN_SUPPLIERS, Product, RunId, StockDirection};

use crate::config::SagaConfig;
use crate::context::StepTracker;
use crate::error::Result;
use crate::flows::replenishment;
use crate::report::{
    NO_REPLENISHMENT_NEEDED, REPLENISHMENT_COMPLETED, ReplenishmentReport, RunFailure,
};
use crate::services::Collaborators;
use crate::state::ReplenishmentState;

/// Builds the purchase batch for a catalog.
///
/// Every product with `stock <= threshold` is ordered up to `target`.
/// Lines that would order nothing (target at or below current stock) are
/// left out.
pub fn compute_replenishment_batch(
    catalog: &[Product],
    threshold: i64,
    target: i64,
) -> Vec<CartLine> {
    catalog
        .iter()
        .filter(|product| product.is_low_stock(threshold))
        .filter_map(|product| {
            let quantity = target - product.stock;
            (quantity > 0).then(|| product.to_cart_line(quantity))
        })
        .collect()
}

struct ReplenishmentContext {
    run_id: RunId,
    origin: String,
    batch: Vec<CartLine>,
    message: String,
    tracker: StepTracker<ReplenishmentState>,
}

impl ReplenishmentContext {
    fn new(origin: &str) -> Self {
        let run_id = RunId::new();
        Self {
            run_id,
            origin: origin.to_string(),
            batch: Vec::new(),
            message: String::new(),
            tracker: StepTracker::new(run_id, ReplenishmentState::NotStarted),
        }
    }

    fn into_report(self) -> ReplenishmentReport {
        let (state, steps, failure) = self.tracker.finish();
        let failure = failure.map(|e| RunFailure::from_error(&e, &steps));
        ReplenishmentReport {
            run_id: self.run_id,
            state,
            message: self.message,
            purchased: self.batch,
            steps,
            failure,
        }
    }
}

/// Drives replenishment runs against a set of collaborators.
#[derive(Debug, Clone)]
pub struct ReplenishmentOrchestrator {
    collaborators: Collaborators,
    config: SagaConfig,
}

impl ReplenishmentOrchestrator {
    pub fn new(collaborators: Collaborators, config: SagaConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    /// Runs one replenishment to a terminal state.
    ///
    /// `origin` tags the ledger and billing calls; it defaults to the
    /// suppliers channel.
    #[tracing::instrument(skip(self), fields(flow = "replenishment"))]
    pub async fn run(&self, origin: Option<&str>) -> Result<ReplenishmentReport> {
        metrics::counter!("saga_executions_total", "flow" => "replenishment").increment(1);
        let mut ctx = ReplenishmentContext::new(origin.unwrap_or(ORIGIN_SUPPLIERS));
        tracing::info!(run_id = %ctx.run_id, origin = %ctx.origin, "replenishment run started");

        match self.drive(&mut ctx).await {
            Ok(()) => {}
            Err(e) if e.is_flow_defect() => return Err(e),
            Err(e) => ctx.tracker.fail(e),
        }

        let elapsed = ctx.tracker.elapsed_secs();
        let report = ctx.into_report();
        metrics::histogram!("saga_duration_seconds", "flow" => "replenishment").record(elapsed);

        match report.state {
            ReplenishmentState::Completed | ReplenishmentState::NothingToReplenish => {
                metrics::counter!("saga_completed", "flow" => "replenishment").increment(1);
                tracing::info!(
                    run_id = %report.run_id,
                    state = %report.state,
                    purchased = report.purchased.len(),
                    degraded = ?report.degraded_steps(),
                    duration = elapsed,
                    "replenishment finished"
                );
            }
            state => {
                metrics::counter!("saga_failed", "flow" => "replenishment").increment(1);
                tracing::warn!(
                    run_id = %report.run_id,
                    %state,
                    failure = ?report.failure,
                    "replenishment failed"
                );
            }
        }

        Ok(report)
    }

    async fn drive(&self, ctx: &mut ReplenishmentContext) -> Result<()> {
        let c = &self.collaborators;

        let catalog = ctx
            .tracker
            .required(
                &replenishment::LOAD_CATALOG,
                c.inventory.load_catalog_for_restock(&ctx.origin),
            )
            .await?;

        ctx.batch = compute_replenishment_batch(
            &catalog,
            self.config.low_stock_threshold,
            self.config.target_stock_level,
        );
        if ctx.batch.is_empty() {
            ctx.tracker.transition(ReplenishmentState::NothingToReplenish)?;
            ctx.message = NO_REPLENISHMENT_NEEDED.to_string();
            return Ok(());
        }
        ctx.tracker.transition(ReplenishmentState::BatchComputed)?;
        for line in &ctx.batch {
            tracing::info!(
                run_id = %ctx.run_id,
                product = %line.name,
                stock = line.stock_at_read,
                quantity = line.quantity,
                "restocking"
            );
        }

        ctx.tracker
            .execute(
                &replenishment::RECORD_PURCHASE,
                c.ledger.record_purchase(&ctx.batch, &ctx.origin),
            )
            .await?;

        ctx.tracker
            .execute(
                &replenishment::GENERATE_INVOICE,
                c.billing
                    .generate_invoice(&ctx.batch, &ctx.origin, StockDirection::Purchase),
            )
            .await?;

        ctx.tracker
            .required(
                &replenishment::CREDIT_STOCK,
                c.inventory
                    .apply_stock_delta(&ctx.batch, StockDirection::Purchase),
            )
            .await?;

        ctx.tracker
            .execute(
                &replenishment::CONFIRM_RECEIPT,
                c.supplier.confirm_receipt(&ctx.batch, ORIGIN_ORCHESTRATOR),
            )
            .await?;

        ctx.tracker.transition(ReplenishmentState::Completed)?;
        ctx.message = REPLENISHMENT_COMPLETED.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryCollaborators, InMemoryInventoryService};

    fn product(id: i64, stock: i64) -> Product {
        Product {
            id,
            name: format!("Product {id}"),
            category: "Test".to_string(),
            unit_price: 10.0,
            stock,
        }
    }

    fn setup(products: Vec<Product>) -> (ReplenishmentOrchestrator, InMemoryCollaborators) {
        let services = InMemoryCollaborators {
            inventory: InMemoryInventoryService::with_products(products),
            ..InMemoryCollaborators::default()
        };
        let orchestrator =
            ReplenishmentOrchestrator::new(services.collaborators(), SagaConfig::default());
        (orchestrator, services)
    }

    #[test]
    fn test_batch_tops_up_low_stock() {
        let catalog = vec![product(1, 3), product(2, 8), product(3, 5)];

        let batch = compute_replenishment_batch(&catalog, 5, 20);

        let lines: Vec<(i64, i64)> = batch.iter().map(|l| (l.product_id, l.quantity)).collect();
        assert_eq!(lines, vec![(1, 17), (3, 15)]);
        assert_eq!(batch[0].stock_at_read, 3);
    }

    #[test]
    fn test_batch_skips_non_positive_quantities() {
        let catalog = vec![product(1, 3), product(2, 4)];

        assert!(compute_replenishment_batch(&catalog, 5, 3).is_empty());
        assert_eq!(compute_replenishment_batch(&catalog, 5, 4).len(), 1);
    }

    #[test]
    fn test_batch_of_empty_catalog() {
        assert!(compute_replenishment_batch(&[], 5, 20).is_empty());
    }

    #[tokio::test]
    async fn test_restocks_to_target() {
        let (orchestrator, services) = setup(vec![product(1, 3), product(2, 8), product(3, 5)]);

        let report = orchestrator.run(None).await.unwrap();

        assert!(report.is_completed());
        assert_eq!(report.message, REPLENISHMENT_COMPLETED);
        assert_eq!(services.inventory.stock_of(1), Some(20));
        assert_eq!(services.inventory.stock_of(2), Some(8));
        assert_eq!(services.inventory.stock_of(3), Some(20));
        assert_eq!(services.ledger.purchase_count(), 1);
        assert_eq!(services.billing.invoice_count(), 1);
        assert_eq!(services.supplier.confirmation_count(), 1);
    }

    #[tokio::test]
    async fn test_nothing_to_replenish_makes_no_mutating_calls() {
        let (orchestrator, services) = setup(vec![product(1, 30), product(2, 8)]);

        let report = orchestrator.run(None).await.unwrap();

        assert_eq!(report.state, ReplenishmentState::NothingToReplenish);
        assert_eq!(report.message, NO_REPLENISHMENT_NEEDED);
        assert!(report.purchased.is_empty());
        assert_eq!(services.ledger.purchase_count(), 0);
        assert_eq!(services.billing.invoice_count(), 0);
        assert!(services.inventory.applied_deltas().is_empty());
        assert_eq!(services.supplier.confirmation_count(), 0);
    }

    #[tokio::test]
    async fn test_credit_failure_fails_run() {
        let (orchestrator, services) = setup(vec![product(1, 3)]);
        services.inventory.set_fail_on_apply(true);

        let report = orchestrator.run(None).await.unwrap();

        assert_eq!(report.state, ReplenishmentState::Failed);
        assert_eq!(report.failure.unwrap().step, Some("apply_stock_delta"));
        assert_eq!(services.supplier.confirmation_count(), 0);
    }
}
