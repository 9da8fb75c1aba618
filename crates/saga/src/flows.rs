//! Declarative step tables for the two sagas.
//!
//! The policy column is where the fatal/best-effort asymmetry between the
//! flows lives: invoicing is fatal for a sale but best-effort for a
//! replenishment.

use crate::state::{ReplenishmentState, SaleState};
use crate::step::StepDefinition;

/// Sale saga steps, in execution order.
pub mod sale {
    use super::*;

    pub const LOAD_CATALOG: StepDefinition<SaleState> =
        StepDefinition::fatal("load_catalog", SaleState::CatalogLoaded);
    pub const CAPTURE_CART: StepDefinition<SaleState> =
        StepDefinition::fatal("capture_cart", SaleState::CartCaptured);
    pub const RECORD_SALE: StepDefinition<SaleState> =
        StepDefinition::best_effort("record_sale", SaleState::SaleRecorded);
    /// Fatal, but a failure aborts with `AbortedNoStock` rather than `Failed`.
    pub const VALIDATE_STOCK: StepDefinition<SaleState> =
        StepDefinition::fatal("validate_stock", SaleState::StockValidated);
    pub const GENERATE_INVOICE: StepDefinition<SaleState> =
        StepDefinition::fatal("generate_invoice", SaleState::Invoiced);
    pub const DEBIT_STOCK: StepDefinition<SaleState> =
        StepDefinition::fatal("apply_stock_delta", SaleState::StockDebited);
    pub const FETCH_INVOICE: StepDefinition<SaleState> =
        StepDefinition::best_effort("fetch_latest_invoice", SaleState::InvoiceFetched);
    pub const REQUEST_SHIPMENT: StepDefinition<SaleState> =
        StepDefinition::best_effort("request_shipment", SaleState::Shipped);
    pub const DELIVER_INVOICE: StepDefinition<SaleState> =
        StepDefinition::best_effort("deliver_invoice", SaleState::Completed);

    pub const STEPS: &[StepDefinition<SaleState>] = &[
        LOAD_CATALOG,
        CAPTURE_CART,
        RECORD_SALE,
        VALIDATE_STOCK,
        GENERATE_INVOICE,
        DEBIT_STOCK,
        FETCH_INVOICE,
        REQUEST_SHIPMENT,
        DELIVER_INVOICE,
    ];
}

/// Replenishment saga steps, in execution order.
pub mod replenishment {
    use super::*;

    pub const LOAD_CATALOG: StepDefinition<ReplenishmentState> =
        StepDefinition::fatal("load_catalog", ReplenishmentState::CatalogLoaded);
    pub const RECORD_PURCHASE: StepDefinition<ReplenishmentState> =
        StepDefinition::best_effort("record_purchase", ReplenishmentState::PurchaseRecorded);
    pub const GENERATE_INVOICE: StepDefinition<ReplenishmentState> =
        StepDefinition::best_effort("generate_invoice", ReplenishmentState::Invoiced);
    pub const CREDIT_STOCK: StepDefinition<ReplenishmentState> =
        StepDefinition::fatal("apply_stock_delta", ReplenishmentState::StockCredited);
    pub const CONFIRM_RECEIPT: StepDefinition<ReplenishmentState> =
        StepDefinition::best_effort("confirm_receipt", ReplenishmentState::SupplierConfirmed);

    pub const STEPS: &[StepDefinition<ReplenishmentState>] = &[
        LOAD_CATALOG,
        RECORD_PURCHASE,
        GENERATE_INVOICE,
        CREDIT_STOCK,
        CONFIRM_RECEIPT,
    ];
}
