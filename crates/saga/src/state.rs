//! Saga state machines.
//!
//! Each state names the last milestone a run has passed. A best-effort step
//! that degraded still advances the state; only fatal failures leave the
//! happy path.

use serde::{Deserialize, Serialize};

/// Behaviour shared by the sale and replenishment state machines.
pub trait FlowState: Copy + PartialEq + std::fmt::Display + Send + Sync + 'static {
    /// Flow name used in logs, metrics and errors.
    const FLOW: &'static str;

    /// The failure terminal state.
    const FAILED: Self;

    /// Returns true if this is a terminal state.
    fn is_terminal(&self) -> bool;

    /// Returns true if the machine allows moving from `self` to `to`.
    fn can_transition_to(&self, to: Self) -> bool;
}

/// The state of a sale run.
///
/// State transitions:
/// ```text
/// NotStarted ──► CatalogLoaded ──► CartCaptured ──► SaleRecorded ──► StockValidated ──► Invoiced
///                                                       │                  │               │
///                                                       └──► AbortedNoStock ◄┘               ▼
/// Completed ◄── Shipped ◄── InvoiceFetched ◄────────────────────────────────────────── StockDebited
///
/// any non-terminal state ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleState {
    #[default]
    NotStarted,
    CatalogLoaded,
    CartCaptured,
    SaleRecorded,
    StockValidated,
    Invoiced,
    StockDebited,
    InvoiceFetched,
    Shipped,
    /// Terminal: the sale went through.
    Completed,
    /// Terminal: validation rejected the cart or could not be reached.
    AbortedNoStock,
    /// Terminal: a fatal step failed.
    Failed,
}

impl SaleState {
    /// The next state on the happy path, if any.
    pub fn successor(&self) -> Option<SaleState> {
        use SaleState::*;
        match self {
            NotStarted => Some(CatalogLoaded),
            CatalogLoaded => Some(CartCaptured),
            CartCaptured => Some(SaleRecorded),
            SaleRecorded => Some(StockValidated),
            StockValidated => Some(Invoiced),
            Invoiced => Some(StockDebited),
            StockDebited => Some(InvoiceFetched),
            InvoiceFetched => Some(Shipped),
            Shipped => Some(Completed),
            Completed | AbortedNoStock | Failed => None,
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleState::NotStarted => "NOT_STARTED",
            SaleState::CatalogLoaded => "CATALOG_LOADED",
            SaleState::CartCaptured => "CART_CAPTURED",
            SaleState::SaleRecorded => "SALE_RECORDED",
            SaleState::StockValidated => "STOCK_VALIDATED",
            SaleState::Invoiced => "INVOICED",
            SaleState::StockDebited => "STOCK_DEBITED",
            SaleState::InvoiceFetched => "INVOICE_FETCHED",
            SaleState::Shipped => "SHIPPED",
            SaleState::Completed => "COMPLETED",
            SaleState::AbortedNoStock => "ABORTED_NO_STOCK",
            SaleState::Failed => "FAILED",
        }
    }
}

impl FlowState for SaleState {
    const FLOW: &'static str = "sale";
    const FAILED: Self = SaleState::Failed;

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            SaleState::Completed | SaleState::AbortedNoStock | SaleState::Failed
        )
    }

    fn can_transition_to(&self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            SaleState::Failed => true,
            SaleState::AbortedNoStock => {
                matches!(self, SaleState::SaleRecorded | SaleState::StockValidated)
            }
            _ => self.successor() == Some(to),
        }
    }
}

impl std::fmt::Display for SaleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a replenishment run.
///
/// State transitions:
/// ```text
/// NotStarted ──► CatalogLoaded ──┬──► NothingToReplenish
///                                └──► BatchComputed ──► PurchaseRecorded ──► Invoiced
///                                     ──► StockCredited ──► SupplierConfirmed ──► Completed
///
/// any non-terminal state ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplenishmentState {
    #[default]
    NotStarted,
    CatalogLoaded,
    BatchComputed,
    PurchaseRecorded,
    Invoiced,
    StockCredited,
    SupplierConfirmed,
    /// Terminal: stock was purchased.
    Completed,
    /// Terminal: no product was at or below the threshold.
    NothingToReplenish,
    /// Terminal: a fatal step failed.
    Failed,
}

impl ReplenishmentState {
    /// The next state on the happy path, if any.
    pub fn successor(&self) -> Option<ReplenishmentState> {
        use ReplenishmentState::*;
        match self {
            NotStarted => Some(CatalogLoaded),
            CatalogLoaded => Some(BatchComputed),
            BatchComputed => Some(PurchaseRecorded),
            PurchaseRecorded => Some(Invoiced),
            Invoiced => Some(StockCredited),
            StockCredited => Some(SupplierConfirmed),
            SupplierConfirmed => Some(Completed),
            Completed | NothingToReplenish | Failed => None,
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplenishmentState::NotStarted => "NOT_STARTED",
            ReplenishmentState::CatalogLoaded => "CATALOG_LOADED",
            ReplenishmentState::BatchComputed => "BATCH_COMPUTED",
            ReplenishmentState::PurchaseRecorded => "PURCHASE_RECORDED",
            ReplenishmentState::Invoiced => "INVOICED",
            ReplenishmentState::StockCredited => "STOCK_CREDITED",
            ReplenishmentState::SupplierConfirmed => "SUPPLIER_CONFIRMED",
            ReplenishmentState::Completed => "COMPLETED",
            ReplenishmentState::NothingToReplenish => "NOTHING_TO_REPLENISH",
            ReplenishmentState::Failed => "FAILED",
        }
    }
}

impl FlowState for ReplenishmentState {
    const FLOW: &'static str = "replenishment";
    const FAILED: Self = ReplenishmentState::Failed;

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReplenishmentState::Completed
                | ReplenishmentState::NothingToReplenish
                | ReplenishmentState::Failed
        )
    }

    fn can_transition_to(&self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            ReplenishmentState::Failed => true,
            ReplenishmentState::NothingToReplenish => {
                matches!(self, ReplenishmentState::CatalogLoaded)
            }
            _ => self.successor() == Some(to),
        }
    }
}

impl std::fmt::Display for ReplenishmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
