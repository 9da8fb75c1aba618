//! Saga orchestration for the showroom's sale and replenishment flows.
//!
//! Each flow is a fixed sequence of calls to remote collaborators
//! (inventory, storefront, ledger, billing, transport, supplier). Steps are
//! tagged fatal or best-effort in [`flows`]; a fatal failure ends the run in
//! its failure state, a best-effort failure is recorded and the run goes on.
//! Nothing is compensated.
//!
//! The sale flow:
//! 1. Load the catalog
//! 2. Capture the customer's cart
//! 3. Record the sale in the ledger
//! 4. Validate stock (shortage or validation failure aborts)
//! 5. Generate the invoice
//! 6. Debit stock
//! 7. Fetch the latest invoice, request shipment, deliver the invoice
//!
//! The replenishment flow tops up every low-stock product to the target
//! level: ledger, invoice, stock credit, supplier confirmation.

pub mod config;
pub mod context;
pub mod error;
pub mod flows;
pub mod replenishment;
pub mod report;
pub mod sale;
pub mod services;
pub mod state;
pub mod step;

pub use config::{CallTimeouts, Endpoints, SagaConfig};
pub use context::{CancelHandle, CancelSignal, StepTracker, cancellation};
pub use error::{FailureClass, SagaError};
pub use replenishment::{ReplenishmentOrchestrator, compute_replenishment_batch};
pub use report::{AbortReason, ReplenishmentReport, RunFailure, SaleReport};
pub use sale::SaleOrchestrator;
pub use services::{Collaborators, InMemoryCollaborators};
pub use state::{FlowState, ReplenishmentState, SaleState};
pub use step::{StepDefinition, StepOutcome, StepPolicy, StepRecord};
