//! Saga error types.

use std::time::Duration;

use rpc::RpcError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during a saga run.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A collaborator call failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Inventory service error.
    #[error("Inventory service error: {0}")]
    InventoryService(String),

    /// Ledger service error.
    #[error("Ledger service error: {0}")]
    LedgerService(String),

    /// Billing service error.
    #[error("Billing service error: {0}")]
    BillingService(String),

    /// Transport service error.
    #[error("Transport service error: {0}")]
    TransportService(String),

    /// Supplier service error.
    #[error("Supplier service error: {0}")]
    SupplierService(String),

    /// Storefront (cart capture) error.
    #[error("Storefront error: {0}")]
    Storefront(String),

    /// The customer did not return a cart within the configured wait.
    #[error("Cart capture timed out after {0:?}")]
    CartCaptureTimedOut(Duration),

    /// The run was cancelled while waiting for the customer's cart.
    #[error("Cart capture cancelled")]
    CartCaptureCancelled,

    /// The captured cart has no line with a positive quantity.
    #[error("Cart contains no lines with a positive quantity")]
    EmptyCart,

    /// A flow attempted a state transition its state machine forbids.
    #[error("Invalid {flow} transition: {from} -> {to}")]
    InvalidTransition {
        flow: &'static str,
        from: String,
        to: String,
    },

    /// A best-effort step was used where the flow needs its result.
    #[error("Step '{step}' is best-effort but its result is required")]
    PolicyMismatch { step: &'static str },
}

impl SagaError {
    /// Returns true for errors that reveal a bug in a flow definition rather
    /// than a collaborator problem.
    pub fn is_flow_defect(&self) -> bool {
        matches!(
            self,
            SagaError::InvalidTransition { .. } | SagaError::PolicyMismatch { .. }
        )
    }

    /// Classifies the error for reporting.
    pub fn class(&self) -> FailureClass {
        match self {
            SagaError::Rpc(RpcError::Timeout { .. }) | SagaError::CartCaptureTimedOut(_) => {
                FailureClass::Timeout
            }
            SagaError::Rpc(RpcError::Unreachable { .. } | RpcError::ClientSetup { .. })
            | SagaError::InventoryService(_)
            | SagaError::LedgerService(_)
            | SagaError::BillingService(_)
            | SagaError::TransportService(_)
            | SagaError::SupplierService(_)
            | SagaError::Storefront(_) => FailureClass::Transport,
            SagaError::Rpc(RpcError::MalformedResponse { .. })
            | SagaError::InvalidTransition { .. }
            | SagaError::PolicyMismatch { .. } => FailureClass::Protocol,
            SagaError::CartCaptureCancelled | SagaError::EmptyCart => FailureClass::Business,
        }
    }
}

/// Coarse failure taxonomy surfaced in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Connection refused, reset, or collaborator unavailable.
    Transport,
    /// A call exceeded its time budget.
    Timeout,
    /// Malformed or unexpected response.
    Protocol,
    /// A business rule stopped the run.
    Business,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Transport => "transport",
            FailureClass::Timeout => "timeout",
            FailureClass::Protocol => "protocol",
            FailureClass::Business => "business",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
