//! Collaborator traits, their JSON-RPC proxies, and in-memory implementations.

pub mod billing;
pub mod inventory;
pub mod ledger;
pub mod storefront;
pub mod supplier;
pub mod transport;

use std::sync::Arc;

use rpc::RpcClient;

pub use billing::{BillingService, InMemoryBillingService, Invoice, RpcBillingService};
pub use inventory::{
    AppliedDelta, InMemoryInventoryService, InventoryService, RpcInventoryService, Shortage,
    StockUpdate, StockValidation,
};
pub use ledger::{InMemoryLedgerService, LedgerReceipt, LedgerService, RpcLedgerService};
pub use storefront::{CartCapture, InMemoryCartCapture, InvoiceDelivery, RpcCartCapture};
pub use supplier::{
    InMemorySupplierService, RpcSupplierService, SupplierConfirmation, SupplierService,
};
pub use transport::{InMemoryTransportService, RpcTransportService, Shipment, TransportService};

use crate::config::{CallTimeouts, Endpoints};

/// The set of collaborators a saga run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub inventory: Arc<dyn InventoryService>,
    pub storefront: Arc<dyn CartCapture>,
    pub ledger: Arc<dyn LedgerService>,
    pub billing: Arc<dyn BillingService>,
    pub transport: Arc<dyn TransportService>,
    pub supplier: Arc<dyn SupplierService>,
}

impl Collaborators {
    /// Wires JSON-RPC proxies for every collaborator.
    pub fn over_rpc(endpoints: &Endpoints, timeouts: CallTimeouts) -> rpc::Result<Self> {
        Ok(Self {
            inventory: Arc::new(RpcInventoryService::new(
                RpcClient::new("inventory", &endpoints.inventory)?,
                timeouts,
            )),
            storefront: Arc::new(RpcCartCapture::new(
                RpcClient::new("storefront", &endpoints.storefront)?,
                timeouts,
            )),
            ledger: Arc::new(RpcLedgerService::new(
                RpcClient::new("ledger", &endpoints.ledger)?,
                timeouts,
            )),
            billing: Arc::new(RpcBillingService::new(
                RpcClient::new("billing", &endpoints.billing)?,
                timeouts,
            )),
            transport: Arc::new(RpcTransportService::new(
                RpcClient::new("transport", &endpoints.transport)?,
                timeouts,
            )),
            supplier: Arc::new(RpcSupplierService::new(
                RpcClient::new("supplier", &endpoints.supplier)?,
                timeouts,
            )),
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// In-memory collaborators plus handles to inspect and script them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollaborators {
    pub inventory: InMemoryInventoryService,
    pub storefront: InMemoryCartCapture,
    pub ledger: InMemoryLedgerService,
    pub billing: InMemoryBillingService,
    pub transport: InMemoryTransportService,
    pub supplier: InMemorySupplierService,
}

impl InMemoryCollaborators {
    /// In-memory collaborators over the showroom catalog with no cart scripted.
    pub fn new() -> Self {
        Self {
            inventory: InMemoryInventoryService::with_showroom_catalog(),
            ..Self::default()
        }
    }

    /// Type-erased view sharing state with these handles.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            inventory: Arc::new(self.inventory.clone()),
            storefront: Arc::new(self.storefront.clone()),
            ledger: Arc::new(self.ledger.clone()),
            billing: Arc::new(self.billing.clone()),
            transport: Arc::new(self.transport.clone()),
            supplier: Arc::new(self.supplier.clone()),
        }
    }
}
