//! Supplier service trait, RPC proxy and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::CartLine;
use rpc::RpcClient;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::CallTimeouts;
use crate::error::SagaError;

/// Supplier's confirmation that a purchase was received.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupplierConfirmation {
    #[serde(default, alias = "mensaje")]
    pub message: String,
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Trait for supplier operations.
#[async_trait]
pub trait SupplierService: Send + Sync {
    async fn confirm_receipt(
        &self,
        products: &[CartLine],
        origin: &str,
    ) -> Result<SupplierConfirmation, SagaError>;
}

/// Supplier proxy over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcSupplierService {
    client: RpcClient,
    timeouts: CallTimeouts,
}

impl RpcSupplierService {
    pub fn new(client: RpcClient, timeouts: CallTimeouts) -> Self {
        Self { client, timeouts }
    }
}

#[async_trait]
impl SupplierService for RpcSupplierService {
    async fn confirm_receipt(
        &self,
        products: &[CartLine],
        origin: &str,
    ) -> Result<SupplierConfirmation, SagaError> {
        let confirmation = self
            .client
            .call(
                "confirm_receipt",
                &json!({ "products": products, "origin": origin }),
                Some(self.timeouts.default),
            )
            .await?;
        Ok(confirmation)
    }
}

#[derive(Debug, Default)]
struct InMemorySupplierState {
    orders: Vec<Vec<CartLine>>,
    fail: bool,
}

/// In-memory supplier for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemorySupplierService {
    state: Arc<RwLock<InMemorySupplierState>>,
}

impl InMemorySupplierService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    pub fn confirmation_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }
}

#[async_trait]
impl SupplierService for InMemorySupplierService {
    async fn confirm_receipt(
        &self,
        products: &[CartLine],
        _origin: &str,
    ) -> Result<SupplierConfirmation, SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(SagaError::SupplierService(
                "Supplier unreachable".to_string(),
            ));
        }
        state.orders.push(products.to_vec());
        Ok(SupplierConfirmation {
            message: "Purchase confirmed by supplier".to_string(),
            order_id: Some(format!("PO-{:04}", state.orders.len())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_order_ids() {
        let supplier = InMemorySupplierService::new();
        let c1 = supplier.confirm_receipt(&[], "middleware").await.unwrap();
        let c2 = supplier.confirm_receipt(&[], "middleware").await.unwrap();
        assert_eq!(c1.order_id.as_deref(), Some("PO-0001"));
        assert_eq!(c2.order_id.as_deref(), Some("PO-0002"));
    }

    #[tokio::test]
    async fn test_fail_flag() {
        let supplier = InMemorySupplierService::new();
        supplier.set_fail(true);
        assert!(supplier.confirm_receipt(&[], "middleware").await.is_err());
        assert_eq!(supplier.confirmation_count(), 0);
    }
}
