//! Ledger service trait, RPC proxy and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::CartLine;
use rpc::RpcClient;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::CallTimeouts;
use crate::error::SagaError;

/// Acknowledgement returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerReceipt {
    #[serde(default, alias = "Message", alias = "mensaje")]
    pub message: String,
}

/// Trait for recording sales and purchases in the ledger.
#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn record_sale(&self, cart: &[CartLine], origin: &str)
    -> Result<LedgerReceipt, SagaError>;

    async fn record_purchase(
        &self,
        products: &[CartLine],
        origin: &str,
    ) -> Result<LedgerReceipt, SagaError>;
}

/// Ledger proxy over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcLedgerService {
    client: RpcClient,
    timeouts: CallTimeouts,
}

impl RpcLedgerService {
    pub fn new(client: RpcClient, timeouts: CallTimeouts) -> Self {
        Self { client, timeouts }
    }
}

#[async_trait]
impl LedgerService for RpcLedgerService {
    async fn record_sale(
        &self,
        cart: &[CartLine],
        origin: &str,
    ) -> Result<LedgerReceipt, SagaError> {
        let receipt = self
            .client
            .call(
                "record_sale",
                &json!({ "cart": cart, "origin": origin }),
                Some(self.timeouts.default),
            )
            .await?;
        Ok(receipt)
    }

    async fn record_purchase(
        &self,
        products: &[CartLine],
        origin: &str,
    ) -> Result<LedgerReceipt, SagaError> {
        let receipt = self
            .client
            .call(
                "record_purchase",
                &json!({ "products": products, "origin": origin }),
                Some(self.timeouts.default),
            )
            .await?;
        Ok(receipt)
    }
}

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    sales: Vec<Vec<CartLine>>,
    purchases: Vec<Vec<CartLine>>,
    fail: bool,
}

/// In-memory ledger for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerService {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryLedgerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the ledger to reject every recording.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    pub fn sale_count(&self) -> usize {
        self.state.read().unwrap().sales.len()
    }

    pub fn purchase_count(&self) -> usize {
        self.state.read().unwrap().purchases.len()
    }

    /// Returns the most recently recorded purchase batch.
    pub fn last_purchase(&self) -> Option<Vec<CartLine>> {
        self.state.read().unwrap().purchases.last().cloned()
    }
}

#[async_trait]
impl LedgerService for InMemoryLedgerService {
    async fn record_sale(
        &self,
        cart: &[CartLine],
        _origin: &str,
    ) -> Result<LedgerReceipt, SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(SagaError::LedgerService("Ledger unavailable".to_string()));
        }
        state.sales.push(cart.to_vec());
        Ok(LedgerReceipt {
            message: "Sale recorded".to_string(),
        })
    }

    async fn record_purchase(
        &self,
        products: &[CartLine],
        _origin: &str,
    ) -> Result<LedgerReceipt, SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(SagaError::LedgerService("Ledger unavailable".to_string()));
        }
        state.purchases.push(products.to_vec());
        Ok(LedgerReceipt {
            message: "Purchase recorded".to_string(),
        })
    }
}
