//! Cart capture: the storefront that shows the catalog to a customer and
//! returns their selection.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{CartLine, Product};
use rpc::RpcClient;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::CallTimeouts;
use crate::error::SagaError;
use crate::services::billing::Invoice;
use crate::services::transport::Shipment;

/// What the storefront receives once a sale has gone through.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvoiceDelivery {
    pub invoice: Option<Invoice>,
    pub shipment: Option<Shipment>,
}

#[derive(Deserialize)]
struct CapturedCart {
    products: Vec<CartLine>,
}

/// Trait for the storefront side of a sale.
#[async_trait]
pub trait CartCapture: Send + Sync {
    /// Presents the catalog and waits for the customer's cart.
    ///
    /// Implementations do not bound the wait; the sale orchestrator does.
    async fn capture_cart(
        &self,
        catalog: &[Product],
        origin: &str,
    ) -> Result<Vec<CartLine>, SagaError>;

    /// Hands the invoice and shipment back to the customer.
    async fn deliver_invoice(
        &self,
        delivery: &InvoiceDelivery,
        origin: &str,
    ) -> Result<(), SagaError>;
}

/// Storefront proxy over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcCartCapture {
    client: RpcClient,
    timeouts: CallTimeouts,
}

impl RpcCartCapture {
    pub fn new(client: RpcClient, timeouts: CallTimeouts) -> Self {
        Self { client, timeouts }
    }
}

#[async_trait]
impl CartCapture for RpcCartCapture {
    async fn capture_cart(
        &self,
        catalog: &[Product],
        origin: &str,
    ) -> Result<Vec<CartLine>, SagaError> {
        let cart: CapturedCart = self
            .client
            .call(
                "capture_cart",
                &json!({ "products": catalog, "origin": origin }),
                None,
            )
            .await?;
        Ok(cart.products)
    }

    async fn deliver_invoice(
        &self,
        delivery: &InvoiceDelivery,
        origin: &str,
    ) -> Result<(), SagaError> {
        let _ack: Value = self
            .client
            .call(
                "deliver_invoice",
                &json!({
                    "invoice": delivery.invoice,
                    "shipment": delivery.shipment,
                    "origin": origin,
                }),
                Some(self.timeouts.default),
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    selection: Vec<(i64, i64)>,
    capture_delay: Option<Duration>,
    captures: usize,
    deliveries: Vec<InvoiceDelivery>,
    fail_on_capture: bool,
    fail_on_deliver: bool,
}

/// In-memory storefront with a scripted customer selection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartCapture {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the customer's selection as `(product_id, quantity)` pairs.
    pub fn with_selection(selection: Vec<(i64, i64)>) -> Self {
        let capture = Self::default();
        capture.set_selection(selection);
        capture
    }

    pub fn set_selection(&self, selection: Vec<(i64, i64)>) {
        self.state.write().unwrap().selection = selection;
    }

    /// Makes the customer take this long to answer.
    pub fn set_capture_delay(&self, delay: Duration) {
        self.state.write().unwrap().capture_delay = Some(delay);
    }

    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    pub fn set_fail_on_deliver(&self, fail: bool) {
        self.state.write().unwrap().fail_on_deliver = fail;
    }

    pub fn capture_count(&self) -> usize {
        self.state.read().unwrap().captures
    }

    pub fn deliveries(&self) -> Vec<InvoiceDelivery> {
        self.state.read().unwrap().deliveries.clone()
    }
}

#[async_trait]
impl CartCapture for InMemoryCartCapture {
    async fn capture_cart(
        &self,
        catalog: &[Product],
        _origin: &str,
    ) -> Result<Vec<CartLine>, SagaError> {
        let delay = {
            let mut state = self.state.write().unwrap();
            if state.fail_on_capture {
                return Err(SagaError::Storefront("Storefront offline".to_string()));
            }
            state.captures += 1;
            state.capture_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().unwrap();
        Ok(state
            .selection
            .iter()
            .filter_map(|&(id, quantity)| {
                catalog
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.to_cart_line(quantity))
            })
            .collect())
    }

    async fn deliver_invoice(
        &self,
        delivery: &InvoiceDelivery,
        _origin: &str,
    ) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_deliver {
            return Err(SagaError::Storefront("Storefront offline".to_string()));
        }
        state.deliveries.push(delivery.clone());
        Ok(())
    }
}
