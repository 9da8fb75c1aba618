//! Transport service trait, RPC proxy and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rpc::RpcClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::CallTimeouts;
use crate::error::SagaError;
use crate::services::billing::Invoice;

/// Shipment assigned by transport.
///
/// Every field is optional; anything else transport sends back is kept in
/// `extra` and forwarded with the invoice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shipment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Trait for transport operations.
#[async_trait]
pub trait TransportService: Send + Sync {
    /// Requests a shipment for the invoiced goods. `None` means billing had
    /// no invoice to hand over.
    async fn request_shipment(
        &self,
        invoice: Option<&Invoice>,
        origin: &str,
    ) -> Result<Shipment, SagaError>;
}

/// Transport proxy over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcTransportService {
    client: RpcClient,
    timeouts: CallTimeouts,
}

impl RpcTransportService {
    pub fn new(client: RpcClient, timeouts: CallTimeouts) -> Self {
        Self { client, timeouts }
    }
}

#[async_trait]
impl TransportService for RpcTransportService {
    async fn request_shipment(
        &self,
        invoice: Option<&Invoice>,
        origin: &str,
    ) -> Result<Shipment, SagaError> {
        let shipment = self
            .client
            .call(
                "request_shipment",
                &json!({ "invoice": invoice, "origin": origin }),
                Some(self.timeouts.default),
            )
            .await?;
        Ok(shipment)
    }
}

#[derive(Debug, Default)]
struct InMemoryTransportState {
    shipments: Vec<(Option<Invoice>, Shipment)>,
    fail: bool,
}

/// In-memory transport for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransportService {
    state: Arc<RwLock<InMemoryTransportState>>,
}

impl InMemoryTransportService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    pub fn shipment_count(&self) -> usize {
        self.state.read().unwrap().shipments.len()
    }

    /// Returns the invoice the most recent shipment was requested with.
    pub fn last_invoice(&self) -> Option<Invoice> {
        self.state
            .read()
            .unwrap()
            .shipments
            .last()
            .and_then(|(invoice, _)| invoice.clone())
    }
}

#[async_trait]
impl TransportService for InMemoryTransportService {
    async fn request_shipment(
        &self,
        invoice: Option<&Invoice>,
        _origin: &str,
    ) -> Result<Shipment, SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(SagaError::TransportService(
                "No carrier available".to_string(),
            ));
        }

        let shipment = Shipment {
            service: Some("standard".to_string()),
            eta: Some("3 business days".to_string()),
            cost: Some(0.0),
            tracking_id: Some(format!("TRACK-{:04}", state.shipments.len() + 1)),
            extra: Map::new(),
        };
        state.shipments.push((invoice.cloned(), shipment.clone()));
        Ok(shipment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_tracking_ids() {
        let transport = InMemoryTransportService::new();
        let invoice = Invoice(json!({"total": 10}));

        let s1 = transport
            .request_shipment(Some(&invoice), "orchestrator")
            .await
            .unwrap();
        let s2 = transport.request_shipment(None, "orchestrator").await.unwrap();

        assert_eq!(s1.tracking_id.as_deref(), Some("TRACK-0001"));
        assert_eq!(s2.tracking_id.as_deref(), Some("TRACK-0002"));
        assert_eq!(transport.shipment_count(), 2);
        assert_eq!(transport.last_invoice(), None);
    }

    #[test]
    fn test_shipment_keeps_unknown_fields() {
        let shipment: Shipment = serde_json::from_value(json!({
            "mensaje": "arrives in 3 business days"
        }))
        .unwrap();
        assert_eq!(shipment.tracking_id, None);
        assert_eq!(shipment.extra["mensaje"], "arrives in 3 business days");

        let back = serde_json::to_value(&shipment).unwrap();
        assert_eq!(back, json!({"mensaje": "arrives in 3 business days"}));
    }
}
