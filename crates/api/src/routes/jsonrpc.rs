//! Inbound JSON-RPC endpoint that triggers saga runs.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use rpc::{JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse};
use saga::{AbortReason, ReplenishmentReport, RunFailure, SaleReport, SaleState};
use serde_json::{Map, Value, json};

use crate::AppState;
use crate::error::ApiError;

pub const RUN_SALE_FLOW: &str = "run_sale_flow";
pub const RUN_REPLENISHMENT_FLOW: &str = "run_replenishment_flow";

/// POST /rpc: dispatch one JSON-RPC request to an orchestrator.
///
/// Protocol errors and failed runs are reported in the JSON-RPC `error`
/// member; the HTTP status is always 200.
#[tracing::instrument(skip(state, body))]
pub async fn handle(State(state): State<Arc<AppState>>, body: Bytes) -> Json<JsonRpcResponse> {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return failure(Value::Null, ApiError::Parse(e.to_string())),
    };
    let id = raw.get("id").cloned().unwrap_or(Value::Null);

    let request = match parse_request(raw) {
        Ok(request) => request,
        Err(e) => return failure(id, e),
    };
    tracing::info!(method = %request.method, %id, "inbound request");

    match dispatch(&state, &request).await {
        Ok(result) => Json(JsonRpcResponse::success(id, result)),
        Err(e) => failure(id, e),
    }
}

fn failure(id: Value, error: ApiError) -> Json<JsonRpcResponse> {
    tracing::warn!(code = error.code(), error = %error, "request failed");
    Json(JsonRpcResponse::failure(id, error.into_error_object()))
}

fn parse_request(raw: Value) -> Result<JsonRpcRequest, ApiError> {
    if raw.is_array() {
        return Err(ApiError::InvalidRequest(
            "batch requests are not supported".to_string(),
        ));
    }
    let request: JsonRpcRequest = serde_json::from_value(raw)
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(ApiError::InvalidRequest(format!(
            "unsupported jsonrpc version {:?}",
            request.jsonrpc
        )));
    }
    Ok(request)
}

async fn dispatch(state: &AppState, request: &JsonRpcRequest) -> Result<Value, ApiError> {
    match request.method.as_str() {
        RUN_SALE_FLOW => {
            expect_no_params(&request.params)?;
            metrics::counter!("inbound_requests_total", "method" => RUN_SALE_FLOW).increment(1);
            let report = state.sale.run().await?;
            sale_result(report)
        }
        RUN_REPLENISHMENT_FLOW => {
            let origin = origin_param(&request.params)?;
            metrics::counter!("inbound_requests_total", "method" => RUN_REPLENISHMENT_FLOW)
                .increment(1);
            let report = state.replenishment.run(origin.as_deref()).await?;
            replenishment_result(report)
        }
        other => Err(ApiError::MethodNotFound(other.to_string())),
    }
}

fn expect_no_params(params: &Value) -> Result<(), ApiError> {
    match params {
        Value::Null => Ok(()),
        Value::Object(map) if map.is_empty() => Ok(()),
        Value::Array(items) if items.is_empty() => Ok(()),
        _ => Err(ApiError::InvalidParams(format!(
            "{RUN_SALE_FLOW} takes no parameters"
        ))),
    }
}

/// Reads the optional origin tag, by name or as the first positional param.
fn origin_param(params: &Value) -> Result<Option<String>, ApiError> {
    let origin = match params {
        Value::Null => None,
        Value::Object(map) => map.get("origin"),
        Value::Array(items) if items.len() <= 1 => items.first(),
        _ => {
            return Err(ApiError::InvalidParams(
                "expected {\"origin\": string} or [origin]".to_string(),
            ));
        }
    };
    match origin {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(origin)) => Ok(Some(origin.clone())),
        Some(_) => Err(ApiError::InvalidParams(
            "origin must be a string".to_string(),
        )),
    }
}

fn failure_data(run_id: String, state: String, failure: Option<&RunFailure>) -> Value {
    json!({
        "run_id": run_id,
        "state": state,
        "step": failure.and_then(|f| f.step),
        "class": failure.map(|f| f.class),
    })
}

fn with_degraded(mut result: Map<String, Value>, degraded: Vec<&'static str>) -> Value {
    if !degraded.is_empty() {
        result.insert("degraded".to_string(), json!(degraded));
    }
    Value::Object(result)
}

fn sale_result(report: SaleReport) -> Result<Value, ApiError> {
    match report.state {
        SaleState::Completed => Ok(with_degraded(Map::new(), report.degraded_steps())),
        SaleState::AbortedNoStock => {
            let mut result = Map::new();
            result.insert("shortages".to_string(), json!(report.shortages));
            if let Some(AbortReason::ValidationUnavailable { error }) = &report.abort_reason {
                result.insert("reason".to_string(), json!(error));
            }
            Ok(Value::Object(result))
        }
        state => {
            let failure = report.failure.as_ref();
            let message = match failure {
                Some(f) => format!("sale failed: {}", f.message),
                None => "sale failed".to_string(),
            };
            Err(ApiError::SagaFailed {
                message,
                data: failure_data(report.run_id.to_string(), state.to_string(), failure),
            })
        }
    }
}

fn replenishment_result(report: ReplenishmentReport) -> Result<Value, ApiError> {
    if let Some(failure) = &report.failure {
        return Err(ApiError::SagaFailed {
            message: format!("replenishment failed: {}", failure.message),
            data: failure_data(
                report.run_id.to_string(),
                report.state.to_string(),
                Some(failure),
            ),
        });
    }

    let mut result = Map::new();
    result.insert("message".to_string(), json!(report.message));
    result.insert("purchased".to_string(), json!(report.purchased));
    Ok(with_degraded(result, report.degraded_steps()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_param_shapes() {
        assert_eq!(origin_param(&Value::Null).unwrap(), None);
        assert_eq!(origin_param(&json!({})).unwrap(), None);
        assert_eq!(
            origin_param(&json!({"origin": "web"})).unwrap(),
            Some("web".to_string())
        );
        assert_eq!(
            origin_param(&json!(["web"])).unwrap(),
            Some("web".to_string())
        );
        assert_eq!(origin_param(&json!([])).unwrap(), None);
        assert!(origin_param(&json!({"origin": 7})).is_err());
        assert!(origin_param(&json!(["a", "b"])).is_err());
        assert!(origin_param(&json!("web")).is_err());
    }

    #[test]
    fn test_sale_takes_no_params() {
        assert!(expect_no_params(&Value::Null).is_ok());
        assert!(expect_no_params(&json!({})).is_ok());
        assert!(expect_no_params(&json!([])).is_ok());
        assert!(expect_no_params(&json!({"cart": []})).is_err());
    }

    #[test]
    fn test_parse_request_rejects_batches_and_versions() {
        assert!(matches!(
            parse_request(json!([])),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            parse_request(json!({"jsonrpc": "1.0", "method": "run_sale_flow", "id": 1})),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            parse_request(json!({"jsonrpc": "2.0", "id": 1})),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(parse_request(json!({"jsonrpc": "2.0", "method": "run_sale_flow"})).is_ok());
    }
}
