//! API error types with JSON-RPC error mapping.

use rpc::ErrorObject;
use saga::SagaError;
use serde_json::Value;
use thiserror::Error;

/// API-level error type that maps to a JSON-RPC error object.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The body was not valid JSON.
    #[error("Parse error: {0}")]
    Parse(String),
    /// Valid JSON, but not a JSON-RPC 2.0 request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// No such inbound method.
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    /// The method exists but its params are unusable.
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    /// A saga run ended in its failure state.
    #[error("{message}")]
    SagaFailed { message: String, data: Value },
    /// The orchestrator itself misbehaved.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            ApiError::Parse(_) => ErrorObject::PARSE_ERROR,
            ApiError::InvalidRequest(_) => ErrorObject::INVALID_REQUEST,
            ApiError::MethodNotFound(_) => ErrorObject::METHOD_NOT_FOUND,
            ApiError::InvalidParams(_) => ErrorObject::INVALID_PARAMS,
            ApiError::SagaFailed { .. } => ErrorObject::SAGA_FAILED,
            ApiError::Internal(_) => ErrorObject::INTERNAL_ERROR,
        }
    }

    pub fn into_error_object(self) -> ErrorObject {
        let code = self.code();
        match self {
            ApiError::SagaFailed { message, data } => ErrorObject::new(code, message).with_data(data),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                ErrorObject::new(code, format!("Internal error: {msg}"))
            }
            other => ErrorObject::new(code, other.to_string()),
        }
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
