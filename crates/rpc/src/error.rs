use thiserror::Error;

/// Failure of a single collaborator call.
///
/// Every transport or decode problem of a call lands in exactly one of the
/// first three variants; callers never see raw HTTP or serde errors.
/// `ClientSetup` only comes out of [`crate::RpcClient::new`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// The call did not complete within its timeout budget.
    #[error("{collaborator}.{method} timed out")]
    Timeout {
        collaborator: String,
        method: String,
    },

    /// The collaborator could not be reached (refused, reset, DNS, ...).
    #[error("{collaborator} unreachable during {method}: {reason}")]
    Unreachable {
        collaborator: String,
        method: String,
        reason: String,
    },

    /// The collaborator answered, but not with the expected result.
    ///
    /// This covers undecodable bodies, missing fields, a mismatched `id`, and
    /// JSON-RPC `error` objects returned in place of a `result`.
    #[error("malformed response from {collaborator}.{method}: {reason}")]
    MalformedResponse {
        collaborator: String,
        method: String,
        reason: String,
    },

    /// The HTTP client for a collaborator could not be built.
    #[error("could not build HTTP client for {collaborator}: {reason}")]
    ClientSetup { collaborator: String, reason: String },
}

impl RpcError {
    /// Returns the collaborator the failed call was addressed to.
    pub fn collaborator(&self) -> &str {
        match self {
            RpcError::Timeout { collaborator, .. }
            | RpcError::Unreachable { collaborator, .. }
            | RpcError::MalformedResponse { collaborator, .. }
            | RpcError::ClientSetup { collaborator, .. } => collaborator,
        }
    }

    /// Returns the remote method of the failed call; empty for setup errors.
    pub fn method(&self) -> &str {
        match self {
            RpcError::Timeout { method, .. }
            | RpcError::Unreachable { method, .. }
            | RpcError::MalformedResponse { method, .. } => method,
            RpcError::ClientSetup { .. } => "",
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::Timeout { .. } => "timeout",
            RpcError::Unreachable { .. } => "unreachable",
            RpcError::MalformedResponse { .. } => "malformed_response",
            RpcError::ClientSetup { .. } => "client_setup",
        }
    }
}

/// Result type for RPC calls.
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_expose_call_site() {
        let err = RpcError::Unreachable {
            collaborator: "inventory".to_string(),
            method: "load_catalog".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.collaborator(), "inventory");
        assert_eq!(err.method(), "load_catalog");
        assert_eq!(err.kind(), "unreachable");
        assert_eq!(
            err.to_string(),
            "inventory unreachable during load_catalog: connection refused"
        );
    }

    #[test]
    fn timeout_display() {
        let err = RpcError::Timeout {
            collaborator: "billing".to_string(),
            method: "generate_invoice".to_string(),
        };
        assert_eq!(err.to_string(), "billing.generate_invoice timed out");
    }

    #[test]
    fn client_setup_has_no_method() {
        let err = RpcError::ClientSetup {
            collaborator: "ledger".to_string(),
            reason: "no TLS backend".to_string(),
        };
        assert_eq!(err.collaborator(), "ledger");
        assert_eq!(err.method(), "");
        assert_eq!(err.kind(), "client_setup");
    }
}
