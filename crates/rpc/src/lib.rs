//! JSON-RPC 2.0 over HTTP.
//!
//! The [`RpcClient`] makes one request/response call per invocation against a
//! named collaborator and classifies every failure as a timeout, an
//! unreachable peer, or a malformed response. The [`message`] types are shared
//! with the inbound server in the `api` crate.

pub mod client;
pub mod error;
pub mod message;

pub use client::RpcClient;
pub use error::{Result, RpcError};
pub use message::{ErrorObject, JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse};
