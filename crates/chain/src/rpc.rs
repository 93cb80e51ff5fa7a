//! JSON-RPC HTTP transport
//!
//! Thin wrapper over reqwest for the handful of `eth_*` methods the
//! gateway needs. No retries, no timeout of its own: those belong to the
//! caller and the HTTP client respectively.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{ChainError, Result};

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC transport bound to a single node URL.
pub struct RpcTransport {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one JSON-RPC request and return the `result` value.
    ///
    /// A JSON-RPC error object becomes `ChainError::Rpc` with the node's
    /// message preserved verbatim.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("rpc request id={} method={}", id, method);

        let body = RpcRequest { jsonrpc: "2.0", id, method, params };
        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(ChainError::Rpc { code: err.code, message: err.message });
        }
        response.result.ok_or_else(|| {
            ChainError::Decode(format!("{} returned neither result nor error", method))
        })
    }
}

/// Format a block number as a JSON-RPC quantity (`0x`-prefixed, no leading
/// zeros).
pub fn to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Parse a JSON-RPC quantity into a `u64`.
pub fn from_quantity(s: &str) -> Result<u64> {
    let stripped = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode(format!("quantity missing 0x prefix: {}", s)))?;
    u64::from_str_radix(stripped, 16)
        .map_err(|_| ChainError::Decode(format!("invalid quantity: {}", s)))
}

/// Decode a `0x`-prefixed hex blob into bytes.
pub fn from_hex_blob(s: &str) -> Result<Vec<u8>> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|_| ChainError::Decode(format!("invalid hex data: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_round_trip() {
        for v in [0u64, 1, 255, 50_000, u64::MAX] {
            assert_eq!(from_quantity(&to_quantity(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_quantity_format() {
        assert_eq!(to_quantity(0), "0x0");
        assert_eq!(to_quantity(100_000), "0x186a0");
    }

    #[test]
    fn test_from_quantity_rejects_missing_prefix() {
        assert!(from_quantity("186a0").is_err());
    }

    #[test]
    fn test_from_quantity_rejects_garbage() {
        assert!(from_quantity("0xzz").is_err());
    }

    #[test]
    fn test_from_hex_blob() {
        assert_eq!(from_hex_blob("0x00ff").unwrap(), vec![0x00, 0xff]);
        assert!(from_hex_blob("0x0f0").is_err());
    }
}
