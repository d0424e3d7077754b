// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! JSON-RPC transport to the ledger node.
//!
//! The [`LedgerRpc`] trait is the seam between protocol logic and the wire;
//! tests substitute in-process implementations.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::types::{CoinObject, LedgerError, LedgerSignature, TransactionResult};

/// Raw ledger operations, one method per RPC call.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Fetch all coin objects of `coin_type` owned by `owner`.
    async fn owned_coins(&self, owner: &str, coin_type: &str)
        -> Result<Vec<CoinObject>, LedgerError>;

    /// Fetch the current content of a single object by id.
    async fn get_object(&self, object_id: &str) -> Result<CoinObject, LedgerError>;

    /// Execute a transaction with the given signature set over the exact
    /// `tx_bytes`.
    async fn execute(
        &self,
        tx_bytes: &[u8],
        signatures: &[LedgerSignature],
    ) -> Result<TransactionResult, LedgerError>;

    /// Look up a previously executed transaction by digest.
    async fn get_transaction(&self, digest: &str) -> Result<TransactionResult, LedgerError>;
}

/// HTTP JSON-RPC 2.0 implementation.
pub struct HttpLedgerRpc {
    endpoint: url::Url,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl HttpLedgerRpc {
    pub fn new(rpc_url: &str, http: reqwest::Client) -> Result<Self, LedgerError> {
        let endpoint: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| LedgerError::InvalidRpcUrl(e.to_string()))?;
        Ok(Self { endpoint, http })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, LedgerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Rpc(format!("{method}: {e}")))?;

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::Rpc(format!("{method}: bad response: {e}")))?;

        if let Some(err) = body.error {
            return Err(classify_rpc_error(method, err.code, &err.message));
        }

        body.result
            .ok_or_else(|| LedgerError::Rpc(format!("{method}: empty result")))
    }
}

/// Map RPC-level failures onto the error taxonomy. The version-consumption
/// race is the only transient class.
fn classify_rpc_error(method: &str, code: i64, message: &str) -> LedgerError {
    if message.contains("not available for consumption")
        || message.contains("object version unavailable")
    {
        LedgerError::ObjectVersionUnavailable(message.to_string())
    } else {
        LedgerError::Rpc(format!("{method}: [{code}] {message}"))
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn owned_coins(
        &self,
        owner: &str,
        coin_type: &str,
    ) -> Result<Vec<CoinObject>, LedgerError> {
        self.call("ledger_getOwnedCoins", json!([owner, coin_type]))
            .await
    }

    async fn get_object(&self, object_id: &str) -> Result<CoinObject, LedgerError> {
        self.call("ledger_getObject", json!([object_id])).await
    }

    async fn execute(
        &self,
        tx_bytes: &[u8],
        signatures: &[LedgerSignature],
    ) -> Result<TransactionResult, LedgerError> {
        self.call(
            "ledger_executeTransaction",
            json!([hex::encode(tx_bytes), signatures]),
        )
        .await
    }

    async fn get_transaction(&self, digest: &str) -> Result<TransactionResult, LedgerError> {
        self.call("ledger_getTransaction", json!([digest])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_race_messages_classify_as_transient() {
        let err = classify_rpc_error(
            "ledger_executeTransaction",
            -32000,
            "Object 0xc1 version 12 is not available for consumption",
        );
        assert!(err.is_transient());
    }

    #[test]
    fn other_rpc_errors_are_fatal() {
        let err = classify_rpc_error("ledger_getObject", -32602, "invalid params");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("invalid params"));
    }

    #[test]
    fn invalid_rpc_url_is_rejected() {
        let result = HttpLedgerRpc::new("not a url", reqwest::Client::new());
        assert!(matches!(result, Err(LedgerError::InvalidRpcUrl(_))));
    }
}
