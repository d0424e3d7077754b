// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Ledger client facade.
//!
//! Thin wrapper over [`LedgerRpc`] exposing coin discovery, object reads,
//! dual-signed submission, and transaction lookup. Instances are shared via
//! [`ClientCache`], keyed by (endpoint, signer fingerprint) with an explicit
//! invalidation rule: invalidate on signer change.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use super::rpc::LedgerRpc;
use super::types::{
    CoinObject, ExecutionStatus, LedgerError, LedgerSignature, NetworkConfig, TransactionResult,
};

/// Ledger client facade.
pub struct LedgerClient {
    network: NetworkConfig,
    rpc: Arc<dyn LedgerRpc>,
}

impl LedgerClient {
    pub fn new(network: NetworkConfig, rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { network, rpc }
    }

    /// Discover all coin objects of `coin_type` owned by `owner`.
    pub async fn owned_coins(
        &self,
        owner: &str,
        coin_type: &str,
    ) -> Result<Vec<CoinObject>, LedgerError> {
        self.rpc.owned_coins(owner, coin_type).await
    }

    /// Fetch the current content of an object.
    pub async fn get_object(&self, object_id: &str) -> Result<CoinObject, LedgerError> {
        self.rpc.get_object(object_id).await
    }

    /// Submit a dual-signed transaction: the exact envelope bytes with the
    /// signature array `[user, sponsor]`.
    ///
    /// Only a `Success` effects status is treated as success. A returned
    /// digest with any other status is an error carrying the raw status
    /// detail.
    pub async fn execute_dual_signed(
        &self,
        tx_bytes: &[u8],
        user_signature: &LedgerSignature,
        sponsor_signature: &LedgerSignature,
    ) -> Result<TransactionResult, LedgerError> {
        let signatures = [user_signature.clone(), sponsor_signature.clone()];
        let result = self.rpc.execute(tx_bytes, &signatures).await?;

        match &result.status {
            ExecutionStatus::Success => Ok(result),
            ExecutionStatus::Failure(status) => Err(LedgerError::ExecutionFailed {
                digest: result.digest.clone(),
                status: status.clone(),
            }),
        }
    }

    /// Submit a transaction signed by a single party (operator-initiated
    /// transfers such as reward mints).
    pub async fn execute_single_signed(
        &self,
        tx_bytes: &[u8],
        signature: &LedgerSignature,
    ) -> Result<TransactionResult, LedgerError> {
        let result = self.rpc.execute(tx_bytes, &[signature.clone()]).await?;

        match &result.status {
            ExecutionStatus::Success => Ok(result),
            ExecutionStatus::Failure(status) => Err(LedgerError::ExecutionFailed {
                digest: result.digest.clone(),
                status: status.clone(),
            }),
        }
    }

    /// Look up a transaction by digest.
    pub async fn get_transaction(&self, digest: &str) -> Result<TransactionResult, LedgerError> {
        self.rpc.get_transaction(digest).await
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Explorer link for a settled transaction (audit/debug only).
    pub fn explorer_tx_url(&self, digest: &str) -> String {
        format!("{}/tx/{}", self.network.explorer_url, digest)
    }
}

/// Cache key: endpoint plus signer fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    endpoint: String,
    signer_fingerprint: String,
}

/// Explicit client cache, passed by reference where needed rather than a
/// module-global singleton.
pub struct ClientCache {
    inner: Mutex<LruCache<ClientKey, Arc<LedgerClient>>>,
}

impl ClientCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity >= 1");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get the cached client for (endpoint, signer), building it on miss.
    pub fn get_or_create<F>(
        &self,
        endpoint: &str,
        signer_fingerprint: &str,
        build: F,
    ) -> Arc<LedgerClient>
    where
        F: FnOnce() -> LedgerClient,
    {
        let key = ClientKey {
            endpoint: endpoint.to_string(),
            signer_fingerprint: signer_fingerprint.to_string(),
        };

        let mut cache = self.inner.lock().expect("client cache poisoned");
        if let Some(client) = cache.get(&key) {
            return Arc::clone(client);
        }

        let client = Arc::new(build());
        cache.put(key, Arc::clone(&client));
        client
    }

    /// Invalidation rule: drop every entry built for a signer. Must be
    /// called when the operator key rotates.
    pub fn invalidate_signer(&self, signer_fingerprint: &str) {
        let mut cache = self.inner.lock().expect("client cache poisoned");
        let stale: Vec<ClientKey> = cache
            .iter()
            .filter(|(key, _)| key.signer_fingerprint == signer_fingerprint)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }
}
