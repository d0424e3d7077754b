// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Ledger types and constants.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Ledger network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Testnet configuration.
pub const LEDGER_TESTNET: NetworkConfig = NetworkConfig {
    name: "testnet",
    explorer_url: "https://testnet.explorer.diarybeast.app",
};

/// Mainnet configuration.
pub const LEDGER_MAINNET: NetworkConfig = NetworkConfig {
    name: "mainnet",
    explorer_url: "https://explorer.diarybeast.app",
};

/// Reference to a ledger object at a specific version.
///
/// Objects are replace-on-write; a stale version in a submitted transaction
/// fails atomically at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ObjectRef {
    pub object_id: String,
    pub version: u64,
    pub digest: String,
}

/// An owned coin object of some token type.
///
/// An address may own several coin objects of the same type at once; its
/// balance is the sum over all of them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CoinObject {
    #[serde(flatten)]
    pub object_ref: ObjectRef,
    pub owner: String,
    pub coin_type: String,
    /// Balance in base units (9 fractional decimal digits).
    pub balance: u64,
}

/// Effects status reported by the ledger after execution.
///
/// A digest alone is never success; only `Success` is terminal-success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure(String),
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

/// Result of a submitted (or queried) ledger transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub digest: String,
    pub status: ExecutionStatus,
    /// Hex-encoded executed transaction bytes. Populated on digest lookups;
    /// settlement checks decode these to verify what a digest actually did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_bytes: Option<String>,
}

/// A signature over an exact serialized byte sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LedgerSignature {
    /// Signature scheme identifier (currently always `secp256k1`).
    pub scheme: String,
    /// Hex-encoded signature bytes.
    pub signature: String,
    /// Hex-encoded compressed public key of the signer.
    pub public_key: String,
}

/// Errors from ledger interactions.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    /// The one documented transient-failure class: a concurrent mutation
    /// consumed the object version we were about to use.
    #[error("Object version unavailable: {0}")]
    ObjectVersionUnavailable(String),

    #[error("No coin objects of type {coin_type} owned by {owner}")]
    NoCoins { owner: String, coin_type: String },

    /// On-chain total is short of the requested amount. The cached off-chain
    /// mirror is carried so callers can report the divergence.
    #[error("Insufficient on-chain balance: need {needed}, on-chain holds {available}")]
    InsufficientOnChain {
        needed: u64,
        available: u64,
        cached_mirror: Option<u64>,
    },

    /// Total balance suffices but no single coin object does. Consolidation
    /// is deliberately not performed; the caller must surface this to the
    /// user as its own failure mode.
    #[error("No single coin large enough: need {needed}, largest coin holds {largest}")]
    NoSingleCoinLargeEnough { needed: u64, largest: u64 },

    #[error("Object {object_id} is owned by {owner}, not the expected sender")]
    NotOwned { object_id: String, owner: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Transaction {digest} executed with non-success status: {status}")]
    ExecutionFailed { digest: String, status: String },

    #[error("Malformed transaction bytes: {0}")]
    MalformedTransaction(String),
}

impl LedgerError {
    /// Predicate for the bounded retry policy. Only the coin-version race is
    /// transient; everything else is fatal to the current request.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::ObjectVersionUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_version_race_is_transient() {
        assert!(LedgerError::ObjectVersionUnavailable("coin 0xc1".into()).is_transient());
        assert!(!LedgerError::Rpc("timeout".into()).is_transient());
        assert!(!LedgerError::NoCoins {
            owner: "0xab".into(),
            coin_type: "0x2::diary::DIARY".into()
        }
        .is_transient());
        assert!(!LedgerError::ExecutionFailed {
            digest: "D1".into(),
            status: "aborted".into()
        }
        .is_transient());
    }

    #[test]
    fn failure_status_is_not_success() {
        assert!(ExecutionStatus::Success.is_success());
        assert!(!ExecutionStatus::Failure("MoveAbort(7)".into()).is_success());
    }
}
