// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Ledger integration.
//!
//! This module provides:
//! - operator key loading and signing (`keys`)
//! - the JSON-RPC facade (`rpc`, `client`)
//! - token accounting and coin selection (`accounting`)
//! - transaction construction and the sealed envelope (`tx`)
//! - the sponsored-transaction protocol (`sponsor`)

pub mod accounting;
pub mod client;
pub mod keys;
pub mod rpc;
pub mod sponsor;
pub mod tx;
pub mod types;

pub use accounting::{OnChainBalance, TokenAccounting};
pub use client::{ClientCache, LedgerClient};
pub use keys::OperatorKey;
pub use rpc::{HttpLedgerRpc, LedgerRpc};
pub use sponsor::{RetryPolicy, SponsorError, SponsorService};
pub use tx::{
    to_base_units, to_display, FullTransaction, Operation, SealedEnvelope, TransactionKind,
    BASE_UNIT_DECIMALS, BASE_UNIT_SCALE,
};
pub use types::{
    CoinObject, ExecutionStatus, LedgerError, LedgerSignature, NetworkConfig, ObjectRef,
    TransactionResult, LEDGER_MAINNET, LEDGER_TESTNET,
};
