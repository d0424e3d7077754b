// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Transaction construction and the sealed-envelope value type.
//!
//! A transaction exists in two serialized forms: *kind bytes* (the semantic
//! operation with no gas metadata, assembled by the client or server before
//! sponsorship) and *full bytes* (kind plus gas metadata, which both parties
//! sign). Once a signature has been computed over full bytes they are sealed:
//! [`SealedEnvelope`] holds the exact byte sequence and offers no mutation,
//! so the re-serialization hazard cannot arise by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::keys::OperatorKey;
use super::types::{LedgerError, LedgerSignature, ObjectRef};

/// The token has 9 fractional decimal digits.
pub const BASE_UNIT_DECIMALS: u32 = 9;

/// `10^9` base units per display unit.
pub const BASE_UNIT_SCALE: u64 = 1_000_000_000;

/// Convert a display amount to integer base units.
///
/// The single conversion site in the codebase: the amount is rendered to
/// exactly 9 fractional digits and the digit string parsed as an integer,
/// so the rule (round-to-nearest at the 9th digit) is applied uniformly and
/// `to_display(to_base_units(a)) == a` for any a with at most 9 fractional
/// digits.
pub fn to_base_units(amount: f64) -> Result<u64, LedgerError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(LedgerError::MalformedTransaction(format!(
            "amount must be a non-negative finite number, got {amount}"
        )));
    }

    let rendered = format!("{amount:.9}");
    let (whole, frac) = rendered
        .split_once('.')
        .expect("{:.9} always renders a fractional part");

    let whole: u64 = whole
        .parse()
        .map_err(|_| LedgerError::MalformedTransaction(format!("amount too large: {amount}")))?;
    let frac: u64 = frac.parse().expect("fractional digits are numeric");

    whole
        .checked_mul(BASE_UNIT_SCALE)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| LedgerError::MalformedTransaction(format!("amount overflow: {amount}")))
}

/// Convert integer base units to a display amount.
pub fn to_display(units: u64) -> f64 {
    units as f64 / BASE_UNIT_SCALE as f64
}

/// The semantic operation a transaction performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Transfer `amount` base units out of `coin` to `recipient`.
    TransferCoin {
        coin: ObjectRef,
        amount: u64,
        recipient: String,
    },
    /// Burn `amount` base units of `coin`.
    BurnCoin { coin: ObjectRef, amount: u64 },
    /// Authorization payload for the threshold-decrypt access-policy check.
    /// Never executed; serialized kind-only and presented to key servers.
    AuthorizeDecrypt {
        package_id: String,
        identity_id: String,
        requester: String,
    },
}

/// A gas-less transaction: the operation plus its logical sender, with no
/// gas payment and no budget. Serializing this is the "build with
/// transaction-kind-only" mode that lets a sponsor add gas later without
/// invalidating the semantic payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionKind {
    pub sender: String,
    pub operation: Operation,
}

impl TransactionKind {
    /// Serialize to raw kind bytes.
    pub fn to_kind_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("transaction kind serializes")
    }

    /// Reconstruct from raw kind bytes.
    pub fn from_kind_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        serde_json::from_slice(bytes)
            .map_err(|e| LedgerError::MalformedTransaction(format!("bad kind bytes: {e}")))
    }
}

/// A complete transaction: kind plus gas metadata. This is the only shape
/// the ledger will execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTransaction {
    pub kind: TransactionKind,
    pub gas_owner: String,
    pub gas_payment: ObjectRef,
    pub gas_budget: u64,
    /// Submission deadline; the execute endpoint rejects envelopes past it.
    pub expires_at: DateTime<Utc>,
}

impl FullTransaction {
    /// Serialize once and sign those exact bytes, producing the immutable
    /// envelope. There is no path from a [`SealedEnvelope`] back to a
    /// mutable builder.
    pub fn seal(self, operator: &OperatorKey) -> SealedEnvelope {
        let tx_bytes = serde_json::to_vec(&self).expect("full transaction serializes");
        let sponsor_signature = operator.sign(&tx_bytes);
        SealedEnvelope {
            tx_bytes,
            sponsor_signature,
        }
    }
}

/// The sponsored transaction envelope: exact full-transaction bytes plus the
/// sponsor's signature over them.
///
/// Treated as immutable once produced: both signatures must be computed
/// over the identical byte sequence, and submission must present these bytes
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedEnvelope {
    tx_bytes: Vec<u8>,
    sponsor_signature: LedgerSignature,
}

impl SealedEnvelope {
    /// Reassemble an envelope from its wire parts (e.g. at the execute
    /// endpoint). The bytes are taken as-is; no re-serialization happens.
    pub fn from_parts(tx_bytes: Vec<u8>, sponsor_signature: LedgerSignature) -> Self {
        Self {
            tx_bytes,
            sponsor_signature,
        }
    }

    /// The exact bytes both parties sign and the ledger executes.
    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn sponsor_signature(&self) -> &LedgerSignature {
        &self.sponsor_signature
    }

    /// Read-only view of the transaction content, for the client-side
    /// willingness check (amount, recipient) before co-signing.
    pub fn decode(&self) -> Result<FullTransaction, LedgerError> {
        serde_json::from_slice(&self.tx_bytes)
            .map_err(|e| LedgerError::MalformedTransaction(format!("bad envelope bytes: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::keys::verify_signature;

    fn operator() -> OperatorKey {
        OperatorKey::load("59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d")
            .unwrap()
    }

    fn coin_ref() -> ObjectRef {
        ObjectRef {
            object_id: "0xc0ffee".into(),
            version: 7,
            digest: "9WzS".into(),
        }
    }

    fn sample_full_tx() -> FullTransaction {
        FullTransaction {
            kind: TransactionKind {
                sender: "0xuser".into(),
                operation: Operation::BurnCoin {
                    coin: coin_ref(),
                    amount: 5 * BASE_UNIT_SCALE,
                },
            },
            gas_owner: operator().address().to_string(),
            gas_payment: ObjectRef {
                object_id: "0x9a5".into(),
                version: 3,
                digest: "Qx1".into(),
            },
            gas_budget: 10_000_000,
            expires_at: Utc::now() + chrono::Duration::minutes(5),
        }
    }

    #[test]
    fn base_unit_round_trip_has_no_drift() {
        // to_display(to_base_units(a)) == a for amounts with <= 9 digits.
        for a in [0.0, 1.0, 0.5, 1.5, 0.001, 2.675, 0.1, 123.456789012, 50.0] {
            let units = to_base_units(a).unwrap();
            assert_eq!(to_display(units), a, "drift for {a}");
        }
    }

    #[test]
    fn base_unit_conversion_values() {
        assert_eq!(to_base_units(1.0).unwrap(), 1_000_000_000);
        assert_eq!(to_base_units(2.675).unwrap(), 2_675_000_000);
        assert_eq!(to_base_units(0.000000001).unwrap(), 1);
        assert_eq!(to_base_units(0.0).unwrap(), 0);
    }

    #[test]
    fn base_unit_conversion_rejects_bad_amounts() {
        assert!(to_base_units(-1.0).is_err());
        assert!(to_base_units(f64::NAN).is_err());
        assert!(to_base_units(f64::INFINITY).is_err());
    }

    #[test]
    fn kind_bytes_round_trip() {
        let kind = TransactionKind {
            sender: "0xuser".into(),
            operation: Operation::TransferCoin {
                coin: coin_ref(),
                amount: 42,
                recipient: "0xdest".into(),
            },
        };
        let bytes = kind.to_kind_bytes();
        assert_eq!(TransactionKind::from_kind_bytes(&bytes).unwrap(), kind);
    }

    #[test]
    fn kind_bytes_carry_no_gas_metadata() {
        let kind = TransactionKind {
            sender: "0xuser".into(),
            operation: Operation::BurnCoin {
                coin: coin_ref(),
                amount: 1,
            },
        };
        let rendered = String::from_utf8(kind.to_kind_bytes()).unwrap();
        assert!(!rendered.contains("gas"));
    }

    #[test]
    fn seal_binds_signature_to_exact_bytes() {
        // Both parties verify against the unmodified bytes.
        let op = operator();
        let envelope = sample_full_tx().seal(&op);

        verify_signature(envelope.tx_bytes(), envelope.sponsor_signature()).unwrap();
    }

    #[test]
    fn reserialization_is_detectable_as_mismatch() {
        // Rebuilding the transaction and serializing again
        // must not verify against the original signature.
        let op = operator();
        let envelope = sample_full_tx().seal(&op);

        let mut rebuilt = envelope.decode().unwrap();
        rebuilt.gas_budget += 1;
        let rebuilt_bytes = serde_json::to_vec(&rebuilt).unwrap();

        assert!(verify_signature(&rebuilt_bytes, envelope.sponsor_signature()).is_err());
    }

    #[test]
    fn decode_exposes_amount_and_recipient_for_client_check() {
        let op = operator();
        let envelope = sample_full_tx().seal(&op);

        let decoded = envelope.decode().unwrap();
        match decoded.kind.operation {
            Operation::BurnCoin { amount, .. } => assert_eq!(amount, 5 * BASE_UNIT_SCALE),
            other => panic!("unexpected operation: {other:?}"),
        }
    }
}
