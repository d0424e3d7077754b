// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Reward minting and digest confirmation.
//!
//! A settlement moves through four phases: quoted (rewards computed),
//! sponsoring (operator transfers built and submitted), settled (digests
//! confirmed on chain) and applied (records and the user aggregate written
//! in one database transaction). A failed mint never blocks the entry: the
//! movement is recorded without a digest and the cached balance mirror is
//! left uncredited, so the divergence shows up in the balance endpoint
//! instead of being papered over.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ledger::accounting::TokenAccounting;
use crate::ledger::client::LedgerClient;
use crate::ledger::sponsor::SponsorService;
use crate::ledger::tx::{FullTransaction, Operation};
use crate::ledger::types::LedgerError;
use crate::storage::{RewardKind, RewardRecord};

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("transaction {digest} is not a confirmed success: {status}")]
    NotConfirmed { digest: String, status: String },
    #[error("transaction {digest} does not settle this action: {reason}")]
    WrongTransaction { digest: String, reason: String },
}

/// A reward owed but not yet minted. Amounts are base units.
#[derive(Debug, Clone)]
pub struct PlannedReward {
    pub kind: RewardKind,
    pub amount: u64,
    pub description: String,
}

/// Outcome of minting a batch of planned rewards.
#[derive(Debug)]
pub struct MintedRewards {
    pub records: Vec<RewardRecord>,
    /// Base units actually confirmed on chain; the only amount the cached
    /// mirror may be credited with.
    pub credited: u64,
}

pub struct SettlementEngine {
    sponsor: Arc<SponsorService>,
    accounting: Arc<TokenAccounting>,
    client: Arc<LedgerClient>,
}

impl SettlementEngine {
    pub fn new(
        sponsor: Arc<SponsorService>,
        accounting: Arc<TokenAccounting>,
        client: Arc<LedgerClient>,
    ) -> Self {
        Self {
            sponsor,
            accounting,
            client,
        }
    }

    /// Mint each planned reward as an operator transfer.
    ///
    /// Per-reward failures are recorded as unreconciled movements (no
    /// digest) and do not abort the batch.
    pub async fn mint_rewards(
        &self,
        recipient: &str,
        planned: &[PlannedReward],
        cancel: &CancellationToken,
    ) -> MintedRewards {
        let mut records = Vec::with_capacity(planned.len());
        let mut credited = 0u64;

        for reward in planned {
            let tx_hash = match self
                .sponsor
                .transfer_from_operator(&self.accounting, recipient, reward.amount, cancel)
                .await
            {
                Ok(result) => {
                    credited += reward.amount;
                    Some(result.digest)
                }
                Err(err) => {
                    tracing::warn!(
                        recipient = %recipient,
                        kind = ?reward.kind,
                        amount = reward.amount,
                        error = %err,
                        "reward mint failed, recording unreconciled movement"
                    );
                    None
                }
            };
            records.push(RewardRecord {
                id: Uuid::new_v4().to_string(),
                user_address: recipient.to_string(),
                kind: reward.kind,
                amount: reward.amount as i64,
                description: reward.description.clone(),
                tx_hash,
                created_at: Utc::now(),
            });
        }

        MintedRewards { records, credited }
    }

    /// Verify that a client-submitted digest landed as a success AND is the
    /// burn this settlement quoted: same sender, same amount. Any other
    /// successful transaction (a reward mint, someone else's burn, a burn of
    /// a different amount) must not settle the action.
    pub async fn confirm_burn(
        &self,
        digest: &str,
        sender: &str,
        amount: u64,
    ) -> Result<(), SettlementError> {
        let result = self.client.get_transaction(digest).await?;
        if !result.status.is_success() {
            return Err(SettlementError::NotConfirmed {
                digest: result.digest,
                status: format!("{:?}", result.status),
            });
        }
        let tx_hex = result.tx_bytes.ok_or_else(|| SettlementError::WrongTransaction {
            digest: digest.to_string(),
            reason: "transaction content unavailable".into(),
        })?;
        let tx_bytes = hex::decode(tx_hex.trim_start_matches("0x")).map_err(|err| {
            SettlementError::WrongTransaction {
                digest: digest.to_string(),
                reason: format!("malformed transaction content: {err}"),
            }
        })?;
        let full: FullTransaction = serde_json::from_slice(&tx_bytes).map_err(|err| {
            SettlementError::WrongTransaction {
                digest: digest.to_string(),
                reason: format!("malformed transaction content: {err}"),
            }
        })?;
        match &full.kind.operation {
            Operation::BurnCoin { amount: burned, .. }
                if full.kind.sender == sender && *burned == amount =>
            {
                Ok(())
            }
            _ => Err(SettlementError::WrongTransaction {
                digest: digest.to_string(),
                reason: format!("expected a burn of {amount} base units by {sender}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::keys::OperatorKey;
    use crate::ledger::rpc::LedgerRpc;
    use crate::ledger::tx::TransactionKind;
    use crate::ledger::types::{
        CoinObject, ExecutionStatus, LedgerSignature, ObjectRef, TransactionResult, LEDGER_TESTNET,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    const OPERATOR_HEX: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const GAS: &str = "0x2::gas::GAS";
    const DIARY: &str = "0x2::diary::DIARY";
    const USER: &str = "0x00000000000000000000000000000000000000000000000000000000000000a1";

    struct FakeRpc {
        operator: String,
        executions: AtomicU32,
        fail_from_execution: u32,
    }

    fn coin(id: &str, owner: &str, coin_type: &str, balance: u64) -> CoinObject {
        CoinObject {
            object_ref: ObjectRef {
                object_id: id.to_string(),
                version: 1,
                digest: "d".into(),
            },
            owner: owner.to_string(),
            coin_type: coin_type.to_string(),
            balance,
        }
    }

    #[async_trait]
    impl LedgerRpc for FakeRpc {
        async fn owned_coins(
            &self,
            owner: &str,
            coin_type: &str,
        ) -> Result<Vec<CoinObject>, LedgerError> {
            if owner != self.operator {
                return Ok(Vec::new());
            }
            let id = if coin_type == GAS { "0xga5" } else { "0xd1a" };
            Ok(vec![coin(id, owner, coin_type, u64::MAX / 2)])
        }

        async fn get_object(&self, object_id: &str) -> Result<CoinObject, LedgerError> {
            let coin_type = if object_id == "0xga5" { GAS } else { DIARY };
            Ok(coin(object_id, &self.operator, coin_type, u64::MAX / 2))
        }

        async fn execute(
            &self,
            _tx_bytes: &[u8],
            _signatures: &[LedgerSignature],
        ) -> Result<TransactionResult, LedgerError> {
            let n = self.executions.fetch_add(1, Ordering::SeqCst);
            if n >= self.fail_from_execution {
                return Err(LedgerError::Rpc("node unavailable".into()));
            }
            Ok(TransactionResult {
                digest: format!("DIGEST{n}"),
                status: ExecutionStatus::Success,
                tx_bytes: None,
            })
        }

        async fn get_transaction(&self, digest: &str) -> Result<TransactionResult, LedgerError> {
            if digest == "0xfailed" {
                return Ok(TransactionResult {
                    digest: digest.to_string(),
                    status: ExecutionStatus::Failure("aborted".into()),
                    tx_bytes: None,
                });
            }
            // Every other digest resolves to the canned user burn of 5 units.
            let full = FullTransaction {
                kind: TransactionKind {
                    sender: USER.to_string(),
                    operation: Operation::BurnCoin {
                        coin: ObjectRef {
                            object_id: "0xd1a".into(),
                            version: 1,
                            digest: "d".into(),
                        },
                        amount: 5,
                    },
                },
                gas_owner: self.operator.clone(),
                gas_payment: ObjectRef {
                    object_id: "0xga5".into(),
                    version: 1,
                    digest: "d".into(),
                },
                gas_budget: 10_000_000,
                expires_at: Utc::now() + chrono::Duration::minutes(5),
            };
            Ok(TransactionResult {
                digest: digest.to_string(),
                status: ExecutionStatus::Success,
                tx_bytes: Some(hex::encode(serde_json::to_vec(&full).unwrap())),
            })
        }
    }

    fn engine(fail_from_execution: u32) -> SettlementEngine {
        let operator = OperatorKey::load(OPERATOR_HEX).unwrap();
        let rpc = Arc::new(FakeRpc {
            operator: operator.address().to_string(),
            executions: AtomicU32::new(0),
            fail_from_execution,
        });
        let client = Arc::new(LedgerClient::new(LEDGER_TESTNET, rpc));
        let sponsor = Arc::new(SponsorService::new(
            client.clone(),
            operator,
            GAS,
            10_000_000,
        ));
        let accounting = Arc::new(TokenAccounting::new(client.clone(), DIARY));
        SettlementEngine::new(sponsor, accounting, client)
    }

    fn planned(amount: u64) -> PlannedReward {
        PlannedReward {
            kind: RewardKind::DailyEntry,
            amount,
            description: "daily diary entry".into(),
        }
    }

    #[tokio::test]
    async fn successful_mints_credit_the_mirror() {
        let engine = engine(u32::MAX);
        let cancel = CancellationToken::new();
        let minted = engine
            .mint_rewards(USER, &[planned(10), planned(25)], &cancel)
            .await;
        assert_eq!(minted.records.len(), 2);
        assert_eq!(minted.credited, 35);
        assert!(minted.records.iter().all(|r| r.tx_hash.is_some()));
    }

    #[tokio::test]
    async fn failed_mint_is_recorded_without_digest() {
        let engine = engine(1);
        let cancel = CancellationToken::new();
        let minted = engine
            .mint_rewards(USER, &[planned(10), planned(25)], &cancel)
            .await;
        assert_eq!(minted.records.len(), 2);
        assert_eq!(minted.credited, 10);
        assert!(minted.records[0].tx_hash.is_some());
        assert!(minted.records[1].tx_hash.is_none());
    }

    #[tokio::test]
    async fn confirm_burn_accepts_the_quoted_burn() {
        let engine = engine(u32::MAX);
        engine.confirm_burn("0xok", USER, 5).await.unwrap();
    }

    #[tokio::test]
    async fn confirm_burn_rejects_failed_execution() {
        let engine = engine(u32::MAX);
        let err = engine.confirm_burn("0xfailed", USER, 5).await.unwrap_err();
        assert!(matches!(err, SettlementError::NotConfirmed { .. }));
    }

    #[tokio::test]
    async fn confirm_burn_rejects_a_different_amount() {
        let engine = engine(u32::MAX);
        let err = engine.confirm_burn("0xok", USER, 9).await.unwrap_err();
        assert!(matches!(err, SettlementError::WrongTransaction { .. }));
    }

    #[tokio::test]
    async fn confirm_burn_rejects_another_senders_transaction() {
        let engine = engine(u32::MAX);
        let other = "0x00000000000000000000000000000000000000000000000000000000000000b2";
        let err = engine.confirm_burn("0xok", other, 5).await.unwrap_err();
        assert!(matches!(err, SettlementError::WrongTransaction { .. }));
    }
}
