// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Sponsored-transaction protocol.
//!
//! Lets a user who holds DIARY but no gas currency execute a state-changing
//! ledger call with the operator underwriting gas. The run moves through
//! five phases: Unsponsored (gas-less kind bytes) → Sponsoring (operator
//! attaches gas and signs) → Sponsored (envelope returned to the client) →
//! Co-signed (client signs the same bytes) → Submitted (dual-signed
//! execution). Only a `Success` effects status is terminal-success.
//!
//! Gas-coin discovery is the one step retried on the coin-version race; all
//! other failures abort the request without persisting anything.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::accounting::TokenAccounting;
use super::client::LedgerClient;
use super::keys::{verify_signature, OperatorKey};
use super::tx::{FullTransaction, Operation, SealedEnvelope, TransactionKind};
use super::types::{LedgerError, LedgerSignature, TransactionResult};

/// Errors from a sponsorship protocol run.
#[derive(Debug, thiserror::Error)]
pub enum SponsorError {
    #[error("No gas coins available for sponsorship")]
    NoGasCoins,

    #[error("Transaction sender {got} does not match requesting user {expected}")]
    SenderMismatch { expected: String, got: String },

    #[error("Sponsorship envelope expired")]
    Expired,

    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    #[error("Protocol run cancelled")]
    Cancelled,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Named bounded-retry policy for the coin-version race.
///
/// `max_attempts` total attempts; backoff doubles from `initial_backoff`.
/// The retryable predicate is [`LedgerError::is_transient`]; nothing else
/// is retried automatically.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, SponsorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(SponsorError::Cancelled);
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Transient ledger error, backing off"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SponsorError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(SponsorError::Ledger(e)),
            }
        }
    }
}

/// Orchestrates the gas-abstracted transfer/burn protocol.
pub struct SponsorService {
    client: Arc<LedgerClient>,
    operator: OperatorKey,
    gas_coin_type: String,
    gas_budget: u64,
    retry: RetryPolicy,
    envelope_ttl: chrono::Duration,
}

impl SponsorService {
    pub fn new(
        client: Arc<LedgerClient>,
        operator: OperatorKey,
        gas_coin_type: impl Into<String>,
        gas_budget: u64,
    ) -> Self {
        Self {
            client,
            operator,
            gas_coin_type: gas_coin_type.into(),
            gas_budget,
            retry: RetryPolicy::default(),
            envelope_ttl: chrono::Duration::minutes(5),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn operator_address(&self) -> &str {
        self.operator.address()
    }

    /// Sponsoring phase: reconstruct the kind from the raw bytes, attach the
    /// operator's gas, serialize once, and sign those exact bytes.
    ///
    /// The returned envelope is immutable; the client co-signs the identical
    /// byte sequence after verifying it is willing to (amount, recipient).
    pub async fn sponsor(
        &self,
        kind_bytes: &[u8],
        sender: &str,
        cancel: &CancellationToken,
    ) -> Result<SealedEnvelope, SponsorError> {
        let kind = TransactionKind::from_kind_bytes(kind_bytes)?;
        if kind.sender != sender {
            return Err(SponsorError::SenderMismatch {
                expected: sender.to_string(),
                got: kind.sender,
            });
        }

        tracing::debug!(sender, "Sponsoring transaction kind");

        let gas_payment = self.discover_gas_coin(cancel).await?;

        let full = FullTransaction {
            kind,
            gas_owner: self.operator.address().to_string(),
            gas_payment,
            gas_budget: self.gas_budget,
            expires_at: Utc::now() + self.envelope_ttl,
        };

        let envelope = full.seal(&self.operator);
        tracing::debug!(sender, "Envelope sealed and sponsor-signed");
        Ok(envelope)
    }

    /// Submitting phase: execute the dual-signed envelope.
    ///
    /// The bytes are submitted unchanged; both signatures are checked
    /// locally against them first so a re-serialized or tampered envelope
    /// fails fast with a precise error. A stale-version failure from a
    /// concurrent spend of the same coin propagates as-is, retryable by
    /// the user, never masked.
    pub async fn execute(
        &self,
        tx_bytes: Vec<u8>,
        user_signature: LedgerSignature,
        sponsor_signature: LedgerSignature,
    ) -> Result<TransactionResult, SponsorError> {
        let envelope = SealedEnvelope::from_parts(tx_bytes, sponsor_signature);

        let decoded = envelope.decode()?;
        if decoded.expires_at < Utc::now() {
            return Err(SponsorError::Expired);
        }

        verify_signature(envelope.tx_bytes(), envelope.sponsor_signature())
            .map_err(|e| SponsorError::SignatureMismatch(format!("sponsor: {e}")))?;
        verify_signature(envelope.tx_bytes(), &user_signature)
            .map_err(|e| SponsorError::SignatureMismatch(format!("user: {e}")))?;

        let result = self
            .client
            .execute_dual_signed(
                envelope.tx_bytes(),
                &user_signature,
                envelope.sponsor_signature(),
            )
            .await?;

        tracing::info!(digest = %result.digest, "Sponsored transaction settled");
        Ok(result)
    }

    /// Operator-initiated transfer (reward minting). Sender and gas owner
    /// are both the operator, so a single signature suffices.
    pub async fn transfer_from_operator(
        &self,
        accounting: &TokenAccounting,
        recipient: &str,
        amount: u64,
        cancel: &CancellationToken,
    ) -> Result<TransactionResult, SponsorError> {
        let source = accounting
            .select_coin(self.operator.address(), amount, None)
            .await?;

        let gas_payment = self.discover_gas_coin(cancel).await?;

        let full = FullTransaction {
            kind: TransactionKind {
                sender: self.operator.address().to_string(),
                operation: Operation::TransferCoin {
                    coin: source.object_ref,
                    amount,
                    recipient: recipient.to_string(),
                },
            },
            gas_owner: self.operator.address().to_string(),
            gas_payment,
            gas_budget: self.gas_budget,
            expires_at: Utc::now() + self.envelope_ttl,
        };

        let envelope = full.seal(&self.operator);
        let result = self
            .client
            .execute_single_signed(envelope.tx_bytes(), envelope.sponsor_signature())
            .await?;

        tracing::info!(digest = %result.digest, recipient, amount, "Operator transfer settled");
        Ok(result)
    }

    /// Discover a gas coin owned by the operator, with the bounded retry
    /// for concurrent sponsorships racing on the same coin set.
    async fn discover_gas_coin(
        &self,
        cancel: &CancellationToken,
    ) -> Result<super::types::ObjectRef, SponsorError> {
        let client = Arc::clone(&self.client);
        let owner = self.operator.address().to_string();
        let coin_type = self.gas_coin_type.clone();

        let coins = self
            .retry
            .run(cancel, move || {
                let client = Arc::clone(&client);
                let owner = owner.clone();
                let coin_type = coin_type.clone();
                async move { client.owned_coins(&owner, &coin_type).await }
            })
            .await?;

        coins
            .into_iter()
            .next()
            .map(|c| c.object_ref)
            .ok_or(SponsorError::NoGasCoins)
    }
}
