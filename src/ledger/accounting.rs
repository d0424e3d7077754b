// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Token accounting: on-chain balance summation and coin selection.

use std::sync::Arc;

use super::client::LedgerClient;
use super::types::{CoinObject, LedgerError};

/// Per-coin breakdown returned alongside the summed balance.
#[derive(Debug, Clone)]
pub struct OnChainBalance {
    pub total: u64,
    pub coins: Vec<CoinObject>,
}

/// Token accounting service for one coin type.
pub struct TokenAccounting {
    client: Arc<LedgerClient>,
    coin_type: String,
}

impl TokenAccounting {
    pub fn new(client: Arc<LedgerClient>, coin_type: impl Into<String>) -> Self {
        Self {
            client,
            coin_type: coin_type.into(),
        }
    }

    pub fn coin_type(&self) -> &str {
        &self.coin_type
    }

    /// Sum the owner's coin objects of the token type.
    pub async fn balance_of(&self, owner: &str) -> Result<OnChainBalance, LedgerError> {
        let coins = self.client.owned_coins(owner, &self.coin_type).await?;
        let total = coins.iter().map(|c| c.balance).sum();
        Ok(OnChainBalance { total, coins })
    }

    /// Select a coin object able to cover a spend of `amount` base units.
    ///
    /// Enumerates the owner's coins and takes the first whose listed balance
    /// covers the amount, then re-reads the object immediately before use
    /// (the coin set may have changed since listing) to verify ownership and
    /// balance. Candidates failing the re-read are skipped.
    ///
    /// `cached_mirror` is the off-chain balance the caller believes in; it
    /// is carried into the shortfall error so the divergence between the two
    /// ledgers stays diagnosable.
    pub async fn select_coin(
        &self,
        owner: &str,
        amount: u64,
        cached_mirror: Option<u64>,
    ) -> Result<CoinObject, LedgerError> {
        let coins = self.client.owned_coins(owner, &self.coin_type).await?;
        if coins.is_empty() {
            return Err(LedgerError::NoCoins {
                owner: owner.to_string(),
                coin_type: self.coin_type.clone(),
            });
        }

        let total: u64 = coins.iter().map(|c| c.balance).sum();
        if total < amount {
            return Err(LedgerError::InsufficientOnChain {
                needed: amount,
                available: total,
                cached_mirror,
            });
        }

        let largest = coins.iter().map(|c| c.balance).max().unwrap_or(0);

        for candidate in coins.iter().filter(|c| c.balance >= amount) {
            // Dry ownership verification against the current object state.
            let current = match self
                .client
                .get_object(&candidate.object_ref.object_id)
                .await
            {
                Ok(object) => object,
                Err(e) => {
                    tracing::warn!(
                        object_id = %candidate.object_ref.object_id,
                        error = %e,
                        "Skipping coin candidate that failed re-read"
                    );
                    continue;
                }
            };

            if current.owner != owner {
                tracing::warn!(
                    object_id = %current.object_ref.object_id,
                    owner = %current.owner,
                    "Coin changed owner between listing and selection"
                );
                continue;
            }

            if current.balance >= amount {
                return Ok(current);
            }
        }

        Err(LedgerError::NoSingleCoinLargeEnough {
            needed: amount,
            largest,
        })
    }
}
