// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Persistent records and the embedded database.

pub mod database;

pub use database::{BeastDatabase, DbError, DbResult};

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::sealing::EncryptionEnvelope;

/// Hard cap on pet lives.
pub const MAX_LIVES: u8 = 7;
/// Hard cap on pet happiness.
pub const MAX_HAPPINESS: u8 = 100;

/// Serde helper: byte payloads as hex strings in stored JSON.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// User aggregate: wallet identity, pet state, streaks and the cached
/// token balance mirror (base units).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub address: String,
    /// Cached mirror of the on-chain token balance, in base units. The chain
    /// remains the source of truth.
    pub coins_balance: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_entry_date: Option<NaiveDate>,
    pub lives_remaining: u8,
    pub happiness: u8,
    /// Owned shop items, item id → quantity.
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(address: String) -> Self {
        Self {
            address,
            coins_balance: 0,
            current_streak: 0,
            longest_streak: 0,
            last_entry_date: None,
            lives_remaining: MAX_LIVES,
            happiness: MAX_HAPPINESS,
            inventory: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn restore_lives(&mut self, amount: u8) {
        self.lives_remaining = self.lives_remaining.saturating_add(amount).min(MAX_LIVES);
    }

    pub fn add_happiness(&mut self, amount: u8) {
        self.happiness = self.happiness.saturating_add(amount).min(MAX_HAPPINESS);
    }
}

/// How an entry's ciphertext is held.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum EntryContent {
    /// Ciphertext lives in external blob storage; only the reference is kept
    /// here, optionally alongside an inline fallback copy.
    Blob {
        blob_id: String,
        blob_tx_digest: Option<String>,
        #[serde(default, with = "opt_hex_bytes")]
        inline_fallback: Option<Vec<u8>>,
    },
    /// Ciphertext stored directly in the database.
    Inline {
        #[serde(with = "hex_bytes")]
        ciphertext: Vec<u8>,
    },
}

mod opt_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// A stored diary entry. Plaintext never touches this record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub id: String,
    pub user_address: String,
    /// UTC day this entry belongs to. One entry per user per day.
    pub date: NaiveDate,
    pub word_count: u32,
    pub content: EntryContent,
    /// User signature over the ciphertext, as submitted.
    pub signature: String,
    /// Hash of the ciphertext, for integrity checks on read.
    pub content_hash: String,
    pub encryption: EncryptionEnvelope,
    pub created_at: DateTime<Utc>,
}

/// Why a reward was minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Welcome,
    FirstEntry,
    DailyEntry,
    StreakBonus,
    SummaryGeneration,
    ShopPurchase,
}

/// A token movement credited or debited off the back of an app event.
/// `amount` is signed base units (purchases are negative).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewardRecord {
    pub id: String,
    pub user_address: String,
    pub kind: RewardKind,
    pub amount: i64,
    pub description: String,
    /// On-chain digest of the mint/burn, or `None` when the chain leg
    /// failed and the record marks an unreconciled movement.
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A completed shop purchase.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub id: String,
    pub user_address: String,
    pub item_id: String,
    /// Price paid, in base units.
    pub price: u64,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}
