// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Embedded application database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: address → serialized User
//! - `entries`: entry_id → serialized EntryRecord
//! - `entry_day_index`: address|date → entry_id (one entry per user per day)
//! - `entry_user_index`: composite key (address|!timestamp|entry_id) → entry_id
//! - `rewards`: reward_id → serialized RewardRecord
//! - `reward_tx_index`: chain digest → reward_id (settlement idempotency)
//! - `purchases`: purchase_id → serialized PurchaseRecord
//! - `purchase_user_index`: composite key (address|!timestamp|purchase_id) → purchase_id
//! - `health`: transient scratch row exercised by the readiness check
//!
//! The day-index insert happens inside the same write transaction as the
//! entry itself, so uniqueness holds under concurrent submissions without
//! any out-of-band locking.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{EntryRecord, PurchaseRecord, RewardRecord, User};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: wallet address → serialized User (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Primary table: entry_id → serialized EntryRecord (JSON bytes).
const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// Uniqueness guard: `address|YYYY-MM-DD` → entry_id.
const ENTRY_DAY_INDEX: TableDefinition<&str, &str> = TableDefinition::new("entry_day_index");

/// Index: composite key → entry_id.
/// Key format: `address|!timestamp_be|entry_id` for descending-time range scans.
const ENTRY_USER_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("entry_user_index");

/// Primary table: reward_id → serialized RewardRecord (JSON bytes).
const REWARDS: TableDefinition<&str, &[u8]> = TableDefinition::new("rewards");

/// Settlement idempotency: chain digest → reward_id. Only confirmed digests
/// are indexed; failed movements carry no digest and are never replayed
/// through this table.
const REWARD_TX_INDEX: TableDefinition<&str, &str> = TableDefinition::new("reward_tx_index");

/// Primary table: purchase_id → serialized PurchaseRecord (JSON bytes).
const PURCHASES: TableDefinition<&str, &[u8]> = TableDefinition::new("purchases");

/// Index: composite key (address|!timestamp|purchase_id) → purchase_id.
const PURCHASE_USER_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("purchase_user_index");

/// Scratch table exercised by the readiness check. Holds at most one
/// transient row at a time.
const HEALTH: TableDefinition<&str, &[u8]> = TableDefinition::new("health");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("user already registered: {0}")]
    UserExists(String),

    #[error("an entry already exists for {address} on {date}")]
    EntryExists { address: String, date: String },

    #[error("not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the per-user time indexes.
///
/// Format: `address | inverted_timestamp_be_bytes | record_id`
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
fn make_index_key(address: &str, timestamp: i64, record_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(address.len() + 1 + 8 + 1 + record_id.len());
    key.extend_from_slice(address.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(record_id.as_bytes());
    key
}

/// Build a prefix key for range scanning all records of an address.
fn make_prefix(address: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(address.len() + 1);
    prefix.extend_from_slice(address.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Build the upper bound for a range scan (prefix with 0xFF bytes appended).
fn make_prefix_end(address: &str) -> Vec<u8> {
    let mut end = make_prefix(address);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

fn day_key(address: &str, date: chrono::NaiveDate) -> String {
    format!("{address}|{date}")
}

// =============================================================================
// BeastDatabase
// =============================================================================

/// Embedded ACID application database.
pub struct BeastDatabase {
    db: Database,
}

impl BeastDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(ENTRIES)?;
            let _ = write_txn.open_table(ENTRY_DAY_INDEX)?;
            let _ = write_txn.open_table(ENTRY_USER_INDEX)?;
            let _ = write_txn.open_table(REWARDS)?;
            let _ = write_txn.open_table(REWARD_TX_INDEX)?;
            let _ = write_txn.open_table(PURCHASES)?;
            let _ = write_txn.open_table(PURCHASE_USER_INDEX)?;
            let _ = write_txn.open_table(HEALTH)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Readiness check: write a token to the scratch table, read it back,
    /// then delete it. Exercises a full write transaction and a read
    /// transaction, so a wedged or corrupt store surfaces here rather than
    /// on the next user request.
    pub fn health_check(&self) -> DbResult<()> {
        let token = uuid::Uuid::new_v4().to_string();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(HEALTH)?;
            table.insert("readiness", token.as_bytes())?;
        }
        write_txn.commit()?;

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HEALTH)?;
        let round_trip = match table.get("readiness")? {
            Some(value) => value.value() == token.as_bytes(),
            None => false,
        };
        if !round_trip {
            return Err(DbError::NotFound("readiness token".to_string()));
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(HEALTH)?;
            table.remove("readiness")?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Register a new user. Writes the welcome reward in the same
    /// transaction when one is provided.
    pub fn create_user(&self, user: &User, welcome: Option<&RewardRecord>) -> DbResult<()> {
        let json = serde_json::to_vec(user)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            if users.get(user.address.as_str())?.is_some() {
                return Err(DbError::UserExists(user.address.clone()));
            }
            users.insert(user.address.as_str(), json.as_slice())?;

            if let Some(reward) = welcome {
                let mut rewards = write_txn.open_table(REWARDS)?;
                rewards.insert(reward.id.as_str(), serde_json::to_vec(reward)?.as_slice())?;
                if let Some(digest) = reward.tx_hash.as_deref() {
                    let mut tx_index = write_txn.open_table(REWARD_TX_INDEX)?;
                    tx_index.insert(digest, reward.id.as_str())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_user(&self, address: &str) -> DbResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(address)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn update_user(&self, user: &User) -> DbResult<()> {
        let json = serde_json::to_vec(user)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            users.insert(user.address.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Entries
    // =========================================================================

    /// Persist an entry, claiming its (user, day) slot. This is the
    /// authoritative uniqueness guard: callers must hold a committed entry
    /// before minting any reward for it.
    ///
    /// Fails with [`DbError::EntryExists`] when the user already has an
    /// entry for the same day; nothing is written in that case.
    pub fn create_entry(&self, entry: &EntryRecord) -> DbResult<()> {
        let entry_json = serde_json::to_vec(entry)?;
        let timestamp = entry.created_at.timestamp();
        let day = day_key(&entry.user_address, entry.date);

        let write_txn = self.db.begin_write()?;
        {
            let mut day_index = write_txn.open_table(ENTRY_DAY_INDEX)?;
            if day_index.get(day.as_str())?.is_some() {
                return Err(DbError::EntryExists {
                    address: entry.user_address.clone(),
                    date: entry.date.to_string(),
                });
            }
            day_index.insert(day.as_str(), entry.id.as_str())?;

            let mut entries = write_txn.open_table(ENTRIES)?;
            entries.insert(entry.id.as_str(), entry_json.as_slice())?;

            let mut user_index = write_txn.open_table(ENTRY_USER_INDEX)?;
            let key = make_index_key(&entry.user_address, timestamp, &entry.id);
            user_index.insert(key.as_slice(), entry.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Settle an already-committed entry: mutate the user aggregate through
    /// `apply` and append the minted reward records, all in one transaction.
    /// The aggregate is read inside the write transaction, so a concurrent
    /// settlement on the same user cannot lose its update.
    pub fn settle_entry(
        &self,
        address: &str,
        rewards: &[RewardRecord],
        apply: impl FnOnce(&mut User),
    ) -> DbResult<User> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut users = write_txn.open_table(USERS)?;
            let raw = users.get(address)?.map(|v| v.value().to_vec());
            let mut user: User = match raw {
                Some(bytes) => serde_json::from_slice(&bytes)?,
                None => return Err(DbError::NotFound(format!("user {address}"))),
            };
            apply(&mut user);
            users.insert(address, serde_json::to_vec(&user)?.as_slice())?;

            let mut rewards_table = write_txn.open_table(REWARDS)?;
            let mut tx_index = write_txn.open_table(REWARD_TX_INDEX)?;
            for reward in rewards {
                rewards_table.insert(reward.id.as_str(), serde_json::to_vec(reward)?.as_slice())?;
                if let Some(digest) = reward.tx_hash.as_deref() {
                    tx_index.insert(digest, reward.id.as_str())?;
                }
            }
            user
        };
        write_txn.commit()?;
        Ok(updated)
    }

    pub fn get_entry(&self, entry_id: &str) -> DbResult<Option<EntryRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTRIES)?;
        match table.get(entry_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Entry id for a user's given day, if one exists.
    pub fn entry_for_day(
        &self,
        address: &str,
        date: chrono::NaiveDate,
    ) -> DbResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTRY_DAY_INDEX)?;
        Ok(table
            .get(day_key(address, date).as_str())?
            .map(|v| v.value().to_string()))
    }

    /// Newest-first listing of a user's entries.
    pub fn list_entries(&self, address: &str, limit: usize) -> DbResult<Vec<EntryRecord>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(ENTRY_USER_INDEX)?;
        let entries_table = read_txn.open_table(ENTRIES)?;

        let prefix = make_prefix(address);
        let prefix_end = make_prefix_end(address);

        let mut results = Vec::with_capacity(limit);
        for item in idx_table.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (_, entry_id) = item?;
            if let Some(value) = entries_table.get(entry_id.value())? {
                results.push(serde_json::from_slice(value.value())?);
            }
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    // =========================================================================
    // Rewards / Settlement
    // =========================================================================

    /// Apply a digest-keyed settlement: persist the reward and mutate the
    /// user aggregate through `apply`, unless the digest was already applied.
    /// The aggregate is read and rewritten inside the same write transaction,
    /// so concurrent settlements for one user serialize instead of clobbering
    /// each other.
    ///
    /// Returns `None` (and writes nothing) when the digest is already
    /// indexed, so replaying a settlement is a no-op.
    pub fn apply_settlement(
        &self,
        digest: &str,
        address: &str,
        reward: &RewardRecord,
        apply: impl FnOnce(&mut User),
    ) -> DbResult<Option<User>> {
        let reward_json = serde_json::to_vec(reward)?;

        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut tx_index = write_txn.open_table(REWARD_TX_INDEX)?;
            if tx_index.get(digest)?.is_some() {
                return Ok(None);
            }
            tx_index.insert(digest, reward.id.as_str())?;

            let mut rewards = write_txn.open_table(REWARDS)?;
            rewards.insert(reward.id.as_str(), reward_json.as_slice())?;

            let mut users = write_txn.open_table(USERS)?;
            let raw = users.get(address)?.map(|v| v.value().to_vec());
            let mut user: User = match raw {
                Some(bytes) => serde_json::from_slice(&bytes)?,
                None => return Err(DbError::NotFound(format!("user {address}"))),
            };
            apply(&mut user);
            users.insert(address, serde_json::to_vec(&user)?.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(Some(updated))
    }

    pub fn get_reward(&self, reward_id: &str) -> DbResult<Option<RewardRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REWARDS)?;
        match table.get(reward_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Reward id previously recorded for a chain digest, if any.
    pub fn reward_for_digest(&self, digest: &str) -> DbResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REWARD_TX_INDEX)?;
        Ok(table.get(digest)?.map(|v| v.value().to_string()))
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    /// Record a purchase together with the debit of the user aggregate
    /// (applied through `apply` inside the write transaction) and the
    /// corresponding negative reward movement, atomically.
    ///
    /// Returns `None` (and writes nothing) when the movement's digest was
    /// already applied, so replaying a completion is a no-op.
    pub fn record_purchase(
        &self,
        purchase: &PurchaseRecord,
        movement: &RewardRecord,
        apply: impl FnOnce(&mut User),
    ) -> DbResult<Option<User>> {
        let purchase_json = serde_json::to_vec(purchase)?;
        let movement_json = serde_json::to_vec(movement)?;
        let timestamp = purchase.created_at.timestamp();

        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut tx_index = write_txn.open_table(REWARD_TX_INDEX)?;
            if let Some(digest) = movement.tx_hash.as_deref() {
                if tx_index.get(digest)?.is_some() {
                    return Ok(None);
                }
                tx_index.insert(digest, movement.id.as_str())?;
            }

            let mut purchases = write_txn.open_table(PURCHASES)?;
            purchases.insert(purchase.id.as_str(), purchase_json.as_slice())?;

            let mut idx = write_txn.open_table(PURCHASE_USER_INDEX)?;
            let key = make_index_key(&purchase.user_address, timestamp, &purchase.id);
            idx.insert(key.as_slice(), purchase.id.as_str())?;

            let mut users = write_txn.open_table(USERS)?;
            let raw = users.get(purchase.user_address.as_str())?.map(|v| v.value().to_vec());
            let mut user: User = match raw {
                Some(bytes) => serde_json::from_slice(&bytes)?,
                None => return Err(DbError::NotFound(format!("user {}", purchase.user_address))),
            };
            apply(&mut user);
            users.insert(user.address.as_str(), serde_json::to_vec(&user)?.as_slice())?;

            let mut rewards = write_txn.open_table(REWARDS)?;
            rewards.insert(movement.id.as_str(), movement_json.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(Some(updated))
    }

    /// Newest-first listing of a user's purchases.
    pub fn list_purchases(&self, address: &str, limit: usize) -> DbResult<Vec<PurchaseRecord>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(PURCHASE_USER_INDEX)?;
        let purchases_table = read_txn.open_table(PURCHASES)?;

        let prefix = make_prefix(address);
        let prefix_end = make_prefix_end(address);

        let mut results = Vec::with_capacity(limit);
        for item in idx_table.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (_, purchase_id) = item?;
            if let Some(value) = purchases_table.get(purchase_id.value())? {
                results.push(serde_json::from_slice(value.value())?);
            }
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }
}

// =============================================================================
// Tests
// =============================================================================
