// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! API request/response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ledger::types::LedgerSignature;
use crate::storage::{RewardRecord, User};

/// Validated wallet address: `0x` followed by 64 hex characters, stored
/// lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserAddress(String);

impl UserAddress {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let lowered = raw.trim().to_lowercase();
        let hex_part = lowered
            .strip_prefix("0x")
            .ok_or("address must start with 0x")?;
        if hex_part.len() != 64 {
            return Err(format!(
                "address must be 0x followed by 64 hex characters, got {} characters",
                hex_part.len()
            ));
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("address contains non-hex characters".into());
        }
        Ok(Self(lowered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub user_address: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserResponse {
    pub user: User,
    pub welcome_reward: Option<RewardRecord>,
}

/// Cached mirror vs. on-chain truth, reported side by side. The mirror is
/// advisory; the chain column is authoritative.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_address: String,
    /// Cached mirror, base units.
    pub cached_balance: u64,
    /// On-chain total across coin objects, base units.
    pub on_chain_balance: u64,
    pub cached_display: f64,
    pub on_chain_display: f64,
    pub divergent: bool,
    pub coin_count: usize,
}

// =============================================================================
// Sponsorship
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorCreateRequest {
    pub user_address: String,
    /// Display units.
    pub amount: f64,
    /// Hex-encoded transaction kind bytes built by the client. When absent,
    /// the response carries the data the client needs to build them.
    pub transaction_kind_bytes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorCreateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_bytes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_signature: Option<LedgerSignature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_data: Option<TransactionTemplate>,
}

/// Everything a client needs to assemble kind bytes itself.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTemplate {
    pub sender: String,
    pub coin_object_id: String,
    pub coin_version: u64,
    pub coin_digest: String,
    /// Base units.
    pub amount: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorExecuteRequest {
    /// Hex-encoded sealed transaction bytes, exactly as returned by create.
    pub transaction_bytes: String,
    pub user_signature: LedgerSignature,
    pub sponsor_signature: LedgerSignature,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorExecuteResponse {
    pub digest: String,
    pub explorer_url: String,
}

// =============================================================================
// Entries
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryRequest {
    pub user_address: String,
    /// Hex-encoded ciphertext. The server never sees plaintext here.
    pub encrypted_content: String,
    pub signature: String,
    pub content_hash: String,
    pub word_count: u32,
    /// `legacy` or `threshold`.
    pub encryption_method: String,
    pub package_id: Option<String>,
    pub identity_id: Option<String>,
    pub threshold: Option<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryResponse {
    pub entry: EntryView,
    /// Primary reward for this entry.
    pub reward: Option<RewardRecord>,
    /// Every movement minted for this entry, primary included.
    pub rewards: Vec<RewardRecord>,
    pub updated_user: User,
    pub lives_restored: u8,
    pub old_lives: u8,
}

/// Entry as served to clients, with the ciphertext hydrated through the
/// storage tier.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub id: String,
    pub user_address: String,
    pub date: String,
    pub word_count: u32,
    /// Hex ciphertext; `None` when hydration failed for a listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_content: Option<String>,
    pub content_hash: String,
    pub encryption_method: String,
    pub storage_tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesResponse {
    pub entries: Vec<EntryView>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecryptEntryRequest {
    pub user_address: String,
    /// Threshold entries only: ephemeral session public key, hex.
    pub session_key: Option<String>,
    /// Wallet signature authorizing the session, hex.
    pub session_signature: Option<String>,
    pub session_ttl_minutes: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecryptEntryResponse {
    pub entry_id: String,
    pub plaintext: String,
    pub method_used: String,
    pub fallback_used: bool,
}

// =============================================================================
// Shop / Purchases
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
    pub id: &'static str,
    pub name: &'static str,
    /// Display units.
    pub price: u64,
    pub description: &'static str,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCreateRequest {
    pub user_address: String,
    pub item_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCreateResponse {
    pub item_id: String,
    /// Base units the burn will spend.
    pub price: u64,
    pub transaction_bytes: String,
    pub sponsor_signature: LedgerSignature,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCompleteRequest {
    pub user_address: String,
    pub item_id: String,
    pub digest: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCompleteResponse {
    pub applied: bool,
    pub updated_user: User,
}

// =============================================================================
// Summaries
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCreateRequest {
    pub user_address: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCreateResponse {
    /// Base units the burn will spend.
    pub price: u64,
    pub transaction_bytes: String,
    pub sponsor_signature: LedgerSignature,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCompleteRequest {
    pub user_address: String,
    pub digest: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCompleteResponse {
    pub applied: bool,
    pub updated_user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_normalized_to_lowercase() {
        let raw = format!("0x{}", "A1".repeat(32));
        let addr = UserAddress::parse(&raw).unwrap();
        assert_eq!(addr.as_str(), format!("0x{}", "a1".repeat(32)));
    }

    #[test]
    fn address_without_prefix_is_rejected() {
        let err = UserAddress::parse(&"a1".repeat(33)).unwrap_err();
        assert!(err.contains("0x"));
    }

    #[test]
    fn address_with_wrong_length_is_rejected() {
        let err = UserAddress::parse("0xabc").unwrap_err();
        assert!(err.contains("64 hex"));
    }

    #[test]
    fn address_with_non_hex_is_rejected() {
        let raw = format!("0x{}", "zz".repeat(32));
        let err = UserAddress::parse(&raw).unwrap_err();
        assert!(err.contains("non-hex"));
    }
}
