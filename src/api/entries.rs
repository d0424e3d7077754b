// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Diary entry endpoints: create, list, fetch, decrypt.
//!
//! The server only ever handles ciphertext on the write path; plaintext
//! appears exclusively in decrypt responses.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    economy::{self, streak},
    entries::EntryStoreError,
    error::ApiError,
    models::{
        CreateEntryRequest, CreateEntryResponse, DecryptEntryRequest, DecryptEntryResponse,
        EntryView, ListEntriesResponse, UserAddress,
    },
    sealing::{DecryptError, EncryptionEnvelope, SessionCredential},
    state::AppState,
    storage::{EntryContent, EntryRecord},
};

use super::db_error;

/// Last-N listing size.
const LIST_LIMIT: usize = 20;

fn entry_view(entry: &EntryRecord, content: Option<Vec<u8>>) -> EntryView {
    let (storage_tier, blob_id) = match &entry.content {
        EntryContent::Blob { blob_id, .. } => ("blob", Some(blob_id.clone())),
        EntryContent::Inline { .. } => ("inline", None),
    };
    EntryView {
        id: entry.id.clone(),
        user_address: entry.user_address.clone(),
        date: entry.date.to_string(),
        word_count: entry.word_count,
        encrypted_content: content.map(hex::encode),
        content_hash: entry.content_hash.clone(),
        encryption_method: entry.encryption.method_tag().to_string(),
        storage_tier: storage_tier.to_string(),
        blob_id,
        created_at: entry.created_at.to_rfc3339(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/entries",
    request_body = CreateEntryRequest,
    tag = "Entries",
    responses(
        (status = 200, body = CreateEntryResponse),
        (status = 400, description = "Validation failure"),
        (status = 404, description = "Unknown user"),
        (status = 409, description = "Entry already exists for today")
    )
)]
pub async fn create_entry(
    State(state): State<AppState>,
    Json(request): Json<CreateEntryRequest>,
) -> Result<Json<CreateEntryResponse>, ApiError> {
    let address = UserAddress::parse(&request.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    if request.encrypted_content.is_empty() {
        return Err(ApiError::bad_request("Missing encryptedContent"));
    }
    if request.signature.is_empty() {
        return Err(ApiError::bad_request("Missing signature"));
    }
    if request.content_hash.is_empty() {
        return Err(ApiError::bad_request("Missing contentHash"));
    }
    let encryption = EncryptionEnvelope::from_request(
        &request.encryption_method,
        request.package_id,
        request.identity_id,
        request.threshold,
    )
    .map_err(|reason| ApiError::bad_request("Invalid encryption method").with_details(reason))?;
    if let (EncryptionEnvelope::Threshold { package_id, .. }, Some(expected)) =
        (&encryption, state.config.threshold_package_id.as_deref())
    {
        if package_id != expected {
            return Err(ApiError::bad_request("Unknown threshold package")
                .with_details(package_id.clone()));
        }
    }
    let ciphertext = hex::decode(request.encrypted_content.trim_start_matches("0x"))
        .map_err(|err| {
            ApiError::bad_request("Malformed encryptedContent").with_details(err.to_string())
        })?;

    let user = state
        .db
        .get_user(address.as_str())
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let today = Utc::now().date_naive();
    if state
        .db
        .entry_for_day(address.as_str(), today)
        .map_err(db_error)?
        .is_some()
    {
        return Err(ApiError::conflict("Entry already exists for today"));
    }

    // Placement is tier-strict: a blob write failure fails the request.
    let content = state.entry_store.write(ciphertext).await.map_err(|err| {
        ApiError::internal("Failed to store entry content").with_details(err.to_string())
    })?;

    let entry = EntryRecord {
        id: Uuid::new_v4().to_string(),
        user_address: address.as_str().to_string(),
        date: today,
        word_count: request.word_count,
        content,
        signature: request.signature,
        content_hash: request.content_hash,
        encryption,
        created_at: Utc::now(),
    };

    // Claim the (user, day) slot before any coins move. Of two concurrent
    // submissions, the loser conflicts here with nothing minted on-chain.
    state.db.create_entry(&entry).map_err(db_error)?;

    let is_first_entry = user.last_entry_date.is_none();
    let new_streak = streak::advance(user.last_entry_date, today, user.current_streak);
    let planned = economy::quote_entry_rewards(is_first_entry, new_streak);
    let minted = state
        .settlement
        .mint_rewards(address.as_str(), &planned, &state.shutdown)
        .await;

    let credited = minted.credited;
    let mut old_lives = user.lives_remaining;
    let updated = state
        .db
        .settle_entry(address.as_str(), &minted.records, |u| {
            old_lives = u.lives_remaining;
            u.current_streak = new_streak;
            u.longest_streak = streak::longest(u.longest_streak, new_streak);
            u.last_entry_date = Some(today);
            u.restore_lives(economy::LIVES_PER_ENTRY);
            u.add_happiness(economy::HAPPINESS_PER_ENTRY);
            u.coins_balance += credited;
        })
        .map_err(db_error)?;

    tracing::info!(
        address = %address,
        entry_id = %entry.id,
        streak = new_streak,
        "Entry created"
    );

    let hydrated = state.entry_store.read(&entry).await.ok();
    Ok(Json(CreateEntryResponse {
        entry: entry_view(&entry, hydrated),
        reward: minted.records.first().cloned(),
        rewards: minted.records,
        updated_user: updated.clone(),
        lives_restored: updated.lives_remaining - old_lives,
        old_lives,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesQuery {
    pub user_address: String,
}

#[utoipa::path(
    get,
    path = "/v1/entries",
    tag = "Entries",
    params(("userAddress" = String, Query, description = "Wallet address")),
    responses((status = 200, body = ListEntriesResponse), (status = 404))
)]
pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<ListEntriesResponse>, ApiError> {
    let address = UserAddress::parse(&query.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    if state
        .db
        .get_user(address.as_str())
        .map_err(db_error)?
        .is_none()
    {
        return Err(ApiError::not_found("User not found"));
    }

    let records = state
        .db
        .list_entries(address.as_str(), LIST_LIMIT)
        .map_err(db_error)?;

    let mut views = Vec::with_capacity(records.len());
    for record in &records {
        // A hydration failure degrades the one listing row, not the list.
        let content = match state.entry_store.read(record).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(entry_id = %record.id, error = %err, "Hydration failed in listing");
                None
            }
        };
        views.push(entry_view(record, content));
    }
    Ok(Json(ListEntriesResponse { entries: views }))
}

#[utoipa::path(
    get,
    path = "/v1/entries/{entry_id}",
    tag = "Entries",
    params(("entry_id" = String, Path, description = "Entry id")),
    responses((status = 200, body = EntryView), (status = 404), (status = 500))
)]
pub async fn get_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> Result<Json<EntryView>, ApiError> {
    let record = state
        .db
        .get_entry(&entry_id)
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Entry not found"))?;

    let content = state
        .entry_store
        .read(&record)
        .await
        .map_err(entry_store_error)?;
    Ok(Json(entry_view(&record, Some(content))))
}

#[utoipa::path(
    post,
    path = "/v1/entries/{entry_id}/decrypt",
    request_body = DecryptEntryRequest,
    tag = "Entries",
    params(("entry_id" = String, Path, description = "Entry id")),
    responses(
        (status = 200, body = DecryptEntryResponse),
        (status = 400, description = "Missing or expired session"),
        (status = 403, description = "Not the entry owner"),
        (status = 404, description = "Unknown entry")
    )
)]
pub async fn decrypt_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Json(request): Json<DecryptEntryRequest>,
) -> Result<Json<DecryptEntryResponse>, ApiError> {
    let address = UserAddress::parse(&request.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    let record = state
        .db
        .get_entry(&entry_id)
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Entry not found"))?;
    if record.user_address != address.as_str() {
        return Err(ApiError::forbidden("Entry belongs to another user"));
    }

    let ciphertext = state
        .entry_store
        .read(&record)
        .await
        .map_err(entry_store_error)?;

    let session = match (&record.encryption, request.session_key) {
        (EncryptionEnvelope::Threshold { .. }, Some(key_hex)) => {
            let key = hex::decode(key_hex.trim_start_matches("0x")).map_err(|err| {
                ApiError::bad_request("Malformed sessionKey").with_details(err.to_string())
            })?;
            let ttl = request.session_ttl_minutes.unwrap_or(10);
            let mut session = SessionCredential::new(address.as_str().to_string(), key, ttl)
                .map_err(|err| {
                    ApiError::bad_request("Invalid session").with_details(err.to_string())
                })?;
            if let Some(sig_hex) = request.session_signature {
                let sig = hex::decode(sig_hex.trim_start_matches("0x")).map_err(|err| {
                    ApiError::bad_request("Malformed sessionSignature")
                        .with_details(err.to_string())
                })?;
                session.bind_signature(sig).map_err(|err| {
                    ApiError::bad_request("Invalid session").with_details(err.to_string())
                })?;
            }
            Some(session)
        }
        _ => None,
    };

    let outcome = state
        .resolver
        .decrypt(
            &record.encryption,
            address.as_str(),
            &ciphertext,
            session.as_ref(),
        )
        .await
        .map_err(decrypt_error)?;

    let plaintext = String::from_utf8(outcome.plaintext).map_err(|_| {
        ApiError::internal("Decrypted content is not valid UTF-8")
    })?;
    Ok(Json(DecryptEntryResponse {
        entry_id,
        plaintext,
        method_used: outcome.method_used.to_string(),
        fallback_used: outcome.fallback_used,
    }))
}

fn entry_store_error(err: EntryStoreError) -> ApiError {
    ApiError::internal("Failed to load entry content").with_details(err.to_string())
}

fn decrypt_error(err: DecryptError) -> ApiError {
    match err {
        DecryptError::SessionRequired | DecryptError::Session(_) => {
            ApiError::bad_request("Decryption not authorized").with_details(err.to_string())
        }
        DecryptError::ThresholdUnavailable => {
            ApiError::internal("No threshold key service configured")
        }
        other => ApiError::internal("Decryption failed").with_details(other.to_string()),
    }
}
