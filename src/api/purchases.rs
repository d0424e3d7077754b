// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Shop catalog and the two-step purchase flow.
//!
//! `create` quotes an item and returns a sponsored burn envelope; the client
//! co-signs and submits it through `/v1/sponsor/execute`, then calls
//! `complete` with the digest. Completion is idempotent per digest.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    economy,
    error::ApiError,
    ledger::tx::{Operation, TransactionKind},
    models::{
        PurchaseCompleteRequest, PurchaseCompleteResponse, PurchaseCreateRequest,
        PurchaseCreateResponse, ShopItem, UserAddress,
    },
    state::AppState,
    storage::{PurchaseRecord, RewardKind, RewardRecord, User},
};

use super::{db_error, ledger_error, sponsor::sponsor_error};

/// Fixed shop catalog. Prices are display units.
pub const CATALOG: &[ShopItem] = &[
    ShopItem {
        id: "extra_life",
        name: "Extra Life",
        price: 30,
        description: "Restores one pet life",
    },
    ShopItem {
        id: "happiness_boost",
        name: "Happiness Boost",
        price: 15,
        description: "Adds 20 happiness",
    },
    ShopItem {
        id: "premium_theme",
        name: "Premium Theme",
        price: 100,
        description: "Unlocks the premium diary theme",
    },
];

/// Items a user can hold at most one of.
fn is_unique(item_id: &str) -> bool {
    item_id == "premium_theme"
}

fn catalog_item(item_id: &str) -> Result<&'static ShopItem, ApiError> {
    CATALOG
        .iter()
        .find(|item| item.id == item_id)
        .ok_or_else(|| ApiError::not_found("Item not found"))
}

fn apply_item_effect(user: &mut User, item_id: &str) {
    match item_id {
        "extra_life" => user.restore_lives(1),
        "happiness_boost" => user.add_happiness(20),
        _ => {}
    }
}

#[utoipa::path(
    get,
    path = "/v1/shop",
    tag = "Shop",
    responses((status = 200, body = [ShopItem]))
)]
pub async fn list_shop() -> Json<Vec<ShopItem>> {
    Json(CATALOG.to_vec())
}

#[utoipa::path(
    post,
    path = "/v1/purchases/create",
    request_body = PurchaseCreateRequest,
    tag = "Shop",
    responses(
        (status = 200, body = PurchaseCreateResponse),
        (status = 400, description = "Insufficient balance"),
        (status = 404, description = "Unknown user or item"),
        (status = 409, description = "Item already owned")
    )
)]
pub async fn create_purchase(
    State(state): State<AppState>,
    Json(request): Json<PurchaseCreateRequest>,
) -> Result<Json<PurchaseCreateResponse>, ApiError> {
    let address = UserAddress::parse(&request.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    let item = catalog_item(&request.item_id)?;
    let user = state
        .db
        .get_user(address.as_str())
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if is_unique(item.id) && user.inventory.contains_key(item.id) {
        return Err(ApiError::conflict("Item already owned"));
    }

    let price = economy::display_to_base(item.price);
    let coin = state
        .token
        .select_coin(address.as_str(), price, Some(user.coins_balance))
        .await
        .map_err(ledger_error)?;

    let kind = TransactionKind {
        sender: address.as_str().to_string(),
        operation: Operation::BurnCoin {
            coin: coin.object_ref,
            amount: price,
        },
    };
    let envelope = state
        .sponsor
        .sponsor(&kind.to_kind_bytes(), address.as_str(), &state.shutdown)
        .await
        .map_err(sponsor_error)?;

    Ok(Json(PurchaseCreateResponse {
        item_id: item.id.to_string(),
        price,
        transaction_bytes: hex::encode(envelope.tx_bytes()),
        sponsor_signature: envelope.sponsor_signature().clone(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/purchases/complete",
    request_body = PurchaseCompleteRequest,
    tag = "Shop",
    responses(
        (status = 200, body = PurchaseCompleteResponse),
        (status = 400, description = "Digest not confirmed"),
        (status = 404, description = "Unknown user or item")
    )
)]
pub async fn complete_purchase(
    State(state): State<AppState>,
    Json(request): Json<PurchaseCompleteRequest>,
) -> Result<Json<PurchaseCompleteResponse>, ApiError> {
    let address = UserAddress::parse(&request.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    let item = catalog_item(&request.item_id)?;
    if state
        .db
        .get_user(address.as_str())
        .map_err(db_error)?
        .is_none()
    {
        return Err(ApiError::not_found("User not found"));
    }

    // The digest must settle this exact quote: a burn of the item's price
    // sent by this user. Any other confirmed transaction is refused.
    let price = economy::display_to_base(item.price);
    state
        .settlement
        .confirm_burn(&request.digest, address.as_str(), price)
        .await
        .map_err(|err| {
            ApiError::bad_request("Transaction does not settle this purchase")
                .with_details(err.to_string())
        })?;

    let now = Utc::now();
    let purchase = PurchaseRecord {
        id: Uuid::new_v4().to_string(),
        user_address: address.as_str().to_string(),
        item_id: item.id.to_string(),
        price,
        tx_hash: Some(request.digest.clone()),
        created_at: now,
    };
    let movement = RewardRecord {
        id: Uuid::new_v4().to_string(),
        user_address: address.as_str().to_string(),
        kind: RewardKind::ShopPurchase,
        amount: -(price as i64),
        description: format!("shop purchase: {}", item.name),
        tx_hash: Some(request.digest.clone()),
        created_at: now,
    };

    let item_id = item.id;
    let applied = state
        .db
        .record_purchase(&purchase, &movement, |user| {
            user.coins_balance = user.coins_balance.saturating_sub(price);
            *user.inventory.entry(item_id.to_string()).or_insert(0) += 1;
            apply_item_effect(user, item_id);
        })
        .map_err(db_error)?;
    let Some(updated) = applied else {
        // Replay: serve the already-applied state.
        let current = state
            .db
            .get_user(address.as_str())
            .map_err(db_error)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        return Ok(Json(PurchaseCompleteResponse {
            applied: false,
            updated_user: current,
        }));
    };

    tracing::info!(
        address = %address,
        item = item.id,
        digest = %request.digest,
        "Purchase settled"
    );
    Ok(Json(PurchaseCompleteResponse {
        applied: true,
        updated_user: updated,
    }))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPurchasesQuery {
    pub user_address: String,
}

#[utoipa::path(
    get,
    path = "/v1/purchases",
    tag = "Shop",
    params(("userAddress" = String, Query, description = "Wallet address")),
    responses((status = 200))
)]
pub async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<ListPurchasesQuery>,
) -> Result<Json<Vec<PurchaseRecord>>, ApiError> {
    let address = UserAddress::parse(&query.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    state
        .db
        .list_purchases(address.as_str(), 50)
        .map_err(db_error)
        .map(Json)
}
