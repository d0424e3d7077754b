// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Balance: cached mirror next to on-chain truth.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::ApiError,
    ledger::tx::to_display,
    models::{BalanceResponse, UserAddress},
};

use super::db_error;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/v1/balance/{address}",
    tag = "Balance",
    params(("address" = String, Path, description = "Wallet address")),
    responses(
        (status = 200, body = BalanceResponse),
        (status = 404, description = "Unknown user"),
        (status = 503, description = "Ledger unreachable")
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let address = UserAddress::parse(&address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    let user = state
        .db
        .get_user(address.as_str())
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let on_chain = state
        .token
        .balance_of(address.as_str())
        .await
        .map_err(|err| {
            ApiError::service_unavailable("Ledger unreachable").with_details(err.to_string())
        })?;

    let divergent = user.coins_balance != on_chain.total;
    if divergent {
        tracing::warn!(
            address = %address,
            cached = user.coins_balance,
            on_chain = on_chain.total,
            "Cached balance mirror diverges from chain"
        );
    }

    Ok(Json(BalanceResponse {
        user_address: address.as_str().to_string(),
        cached_balance: user.coins_balance,
        on_chain_balance: on_chain.total,
        cached_display: to_display(user.coins_balance),
        on_chain_display: to_display(on_chain.total),
        divergent,
        coin_count: on_chain.coins.len(),
    }))
}
