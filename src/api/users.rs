// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Registration and user lookup.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    economy::{self, PlannedReward},
    error::ApiError,
    models::{RegisterUserRequest, RegisterUserResponse, UserAddress},
    storage::{RewardKind, User},
};

use super::db_error;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = RegisterUserRequest,
    tag = "Users",
    responses(
        (status = 200, body = RegisterUserResponse),
        (status = 400, description = "Malformed address"),
        (status = 409, description = "Already registered")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<Json<RegisterUserResponse>, ApiError> {
    let address = UserAddress::parse(&request.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;

    if state.db.get_user(address.as_str()).map_err(db_error)?.is_some() {
        return Err(ApiError::conflict("User already registered"));
    }

    let planned = PlannedReward {
        kind: RewardKind::Welcome,
        amount: economy::display_to_base(economy::WELCOME_REWARD),
        description: "welcome reward".into(),
    };
    let minted = state
        .settlement
        .mint_rewards(address.as_str(), std::slice::from_ref(&planned), &state.shutdown)
        .await;

    let mut user = User::new(address.as_str().to_string());
    user.coins_balance = minted.credited;

    let welcome = minted.records.into_iter().next();
    state
        .db
        .create_user(&user, welcome.as_ref())
        .map_err(db_error)?;

    tracing::info!(address = %address, "User registered");
    Ok(Json(RegisterUserResponse {
        user,
        welcome_reward: welcome,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/users/{address}",
    tag = "Users",
    params(("address" = String, Path, description = "Wallet address")),
    responses((status = 200, body = User), (status = 404, description = "Unknown user"))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<User>, ApiError> {
    let address = UserAddress::parse(&address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    state
        .db
        .get_user(address.as_str())
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let harness = testing::harness().await;
        let state = harness.state.clone();
        let address = testing::USER_ADDR;

        let response = register_user(
            State(state.clone()),
            Json(RegisterUserRequest {
                user_address: address.to_string(),
            }),
        )
        .await
        .expect("registration succeeds");

        assert_eq!(response.user.address, address);
        assert_eq!(response.user.lives_remaining, crate::storage::MAX_LIVES);
        let welcome = response.welcome_reward.as_ref().expect("welcome reward");
        assert_eq!(welcome.kind, RewardKind::Welcome);
        assert!(welcome.tx_hash.is_some());
        assert_eq!(response.user.coins_balance, welcome.amount as u64);

        let fetched = get_user(State(state), Path(address.to_string()))
            .await
            .expect("lookup succeeds");
        assert_eq!(fetched.address, address);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let harness = testing::harness().await;
        let state = harness.state.clone();
        let request = || RegisterUserRequest {
            user_address: testing::USER_ADDR.to_string(),
        };
        register_user(State(state.clone()), Json(request()))
            .await
            .expect("first registration succeeds");
        let err = register_user(State(state), Json(request()))
            .await
            .expect_err("second registration conflicts");
        assert_eq!(err.status, axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_before_any_side_effect() {
        let harness = testing::harness().await;
        let state = harness.state.clone();
        let err = register_user(
            State(state),
            Json(RegisterUserRequest {
                user_address: "not-an-address".into(),
            }),
        )
        .await
        .expect_err("validation fails");
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_user_is_404() {
        let harness = testing::harness().await;
        let state = harness.state.clone();
        let err = get_user(State(state), Path(testing::USER_ADDR.to_string()))
            .await
            .expect_err("lookup fails");
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }
}
