// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Paid summary generation settlement.
//!
//! Summary generation is a client-side feature; the server only settles its
//! token cost. `create` returns a sponsored burn envelope for the summary
//! price, `complete` applies the confirmed digest idempotently.

use axum::{extract::State, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    economy,
    error::ApiError,
    ledger::tx::{Operation, TransactionKind},
    models::{
        SummaryCompleteRequest, SummaryCompleteResponse, SummaryCreateRequest,
        SummaryCreateResponse, UserAddress,
    },
    state::AppState,
    storage::{RewardKind, RewardRecord},
};

use super::{db_error, ledger_error, sponsor::sponsor_error};

#[utoipa::path(
    post,
    path = "/v1/summaries/create",
    request_body = SummaryCreateRequest,
    tag = "Summaries",
    responses(
        (status = 200, body = SummaryCreateResponse),
        (status = 400, description = "Insufficient balance"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn create_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryCreateRequest>,
) -> Result<Json<SummaryCreateResponse>, ApiError> {
    let address = UserAddress::parse(&request.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    let user = state
        .db
        .get_user(address.as_str())
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let price = economy::display_to_base(economy::SUMMARY_PRICE);
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

    Ok(Json(SummaryCreateResponse {
        price,
        transaction_bytes: hex::encode(envelope.tx_bytes()),
        sponsor_signature: envelope.sponsor_signature().clone(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/summaries/complete",
    request_body = SummaryCompleteRequest,
    tag = "Summaries",
    responses(
        (status = 200, body = SummaryCompleteResponse),
        (status = 400, description = "Digest not confirmed"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn complete_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryCompleteRequest>,
) -> Result<Json<SummaryCompleteResponse>, ApiError> {
    let address = UserAddress::parse(&request.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    if state
        .db
        .get_user(address.as_str())
        .map_err(db_error)?
        .is_none()
    {
        return Err(ApiError::not_found("User not found"));
    }

    // The digest must settle this exact quote: a burn of the summary price
    // sent by this user. Any other confirmed transaction is refused.
    let price = economy::display_to_base(economy::SUMMARY_PRICE);
    state
        .settlement
        .confirm_burn(&request.digest, address.as_str(), price)
        .await
        .map_err(|err| {
            ApiError::bad_request("Transaction does not settle this summary")
                .with_details(err.to_string())
        })?;

    let movement = RewardRecord {
        id: Uuid::new_v4().to_string(),
        user_address: address.as_str().to_string(),
        kind: RewardKind::SummaryGeneration,
        amount: -(price as i64),
        description: "summary generation".into(),
        tx_hash: Some(request.digest.clone()),
        created_at: Utc::now(),
    };

    let applied = state
        .db
        .apply_settlement(&request.digest, address.as_str(), &movement, |user| {
            user.coins_balance = user.coins_balance.saturating_sub(price);
        })
        .map_err(db_error)?;
    let Some(updated) = applied else {
        let current = state
            .db
            .get_user(address.as_str())
            .map_err(db_error)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        return Ok(Json(SummaryCompleteResponse {
            applied: false,
            updated_user: current,
        }));
    };

    tracing::info!(address = %address, digest = %request.digest, "Summary settled");
    Ok(Json(SummaryCompleteResponse {
        applied: true,
        updated_user: updated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;

    #[tokio::test]
    async fn create_quotes_the_summary_price() {
        let harness = testing::harness().await;
        harness.register().await;
        let response = create_summary(
            State(harness.state),
            Json(SummaryCreateRequest {
                user_address: testing::USER_ADDR.to_string(),
            }),
        )
        .await
        .expect("quote succeeds");
        assert_eq!(response.price, 5_000_000_000);
        assert!(!response.transaction_bytes.is_empty());
    }

    #[tokio::test]
    async fn completion_is_idempotent_per_digest() {
        let harness = testing::harness().await;
        let registered = harness.register().await;
        let before = registered.user.coins_balance;

        let complete = |digest: &str| {
            let state = harness.state.clone();
            let digest = digest.to_string();
            async move {
                complete_summary(
                    State(state),
                    Json(SummaryCompleteRequest {
                        user_address: testing::USER_ADDR.to_string(),
                        digest,
                    }),
                )
                .await
            }
        };

        let digest = harness.settle_burn(5_000_000_000).await;
        let first = complete(&digest).await.expect("first completion");
        assert!(first.applied);
        assert_eq!(first.updated_user.coins_balance, before - 5_000_000_000);

        let replay = complete(&digest).await.expect("replay is a no-op");
        assert!(!replay.applied);
        assert_eq!(
            replay.updated_user.coins_balance,
            first.updated_user.coins_balance
        );
    }

    #[tokio::test]
    async fn burn_of_the_wrong_amount_does_not_settle() {
        let harness = testing::harness().await;
        harness.register().await;

        let digest = harness.settle_burn(30_000_000_000).await;
        let err = complete_summary(
            State(harness.state.clone()),
            Json(SummaryCompleteRequest {
                user_address: testing::USER_ADDR.to_string(),
                digest: digest.clone(),
            }),
        )
        .await
        .expect_err("wrong amount");
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(harness
            .state
            .db
            .reward_for_digest(&digest)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn failed_digest_is_rejected() {
        let harness = testing::harness().await;
        harness.register().await;
        let err = complete_summary(
            State(harness.state),
            Json(SummaryCompleteRequest {
                user_address: testing::USER_ADDR.to_string(),
                digest: "0xfailed".into(),
            }),
        )
        .await
        .expect_err("failed digest");
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
