// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Gas-abstracted transaction endpoints.
//!
//! `create` sponsors client-built kind bytes (or hands back the data needed
//! to build them); `execute` submits the dual-signed envelope. The user is
//! checked for token ownership before anything is built, so an empty
//! account fails fast with a validation error rather than a sponsorship
//! failure.

use axum::{extract::State, Json};

use crate::{
    error::ApiError,
    ledger::sponsor::SponsorError,
    ledger::tx::to_base_units,
    models::{
        SponsorCreateRequest, SponsorCreateResponse, SponsorExecuteRequest,
        SponsorExecuteResponse, TransactionTemplate, UserAddress,
    },
    state::AppState,
};

use super::{db_error, ledger_error};

#[utoipa::path(
    post,
    path = "/v1/sponsor/create",
    request_body = SponsorCreateRequest,
    tag = "Sponsor",
    responses(
        (status = 200, body = SponsorCreateResponse),
        (status = 400, description = "Validation failure or no tokens"),
        (status = 500, description = "Sponsorship failure")
    )
)]
pub async fn create_sponsorship(
    State(state): State<AppState>,
    Json(request): Json<SponsorCreateRequest>,
) -> Result<Json<SponsorCreateResponse>, ApiError> {
    let address = UserAddress::parse(&request.user_address)
        .map_err(|reason| ApiError::bad_request("Invalid address").with_details(reason))?;
    let amount = to_base_units(request.amount)
        .map_err(|err| ApiError::bad_request("Invalid amount").with_details(err.to_string()))?;

    // Ownership check comes first: no transaction is ever built for an
    // account holding zero token coins.
    let on_chain = state
        .token
        .balance_of(address.as_str())
        .await
        .map_err(ledger_error)?;
    if on_chain.coins.is_empty() {
        return Err(ApiError::bad_request("No tokens on blockchain"));
    }

    match request.transaction_kind_bytes {
        Some(kind_hex) => {
            let kind_bytes = hex::decode(kind_hex.trim_start_matches("0x")).map_err(|err| {
                ApiError::bad_request("Malformed transactionKindBytes")
                    .with_details(err.to_string())
            })?;
            let envelope = state
                .sponsor
                .sponsor(&kind_bytes, address.as_str(), &state.shutdown)
                .await
                .map_err(sponsor_error)?;
            Ok(Json(SponsorCreateResponse {
                transaction_bytes: Some(hex::encode(envelope.tx_bytes())),
                sponsor_signature: Some(envelope.sponsor_signature().clone()),
                transaction_data: None,
            }))
        }
        None => {
            let cached_mirror = state
                .db
                .get_user(address.as_str())
                .map_err(db_error)?
                .map(|u| u.coins_balance);
            let coin = state
                .token
                .select_coin(address.as_str(), amount, cached_mirror)
                .await
                .map_err(ledger_error)?;
            Ok(Json(SponsorCreateResponse {
                transaction_bytes: None,
                sponsor_signature: None,
                transaction_data: Some(TransactionTemplate {
                    sender: address.as_str().to_string(),
                    coin_object_id: coin.object_ref.object_id,
                    coin_version: coin.object_ref.version,
                    coin_digest: coin.object_ref.digest,
                    amount,
                }),
            }))
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/sponsor/execute",
    request_body = SponsorExecuteRequest,
    tag = "Sponsor",
    responses(
        (status = 200, body = SponsorExecuteResponse),
        (status = 400, description = "Signature or envelope failure"),
        (status = 500, description = "Execution failure")
    )
)]
pub async fn execute_sponsored(
    State(state): State<AppState>,
    Json(request): Json<SponsorExecuteRequest>,
) -> Result<Json<SponsorExecuteResponse>, ApiError> {
    let tx_bytes = hex::decode(request.transaction_bytes.trim_start_matches("0x"))
        .map_err(|err| {
            ApiError::bad_request("Malformed transactionBytes").with_details(err.to_string())
        })?;

    let result = state
        .sponsor
        .execute(tx_bytes, request.user_signature, request.sponsor_signature)
        .await
        .map_err(sponsor_error)?;

    let explorer_url = state.client.explorer_tx_url(&result.digest);
    Ok(Json(SponsorExecuteResponse {
        digest: result.digest,
        explorer_url,
    }))
}

/// Map sponsorship failures onto the API taxonomy. Client-correctable
/// problems are 400-class; infrastructure problems keep their detail.
pub(crate) fn sponsor_error(err: SponsorError) -> ApiError {
    match err {
        SponsorError::SenderMismatch { .. } | SponsorError::Expired => {
            ApiError::bad_request("Invalid transaction envelope").with_details(err.to_string())
        }
        SponsorError::SignatureMismatch(detail) => {
            ApiError::bad_request("Signature verification failed").with_details(detail)
        }
        SponsorError::NoGasCoins => {
            ApiError::internal("Sponsorship failed").with_details("operator has no gas coins")
        }
        SponsorError::Cancelled => ApiError::service_unavailable("Server shutting down"),
        SponsorError::Ledger(inner) => ledger_error(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;
    use crate::ledger::keys::OperatorKey;
    use crate::ledger::rpc::LedgerRpc;
    use crate::ledger::tx::{Operation, TransactionKind};

    async fn sponsored_burn(
        harness: &testing::Harness,
        amount: u64,
    ) -> (String, crate::ledger::types::LedgerSignature) {
        let coins = harness
            .ledger
            .owned_coins(testing::USER_ADDR, testing::DIARY)
            .await
            .unwrap();
        let coin = coins
            .iter()
            .find(|c| c.balance >= amount)
            .expect("coin large enough")
            .clone();

        let kind = TransactionKind {
            sender: testing::USER_ADDR.to_string(),
            operation: Operation::BurnCoin {
                coin: coin.object_ref,
                amount,
            },
        };
        let response = create_sponsorship(
            State(harness.state.clone()),
            Json(SponsorCreateRequest {
                user_address: testing::USER_ADDR.to_string(),
                amount: crate::ledger::tx::to_display(amount),
                transaction_kind_bytes: Some(hex::encode(kind.to_kind_bytes())),
            }),
        )
        .await
        .expect("sponsorship succeeds");

        (
            response.transaction_bytes.clone().expect("bytes"),
            response.sponsor_signature.clone().expect("signature"),
        )
    }

    #[tokio::test]
    async fn zero_coin_account_fails_before_anything_is_built() {
        let harness = testing::harness().await;
        let err = create_sponsorship(
            State(harness.state),
            Json(SponsorCreateRequest {
                user_address: testing::USER_ADDR.to_string(),
                amount: 1.0,
                transaction_kind_bytes: None,
            }),
        )
        .await
        .expect_err("no tokens");
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.error, "No tokens on blockchain");
    }

    #[tokio::test]
    async fn create_without_kind_bytes_returns_a_template() {
        let harness = testing::harness().await;
        harness.register().await;

        let response = create_sponsorship(
            State(harness.state),
            Json(SponsorCreateRequest {
                user_address: testing::USER_ADDR.to_string(),
                amount: 1.0,
                transaction_kind_bytes: None,
            }),
        )
        .await
        .expect("template returned");
        let template = response.transaction_data.as_ref().expect("template");
        assert_eq!(template.sender, testing::USER_ADDR);
        assert_eq!(template.amount, 1_000_000_000);
        assert!(response.transaction_bytes.is_none());
    }

    #[tokio::test]
    async fn dual_signed_envelope_executes_and_burns() {
        let harness = testing::harness().await;
        harness.register().await;
        let before = harness
            .ledger
            .owned_coins(testing::USER_ADDR, testing::DIARY)
            .await
            .unwrap()
            .iter()
            .map(|c| c.balance)
            .sum::<u64>();

        let (tx_hex, sponsor_sig) = sponsored_burn(&harness, 1_000_000_000).await;

        let user_key = OperatorKey::load(testing::USER_KEY_HEX).unwrap();
        let tx_bytes = hex::decode(&tx_hex).unwrap();
        let user_sig = user_key.sign(&tx_bytes);

        let response = execute_sponsored(
            State(harness.state),
            Json(SponsorExecuteRequest {
                transaction_bytes: tx_hex,
                user_signature: user_sig,
                sponsor_signature: sponsor_sig,
            }),
        )
        .await
        .expect("execution succeeds");
        assert!(response.digest.starts_with("0xdigest"));

        let after = harness
            .ledger
            .owned_coins(testing::USER_ADDR, testing::DIARY)
            .await
            .unwrap()
            .iter()
            .map(|c| c.balance)
            .sum::<u64>();
        assert_eq!(after, before - 1_000_000_000);
    }

    #[tokio::test]
    async fn user_signature_over_different_bytes_is_rejected() {
        let harness = testing::harness().await;
        harness.register().await;
        let (tx_hex, sponsor_sig) = sponsored_burn(&harness, 1_000_000_000).await;

        let user_key = OperatorKey::load(testing::USER_KEY_HEX).unwrap();
        let user_sig = user_key.sign(b"some other bytes entirely");

        let err = execute_sponsored(
            State(harness.state),
            Json(SponsorExecuteRequest {
                transaction_bytes: tx_hex,
                user_signature: user_sig,
                sponsor_signature: sponsor_sig,
            }),
        )
        .await
        .expect_err("verification fails");
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.error, "Signature verification failed");
    }
}
