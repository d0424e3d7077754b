// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;
use crate::storage::DbError;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub network: &'static str,
    pub blob_tier: bool,
    /// Outcome of the database round trip: "ok" or the failure message.
    pub database: String,
}

fn health_response(
    database: Result<(), DbError>,
    network: &'static str,
    blob_tier: bool,
) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, database) = match database {
        Ok(()) => (StatusCode::OK, "ok", "ok".to_string()),
        Err(err) => (StatusCode::SERVICE_UNAVAILABLE, "degraded", err.to_string()),
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            network,
            blob_tier,
            database,
        }),
    )
}

/// Readiness endpoint. The database check is a real write-read-delete round
/// trip, not a static banner, so a wedged store flips the response to 503.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, body = HealthResponse),
        (status = 503, description = "Database round trip failed", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    health_response(
        state.db.health_check(),
        state.client.network().name,
        state.entry_store.blob_tier_enabled(),
    )
}
