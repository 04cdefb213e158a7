// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

const OK: &str = "ok";
const UNAVAILABLE: &str = "unavailable";

/// Readiness response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Storage root is writable.
    pub storage: String,
    /// Signing keys can be served (fresh or stale).
    pub jwks: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

async fn check_storage(state: &AppState) -> &'static str {
    match state.storage.health_check().await {
        Ok(()) => OK,
        Err(e) => {
            tracing::warn!(target: "media.storage", error = %e, "Storage health check failed");
            UNAVAILABLE
        }
    }
}

async fn check_jwks(state: &AppState) -> &'static str {
    let key_sets = &state.auth.key_sets;
    if key_sets.is_fresh().await {
        return OK;
    }

    match key_sets.get_key_set(state.auth.config.fetch_timeout).await {
        Ok(_) => OK,
        Err(_) => UNAVAILABLE,
    }
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: OK.to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 if storage and signing keys are available, 503 otherwise.
#[utoipa::path(
    get,
    path = "/healthz/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let (storage, jwks) = tokio::join!(check_storage(&state), check_jwks(&state));
    let all_ok = storage == OK && jwks == OK;

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: OK.to_string(),
            storage: storage.to_string(),
            jwks: jwks.to_string(),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
