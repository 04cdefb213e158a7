// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{require_auth, require_permissions, RequiredPermissions},
    models::{ErrorResponse, PermissionErrorResponse, UploadForm, UploadResponse},
    state::AppState,
};

pub mod files;
pub mod health;

pub const UPLOAD_PERMISSION: &str = "files:upload";
pub const DELETE_PERMISSION: &str = "files:delete";

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let auth_gate = from_fn_with_state(state.auth.clone(), require_auth);
    let body_limit = usize::try_from(state.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let upload = post(files::upload_file)
        .route_layer(from_fn_with_state(
            RequiredPermissions::new([UPLOAD_PERMISSION]),
            require_permissions,
        ))
        .route_layer(auth_gate.clone())
        .layer(DefaultBodyLimit::max(body_limit));

    let remove = delete(files::delete_file)
        .route_layer(from_fn_with_state(
            RequiredPermissions::new([DELETE_PERMISSION]),
            require_permissions,
        ))
        .route_layer(auth_gate);

    let routes = Router::new()
        .route("/healthz", get(health::liveness))
        .route("/healthz/ready", get(health::readiness))
        .route("/files", upload)
        .route("/files/{file_id}", get(files::get_file).merge(remove))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        files::upload_file,
        files::get_file,
        files::delete_file
    ),
    components(
        schemas(
            UploadResponse,
            UploadForm,
            ErrorResponse,
            PermissionErrorResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Files", description = "Media upload, download and deletion")
    )
)]
pub struct ApiDoc;
