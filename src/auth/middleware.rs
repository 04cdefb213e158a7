// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and permission middleware for Axum.
//!
//! Two gates, applied per route with `route_layer`:
//!
//! - [`require_auth`] verifies the bearer token and stores the resulting
//!   [`AuthContext`] in the request extensions.
//! - [`require_permissions`] reads that context and rejects the request unless
//!   every required permission is held.
//!
//! The permission gate must sit inside the auth gate:
//!
//! ```rust,ignore
//! let route = delete(delete_file)
//!     .route_layer(from_fn_with_state(
//!         RequiredPermissions::new(["files:delete"]),
//!         require_permissions,
//!     ))
//!     .route_layer(from_fn_with_state(auth_state, require_auth));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::context::AuthContext;
use super::error::AuthError;
use super::jwks::KeySetCache;
use super::verifier::{verify_token, VerificationConfig};

const BEARER_PREFIX: &str = "Bearer ";

/// Shared state for the auth gate.
#[derive(Clone)]
pub struct AuthState {
    /// Process-wide key-set cache
    pub key_sets: Arc<KeySetCache>,
    /// Static verification settings
    pub config: Arc<VerificationConfig>,
}

impl AuthState {
    /// Build the key-set cache from the verification settings.
    pub fn new(config: VerificationConfig) -> Self {
        let key_sets = KeySetCache::new(config.jwks_url.clone()).with_cache_ttl(config.cache_ttl);
        Self {
            key_sets: Arc::new(key_sets),
            config: Arc::new(config),
        }
    }
}

/// Authentication middleware function.
pub async fn require_auth(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Ok(token) => token,
        Err(e) => {
            tracing::debug!(
                target: "media.auth.middleware",
                path = %request.uri().path(),
                code = e.error_code(),
                "Rejected request without usable bearer token"
            );
            return e.into_response();
        }
    };

    let verified = verify_token(token, auth.key_sets.as_ref(), &auth.config).await;
    match verified {
        Ok(context) => {
            tracing::debug!(
                target: "media.auth.middleware",
                user_id = %context.user_id,
                "Request authenticated"
            );
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                target: "media.auth.middleware",
                path = %request.uri().path(),
                error = %e,
                "Token verification failed"
            );
            AuthError::InvalidToken(e).into_response()
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme prefix is matched case-sensitively.
fn bearer_token(request: &Request) -> Result<&str, AuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?;

    let value = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;

    value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Permissions a route requires. All of them must be held.
#[derive(Debug, Clone)]
pub struct RequiredPermissions(Arc<[String]>);

impl RequiredPermissions {
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(permissions.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Permission middleware function.
pub async fn require_permissions(
    State(required): State<RequiredPermissions>,
    request: Request,
    next: Next,
) -> Response {
    let context = request.extensions().get::<AuthContext>();
    if let Err(e) = check_permissions(context, required.as_slice()) {
        match &e {
            AuthError::NotAuthenticated => tracing::error!(
                target: "media.auth.middleware",
                path = %request.uri().path(),
                "Permission gate reached without an authenticated identity"
            ),
            _ => tracing::info!(
                target: "media.auth.middleware",
                path = %request.uri().path(),
                user_id = context.map(|c| c.user_id.as_str()).unwrap_or_default(),
                required = ?required.as_slice(),
                "Insufficient permissions"
            ),
        }
        return e.into_response();
    }

    next.run(request).await
}

/// Check that `context` exists and holds every permission in `required`.
pub fn check_permissions(
    context: Option<&AuthContext>,
    required: &[String],
) -> Result<(), AuthError> {
    let context = context.ok_or(AuthError::NotAuthenticated)?;

    if context.has_all_permissions(required) {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions {
            required: required.to_vec(),
            has: context.permissions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        middleware::{from_fn, from_fn_with_state},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    use crate::auth::extractor::Auth;

    fn context(permissions: &[&str]) -> AuthContext {
        AuthContext {
            user_id: "user_123".to_string(),
            org_id: None,
            roles: vec![],
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            email: None,
            name: None,
        }
    }

    fn required(permissions: &[&str]) -> Vec<String> {
        permissions.iter().map(|p| p.to_string()).collect()
    }

    /// Router with the auth gate in front of a handler that echoes the user.
    /// The JWKS endpoint is never reachable; none of these tests get that far.
    fn gated_router() -> Router {
        let auth = AuthState::new(VerificationConfig::new(
            "http://127.0.0.1:9/.well-known/jwks.json",
            "http://issuer.test",
            "backboard",
        ));

        Router::new()
            .route("/", get(|Auth(ctx): Auth| async move { ctx.user_id }))
            .route_layer(from_fn_with_state(auth, require_auth))
    }

    /// Router whose identity is injected directly, bypassing token checks.
    fn permission_router(identity: Option<AuthContext>, needs: &[&str]) -> Router {
        let router = Router::new()
            .route("/", get(|| async { "handled" }))
            .route_layer(from_fn_with_state(
                RequiredPermissions::new(needs.iter().copied()),
                require_permissions,
            ));

        match identity {
            Some(ctx) => router.route_layer(from_fn(move |mut req: Request, next: Next| {
                let ctx = ctx.clone();
                async move {
                    req.extensions_mut().insert(ctx);
                    next.run(req).await
                }
            })),
            None => router,
        }
    }

    async fn send(router: Router, authorization: Option<&str>) -> Response {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn check_permissions_requires_all() {
        let needs = required(&["a", "b"]);

        let err = check_permissions(Some(&context(&["a"])), &needs).unwrap_err();
        match err {
            AuthError::InsufficientPermissions { required, has } => {
                assert_eq!(required, vec!["a", "b"]);
                assert_eq!(has, vec!["a"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(check_permissions(Some(&context(&["a", "b", "c"])), &needs).is_ok());
    }

    #[test]
    fn check_permissions_without_identity_is_internal() {
        let err = check_permissions(None, &required(&["a"])).unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[test]
    fn empty_requirement_is_satisfied() {
        assert!(check_permissions(Some(&context(&[])), &[]).is_ok());
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let response = send(gated_router(), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["www-authenticate"], "Bearer");

        let body = body_json(response).await;
        assert_eq!(body["error"], "Missing or invalid authorization header");
    }

    #[tokio::test]
    async fn scheme_prefix_is_case_sensitive() {
        for value in ["bearer abc.def.ghi", "BEARER abc.def.ghi", "Basic dXNlcjpwYXNz", "Bearer"] {
            let response = send(gated_router(), Some(value)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{value}");
            let body = body_json(response).await;
            assert_eq!(body["error"], "Missing or invalid authorization header", "{value}");
        }
    }

    #[tokio::test]
    async fn malformed_token_is_invalid_token() {
        let response = send(gated_router(), Some("Bearer not-a-jwt")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid token");
        assert_eq!(body["details"], "The access token is invalid or expired");
    }

    #[tokio::test]
    async fn permission_gate_passes_when_all_held() {
        let router = permission_router(Some(context(&["files:upload"])), &["files:upload"]);
        let response = send(router, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn permission_gate_reports_required_and_held() {
        let router = permission_router(Some(context(&["files:upload"])), &["files:delete"]);
        let response = send(router, None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["required"], serde_json::json!(["files:delete"]));
        assert_eq!(body["has"], serde_json::json!(["files:upload"]));
    }

    #[tokio::test]
    async fn permission_gate_without_auth_gate_is_500() {
        let router = permission_router(None, &["files:upload"]);
        let response = send(router, None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
