// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::verifier::VerifyError;

/// Rejection produced by the auth gates.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Header present but not `Bearer <token>`
    InvalidAuthHeader,
    /// Token failed verification
    InvalidToken(VerifyError),
    /// No identity on the request; the permission gate ran without the auth gate
    NotAuthenticated,
    /// Identity lacks at least one required permission
    InsufficientPermissions {
        required: Vec<String>,
        has: Vec<String>,
    },
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    has: Option<Vec<String>>,
}

impl AuthError {
    /// Get the error code for this error (used in logs).
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InsufficientPermissions { .. } => "insufficient_permissions",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            AuthError::NotAuthenticated => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::InvalidToken(e) => write!(f, "Invalid token: {e}"),
            AuthError::NotAuthenticated => {
                write!(f, "No authenticated identity on request (auth gate not applied)")
            }
            AuthError::InsufficientPermissions { required, has } => write!(
                f,
                "Insufficient permissions: required {required:?}, has {has:?}"
            ),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::InvalidToken(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AuthError::MissingAuthHeader | AuthError::InvalidAuthHeader => AuthErrorBody {
                error: "Missing or invalid authorization header",
                details: None,
                required: None,
                has: None,
            },
            AuthError::InvalidToken(e) => AuthErrorBody {
                error: "Invalid token",
                details: Some(e.public_detail()),
                required: None,
                has: None,
            },
            AuthError::NotAuthenticated => AuthErrorBody {
                error: "Internal server error",
                details: None,
                required: None,
                has: None,
            },
            AuthError::InsufficientPermissions { required, has } => AuthErrorBody {
                error: "Insufficient permissions",
                details: None,
                required: Some(required),
                has: Some(has),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwks::KeySetError;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");

        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({"error": "Missing or invalid authorization header"}));
    }

    #[tokio::test]
    async fn invalid_token_hides_the_cause() {
        let response = AuthError::InvalidToken(VerifyError::InvalidIssuer).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid token");
        assert_eq!(body["details"], "The access token is invalid or expired");
        assert!(!body.to_string().contains("issuer"));
    }

    #[tokio::test]
    async fn key_set_outage_is_still_401() {
        let error = VerifyError::KeySet(KeySetError::EndpointRejected(500));
        let response = AuthError::InvalidToken(error).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["details"], "Signing keys are temporarily unavailable");
    }

    #[tokio::test]
    async fn insufficient_permissions_returns_403_with_lists() {
        let response = AuthError::InsufficientPermissions {
            required: vec!["files:delete".to_string()],
            has: vec!["files:upload".to_string()],
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Insufficient permissions",
                "required": ["files:delete"],
                "has": ["files:upload"],
            })
        );
    }

    #[tokio::test]
    async fn missing_identity_is_internal() {
        let response = AuthError::NotAuthenticated.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
