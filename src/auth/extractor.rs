// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the authenticated identity.
//!
//! Use the `Auth` extractor in handlers behind [`require_auth`]:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthContext
//! }
//! ```
//!
//! [`require_auth`]: super::middleware::require_auth

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthContext, AuthError};

/// Identity attached by the auth middleware.
///
/// Rejects with an internal error when the route was not gated, since that
/// is a routing bug rather than a client mistake.
pub struct Auth(pub AuthContext);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::NotAuthenticated)
    }
}
