// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer-token authentication and permission checks for the media API.
//!
//! ## Auth Flow
//!
//! 1. Client obtains an access token from the user service
//! 2. Client sends `Authorization: Bearer <JWT>`
//! 3. Media server:
//!    - Fetches the user service JWKS (cached with TTL, stale on failure)
//!    - Verifies JWT signature (RS256/384/512), issuer, audience, expiry
//!    - Extracts:
//!      - `sub` → `user_id`
//!      - `org_id`, `roles`, `permissions`, `email`, `name`
//! 4. Permission gate checks the route's required permissions
//!
//! ## Security
//!
//! - Uploads and deletes require authentication; downloads and health are public
//! - Verification failures are reported with a generic message only
//! - Clock skew tolerance is 60 seconds

pub mod context;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod verifier;

pub use context::AuthContext;
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::{KeySet, KeySetCache, KeySetError, KeySetProvider};
pub use middleware::{require_auth, require_permissions, AuthState, RequiredPermissions};
pub use verifier::{verify_token, VerificationConfig, VerifyError};
