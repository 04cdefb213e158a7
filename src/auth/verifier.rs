// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! Turns a compact JWS string into an [`AuthContext`]:
//!
//! 1. Structure: three non-empty base64url segments
//! 2. Header must name a `kid`
//! 3. Key looked up in the current key set (no fallback key)
//! 4. RSA signature verified (RS256 / RS384 / RS512 only)
//! 5. `exp`, `nbf`, `iss`, `aud`, `sub` validated
//! 6. Optional attributes extracted permissively
//!
//! No claim is trusted before the signature has been checked.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

use super::context::AuthContext;
use super::jwks::{
    KeySetError, KeySetProvider, VerificationKey, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT,
};

/// Clock skew tolerance for `exp` / `nbf` (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Static verification settings shared by every request.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// JWKS endpoint URL
    pub jwks_url: String,
    /// Expected `iss` claim
    pub issuer: String,
    /// Audience that `aud` must contain
    pub audience: String,
    /// How long a fetched key set stays fresh
    pub cache_ttl: Duration,
    /// Upper bound on a key-set fetch made on behalf of a request
    pub fetch_timeout: Duration,
    /// Clock skew tolerance in seconds
    pub leeway: u64,
}

impl VerificationConfig {
    pub fn new(
        jwks_url: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            leeway: CLOCK_SKEW_LEEWAY,
        }
    }

    /// Set the cache TTL. Zero keeps the default.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.cache_ttl = ttl;
        }
        self
    }
}

/// Reasons a token is rejected.
#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    #[error("token is not a well-formed JWS")]
    InvalidFormat,

    #[error("token header has no string kid")]
    MissingKeyId,

    #[error("signing keys unavailable: {0}")]
    KeySet(#[from] KeySetError),

    #[error("no key in JWKS for kid {0:?}")]
    UnknownKey(String),

    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token issuer is invalid")]
    InvalidIssuer,

    #[error("token audience is invalid")]
    InvalidAudience,

    #[error("token has no subject")]
    MissingSubject,

    #[error("token has expired")]
    TokenExpired,

    #[error("token is not yet valid")]
    TokenNotYetValid,
}

impl VerifyError {
    /// Client-facing description.
    ///
    /// Only distinguishes "signing keys unavailable" from "token rejected";
    /// the specific failed check stays in the server logs.
    pub fn public_detail(&self) -> &'static str {
        match self {
            VerifyError::KeySet(_) => "Signing keys are temporarily unavailable",
            _ => "The access token is invalid or expired",
        }
    }
}

/// Verify a bearer token and extract the caller's identity.
pub async fn verify_token<P>(
    token: &str,
    provider: &P,
    config: &VerificationConfig,
) -> Result<AuthContext, VerifyError>
where
    P: KeySetProvider,
{
    let header = decode_header(token)?;

    let kid = header
        .get("kid")
        .and_then(Value::as_str)
        .ok_or(VerifyError::MissingKeyId)?;

    let key_set = provider.key_set(config.fetch_timeout).await?;
    let key = key_set
        .get(kid)
        .ok_or_else(|| VerifyError::UnknownKey(kid.to_string()))?;

    let algorithm = signing_algorithm(&header, key)?;

    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims.clear();
    validation.leeway = config.leeway;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // Audience has its own rules below.
    validation.validate_aud = false;

    let claims = decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
        .map_err(|e| {
            tracing::debug!(target: "media.auth.verifier", kid = %kid, error = %e, "Token decode failed");
            map_decode_error(e.kind())
        })?
        .claims;

    check_issuer(&claims, &config.issuer)?;
    check_audience(&claims, &config.audience)?;

    let subject = claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|sub| !sub.is_empty())
        .ok_or(VerifyError::MissingSubject)?
        .to_owned();

    Ok(AuthContext::from_claims(subject, &claims))
}

/// Check structure and decode the header segment.
fn decode_header(token: &str) -> Result<Map<String, Value>, VerifyError> {
    let segments: Vec<&str> = token.split('.').collect();
    let &[header, payload, signature] = segments.as_slice() else {
        return Err(VerifyError::InvalidFormat);
    };

    let decode_segment = |segment: &str| {
        if segment.is_empty() {
            return Err(VerifyError::InvalidFormat);
        }
        URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|_| VerifyError::InvalidFormat)
    };

    let header_bytes = decode_segment(header)?;
    decode_segment(payload)?;
    decode_segment(signature)?;

    match serde_json::from_slice(&header_bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(VerifyError::InvalidFormat),
    }
}

/// Resolve the header's `alg` to one of the accepted RSA algorithms.
fn signing_algorithm(
    header: &Map<String, Value>,
    key: &VerificationKey,
) -> Result<Algorithm, VerifyError> {
    let alg = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or(VerifyError::InvalidFormat)?;

    let algorithm = match alg {
        "RS256" => Algorithm::RS256,
        "RS384" => Algorithm::RS384,
        "RS512" => Algorithm::RS512,
        other => return Err(VerifyError::UnsupportedAlgorithm(other.to_string())),
    };

    match key.algorithm() {
        Some(pinned) if pinned != algorithm => {
            Err(VerifyError::UnsupportedAlgorithm(alg.to_string()))
        }
        _ => Ok(algorithm),
    }
}

fn map_decode_error(kind: &ErrorKind) -> VerifyError {
    match kind {
        ErrorKind::InvalidSignature => VerifyError::SignatureInvalid,
        ErrorKind::ExpiredSignature => VerifyError::TokenExpired,
        ErrorKind::ImmatureSignature => VerifyError::TokenNotYetValid,
        ErrorKind::InvalidAlgorithm => VerifyError::UnsupportedAlgorithm("mismatched".to_string()),
        _ => VerifyError::InvalidFormat,
    }
}

fn check_issuer(claims: &Map<String, Value>, issuer: &str) -> Result<(), VerifyError> {
    match claims.get("iss").and_then(Value::as_str) {
        Some(iss) if iss == issuer => Ok(()),
        _ => Err(VerifyError::InvalidIssuer),
    }
}

/// `aud` must be the audience itself or an array containing it.
///
/// Absent, empty arrays and any other JSON type are rejected.
fn check_audience(claims: &Map<String, Value>, audience: &str) -> Result<(), VerifyError> {
    let accepted = match claims.get("aud") {
        Some(Value::String(aud)) => aud == audience,
        Some(Value::Array(items)) => items.iter().any(|item| item.as_str() == Some(audience)),
        _ => false,
    };

    if accepted {
        Ok(())
    } else {
        Err(VerifyError::InvalidAudience)
    }
}
