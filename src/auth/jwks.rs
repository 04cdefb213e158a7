// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behaviour
//!
//! - A fresh cached key set is served under a shared read lock, so
//!   concurrent readers never wait on each other
//! - Refresh is serialized by a separate mutex and re-checks freshness
//!   before fetching, so callers racing on an expired cache issue a single
//!   request. The cache lock is never held across the fetch.
//! - The caller's deadline covers waiting for the refresh as well as the
//!   fetch itself
//! - Stale cache is used on fetch failure or deadline expiry; the call only
//!   fails if no key set was ever obtained
//!
//! ## Usage
//!
//! Build a `KeySetCache` from `VerificationConfig` in main.rs and store it in
//! `AuthState`. The verifier reaches it through the `KeySetProvider` trait.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Default JWKS cache TTL (15 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(900);

/// Default bound on a single JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure to obtain a key set from the JWKS endpoint.
#[derive(Debug, Clone, Error)]
pub enum KeySetError {
    #[error("JWKS endpoint unreachable: {0}")]
    EndpointUnreachable(String),

    #[error("JWKS endpoint returned HTTP {0}")]
    EndpointRejected(u16),

    #[error("malformed JWKS document: {0}")]
    MalformedKeySet(String),
}

/// A public key usable for RSA signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    decoding_key: DecodingKey,
    /// Algorithm the publisher pinned this key to, if any.
    algorithm: Option<Algorithm>,
}

impl VerificationKey {
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Immutable snapshot of the published keys, indexed by `kid`.
pub struct KeySet {
    keys: HashMap<String, VerificationKey>,
    fetched_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawKeySet {
    keys: Vec<serde_json::Value>,
}

impl KeySet {
    /// Parse a JWKS document.
    ///
    /// Entries that are not RSA keys, carry no `kid`, or fail to decode are
    /// skipped. Only a body that is not a `{"keys": [...]}` object is an error.
    pub fn from_jwks_json(body: &[u8]) -> Result<Self, KeySetError> {
        let raw: RawKeySet = serde_json::from_slice(body)
            .map_err(|e| KeySetError::MalformedKeySet(e.to_string()))?;

        let mut keys = HashMap::with_capacity(raw.keys.len());
        for value in raw.keys {
            let jwk: Jwk = match serde_json::from_value(value) {
                Ok(jwk) => jwk,
                Err(e) => {
                    tracing::debug!(target: "media.auth.jwks", error = %e, "Skipping undecodable JWK");
                    continue;
                }
            };

            let Some(kid) = jwk.common.key_id.clone() else {
                tracing::debug!(target: "media.auth.jwks", "Skipping JWK without kid");
                continue;
            };

            match jwk_to_verification_key(&jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(reason) => {
                    tracing::debug!(target: "media.auth.jwks", kid = %kid, reason = %reason, "Skipping unusable JWK");
                }
            }
        }

        Ok(Self {
            keys,
            fetched_at: Utc::now(),
        })
    }

    /// Look up a key by identifier.
    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// When this key set was fetched.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        f.debug_struct("KeySet")
            .field("kids", &kids)
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

/// Convert an RSA JWK into a verification key.
fn jwk_to_verification_key(jwk: &Jwk) -> Result<VerificationKey, String> {
    let AlgorithmParameters::RSA(rsa) = &jwk.algorithm else {
        return Err("not an RSA key".to_string());
    };

    let decoding_key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
        .map_err(|e| format!("invalid RSA components: {e}"))?;

    let algorithm = match jwk.common.key_algorithm {
        None => None,
        Some(KeyAlgorithm::RS256) => Some(Algorithm::RS256),
        Some(KeyAlgorithm::RS384) => Some(Algorithm::RS384),
        Some(KeyAlgorithm::RS512) => Some(Algorithm::RS512),
        Some(other) => return Err(format!("unsupported key algorithm {other:?}")),
    };

    Ok(VerificationKey {
        decoding_key,
        algorithm,
    })
}

/// Source of the current key set.
///
/// Implemented by `KeySetCache` in production and by a plain `Arc<KeySet>`
/// where the keys are known up front.
pub trait KeySetProvider: Send + Sync {
    fn key_set(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Arc<KeySet>, KeySetError>> + Send;
}

impl KeySetProvider for Arc<KeySet> {
    async fn key_set(&self, _timeout: Duration) -> Result<Arc<KeySet>, KeySetError> {
        Ok(Arc::clone(self))
    }
}

/// Cached key set with its expiry.
struct CachedKeySet {
    key_set: Arc<KeySet>,
    expires_at: Instant,
}

impl CachedKeySet {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// JWKS client with caching and stale fallback.
pub struct KeySetCache {
    /// JWKS endpoint URL
    jwks_url: String,
    /// Cache TTL
    cache_ttl: Duration,
    /// Cached key set
    cache: RwLock<Option<CachedKeySet>>,
    /// Held by the single caller refreshing the cache
    refresh: Mutex<()>,
    /// HTTP client
    client: reqwest::Client,
}

impl KeySetCache {
    /// Create a new cache for the given endpoint with the default TTL.
    pub fn new(jwks_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "media.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
            client,
        }
    }

    /// Create with custom cache TTL. A zero TTL keeps the default.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.cache_ttl = ttl;
        }
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Get the current key set, fetching it if the cache is empty or expired.
    ///
    /// Waiting for a concurrent refresh and the fetch itself are both bounded
    /// by `timeout`. On any failure a previously cached key set is returned
    /// instead, however old.
    pub async fn get_key_set(&self, timeout: Duration) -> Result<Arc<KeySet>, KeySetError> {
        if let Some(key_set) = self.fresh_key_set().await {
            return Ok(key_set);
        }

        let refreshed = tokio::time::timeout(timeout, self.refresh())
            .await
            .unwrap_or_else(|_| {
                Err(KeySetError::EndpointUnreachable(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                )))
            });

        let e = match refreshed {
            Ok(key_set) => return Ok(key_set),
            Err(e) => e,
        };

        let cache = self.cache.read().await;
        match cache.as_ref() {
            Some(stale) => {
                tracing::warn!(
                    target: "media.auth.jwks",
                    error = %e,
                    fetched_at = %stale.key_set.fetched_at(),
                    "JWKS refresh failed, serving stale key set"
                );
                Ok(Arc::clone(&stale.key_set))
            }
            None => {
                tracing::error!(target: "media.auth.jwks", error = %e, "JWKS fetch failed with no cached key set");
                Err(e)
            }
        }
    }

    async fn fresh_key_set(&self) -> Option<Arc<KeySet>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.is_fresh(Instant::now()))
            .map(|cached| Arc::clone(&cached.key_set))
    }

    /// Fetch and store a new key set unless a concurrent caller already did.
    async fn refresh(&self) -> Result<Arc<KeySet>, KeySetError> {
        let _refreshing = self.refresh.lock().await;

        if let Some(key_set) = self.fresh_key_set().await {
            tracing::debug!(target: "media.auth.jwks", "JWKS refreshed by concurrent caller");
            return Ok(key_set);
        }

        let key_set = Arc::new(self.fetch_key_set().await?);
        tracing::info!(
            target: "media.auth.jwks",
            key_count = key_set.len(),
            "JWKS cache refreshed"
        );

        *self.cache.write().await = Some(CachedKeySet {
            key_set: Arc::clone(&key_set),
            expires_at: Instant::now() + self.cache_ttl,
        });
        Ok(key_set)
    }

    /// Check if a key set is cached and still within its TTL.
    pub async fn is_fresh(&self) -> bool {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .is_some_and(|cached| cached.is_fresh(Instant::now()))
    }

    /// Fetch the key set from the endpoint.
    async fn fetch_key_set(&self) -> Result<KeySet, KeySetError> {
        tracing::debug!(target: "media.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeySetError::EndpointUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::EndpointRejected(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KeySetError::EndpointUnreachable(e.to_string()))?;

        KeySet::from_jwks_json(&body)
    }
}

impl KeySetProvider for KeySetCache {
    async fn key_set(&self, timeout: Duration) -> Result<Arc<KeySet>, KeySetError> {
        self.get_key_set(timeout).await
    }
}
