// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once from the environment at startup and shared
//! read-only afterwards. Empty variables count as unset.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MEDIA_HTTP_ADDR` | Server bind address (`:8080` accepted) | `0.0.0.0:8080` |
//! | `MEDIA_STORAGE_DIR` | Root directory for stored files | `/var/media` |
//! | `MEDIA_PUBLIC_BASE_URL` | Base for public file URLs | `http://localhost:8080` |
//! | `MEDIA_MAX_FILE_SIZE` | Maximum upload size in bytes | `10485760` |
//! | `AUTH_JWKS_URL` | JWKS endpoint for JWT verification | `http://user-service:3000/.well-known/jwks.json` |
//! | `AUTH_ISSUER` | Expected JWT issuer claim | `http://user-service:3000` |
//! | `AUTH_AUDIENCE` | Expected JWT audience claim | `backboard` |
//! | `AUTH_JWKS_CACHE_TTL` | JWKS cache TTL in seconds (0 = default) | `900` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::auth::VerificationConfig;

pub const HTTP_ADDR_ENV: &str = "MEDIA_HTTP_ADDR";
pub const STORAGE_DIR_ENV: &str = "MEDIA_STORAGE_DIR";
pub const PUBLIC_BASE_URL_ENV: &str = "MEDIA_PUBLIC_BASE_URL";
pub const MAX_FILE_SIZE_ENV: &str = "MEDIA_MAX_FILE_SIZE";
pub const JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const JWKS_CACHE_TTL_ENV: &str = "AUTH_JWKS_CACHE_TTL";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STORAGE_DIR: &str = "/var/media";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
/// 10 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_JWKS_URL: &str = "http://user-service:3000/.well-known/jwks.json";
const DEFAULT_ISSUER: &str = "http://user-service:3000";
const DEFAULT_AUDIENCE: &str = "backboard";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid bind address: {value}")]
    InvalidAddress { var: &'static str, value: String },

    #[error("{var} must be a positive integer, got {value}")]
    InvalidSize { var: &'static str, value: String },

    #[error("{var} must be an http(s) URL, got {value}")]
    InvalidUrl { var: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: SocketAddr,
    pub storage_dir: PathBuf,
    /// Without trailing slash
    pub public_base_url: String,
    pub max_file_size: u64,
    pub auth: VerificationConfig,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Load configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let http_addr = parse_addr(get(HTTP_ADDR_ENV).unwrap_or(DEFAULT_HTTP_ADDR))?;

        let storage_dir = PathBuf::from(get(STORAGE_DIR_ENV).unwrap_or(DEFAULT_STORAGE_DIR));

        let public_base_url = http_url(
            PUBLIC_BASE_URL_ENV,
            get(PUBLIC_BASE_URL_ENV).unwrap_or(DEFAULT_PUBLIC_BASE_URL),
        )?
        .trim_end_matches('/')
        .to_string();

        let max_file_size = match get(MAX_FILE_SIZE_ENV) {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| ConfigError::InvalidSize {
                    var: MAX_FILE_SIZE_ENV,
                    value: value.to_string(),
                })?,
            None => DEFAULT_MAX_FILE_SIZE,
        };

        let jwks_url = http_url(JWKS_URL_ENV, get(JWKS_URL_ENV).unwrap_or(DEFAULT_JWKS_URL))?;
        let issuer = get(ISSUER_ENV).unwrap_or(DEFAULT_ISSUER);
        let audience = get(AUDIENCE_ENV).unwrap_or(DEFAULT_AUDIENCE);

        // Zero or unparseable keeps the default TTL
        let cache_ttl = get(JWKS_CACHE_TTL_ENV)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO);

        let auth = VerificationConfig::new(jwks_url, issuer, audience).with_cache_ttl(cache_ttl);

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            http_addr,
            storage_dir,
            public_base_url,
            max_file_size,
            auth,
            log_format,
        })
    }
}

/// Parse a bind address, accepting the `:port` shorthand for all interfaces.
fn parse_addr(value: &str) -> Result<SocketAddr, ConfigError> {
    let full = match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => value.to_string(),
    };

    full.parse().map_err(|_| ConfigError::InvalidAddress {
        var: HTTP_ADDR_ENV,
        value: value.to_string(),
    })
}

fn http_url(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        var,
        value: value.to_string(),
    };

    let url = Url::parse(value).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(invalid());
    }
    Ok(value.to_string())
}
