// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated identity extracted from a verified token.

use serde::Serialize;
use serde_json::{Map, Value};

/// Authenticated identity for a single request.
///
/// Built by the token verifier, stored in the request extensions by the
/// auth middleware and dropped with the request. Never cached across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    /// Organization the user acts for (`org_id` claim)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,

    /// Role names, in token order
    pub roles: Vec<String>,

    /// Permission strings, in token order
    pub permissions: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AuthContext {
    /// Build from verified claims.
    ///
    /// Optional claims are read permissively: wrong types and empty strings
    /// count as absent, and non-string array entries are dropped.
    pub(crate) fn from_claims(user_id: String, claims: &Map<String, Value>) -> Self {
        Self {
            user_id,
            org_id: non_empty_string(claims, "org_id"),
            roles: string_list(claims, "roles"),
            permissions: string_list(claims, "permissions"),
            email: non_empty_string(claims, "email"),
            name: non_empty_string(claims, "name"),
        }
    }

    /// Check whether the identity holds a permission (exact match).
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|held| held == permission)
    }

    /// Check whether the identity holds every listed permission.
    pub fn has_all_permissions<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|p| self.has_permission(p.as_ref()))
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held == role)
    }
}

fn non_empty_string(claims: &Map<String, Value>, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn string_list(claims: &Map<String, Value>, name: &str) -> Vec<String> {
    claims
        .get(name)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
