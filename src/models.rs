// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Response bodies used by the REST API. Types derive `Serialize` and
//! `ToSchema` for JSON handling and OpenAPI documentation.

use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::FileInfo;

/// Content types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Id to use with `GET /files/{file_id}`
    pub file_id: String,
    /// Public download URL
    pub url: String,
    pub content_type: String,
    /// Size in bytes
    pub size: u64,
}

impl From<FileInfo> for UploadResponse {
    fn from(info: FileInfo) -> Self {
        Self {
            file_id: info.id,
            url: info.url,
            content_type: info.content_type,
            size: info.size,
        }
    }
}

/// Multipart upload form (OpenAPI only).
#[derive(ToSchema)]
pub struct UploadForm {
    /// JPEG, PNG or WebP image
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Error body returned by handlers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error body returned by the permission gate.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionErrorResponse {
    /// Always "Insufficient permissions"
    pub error: String,
    pub required: Vec<String>,
    pub has: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn upload_response_uses_camel_case() {
        let response = UploadResponse::from(FileInfo {
            id: "f1".to_string(),
            path: PathBuf::from("/var/media/avatars/f1"),
            content_type: "image/png".to_string(),
            size: 42,
            url: "http://localhost:8080/files/f1".to_string(),
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fileId": "f1",
                "url": "http://localhost:8080/files/f1",
                "contentType": "image/png",
                "size": 42
            })
        );
    }
}
