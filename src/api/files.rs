// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::io;

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::{
    auth::{Auth, AuthContext},
    error::ApiError,
    models::{
        ErrorResponse, PermissionErrorResponse, UploadForm, UploadResponse, ALLOWED_CONTENT_TYPES,
    },
    state::AppState,
    storage::{content_type_from_name, paths::AVATARS_DIR, SaveOptions, StorageError},
};

const FILE_FIELD: &str = "file";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Upload a file (multipart field `file`).
#[utoipa::path(
    post,
    path = "/files",
    tag = "Files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file or unsupported type", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Missing files:upload permission", body = PermissionErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Auth(user): Auth,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!(target: "media.api.files", error = %e, "Upload is not a multipart form");
        ApiError::bad_request("No file provided")
    })?;

    while let Some(field) = multipart.next_field().await.map_err(|e| read_error(&e))? {
        if field.name() == Some(FILE_FIELD) {
            return store_upload(&state, &user, field).await.map(Json);
        }
    }

    tracing::warn!(target: "media.api.files", user_id = %user.user_id, "Upload without file field");
    Err(ApiError::bad_request("No file provided"))
}

async fn store_upload(
    state: &AppState,
    user: &AuthContext,
    field: Field<'_>,
) -> Result<UploadResponse, ApiError> {
    let original_name = field.file_name().map(str::to_owned);
    let content_type = resolve_content_type(field.content_type(), original_name.as_deref());

    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        tracing::warn!(target: "media.api.files", content_type = %content_type, "Unsupported content type");
        return Err(ApiError::bad_request("Unsupported file type")
            .with_details(format!("Allowed types: {}", ALLOWED_CONTENT_TYPES.join(", "))));
    }

    let options = SaveOptions {
        directory: AVATARS_DIR.to_string(),
        content_type,
        original_name,
    };

    // One byte past the limit is enough to tell an oversized upload apart.
    let max_size = state.max_file_size;
    let mut reader = upload_reader(field).take(max_size.saturating_add(1));
    let info = state
        .storage
        .save(&mut reader, options)
        .await
        .map_err(save_error)?;

    if info.size > max_size {
        tracing::warn!(target: "media.api.files", max_size, "File too large");
        if let Err(e) = state.storage.delete(&info.id).await {
            tracing::error!(target: "media.api.files", file_id = %info.id, error = %e, "Failed to remove oversized upload");
        }
        return Err(ApiError::payload_too_large("File too large"));
    }

    tracing::info!(
        target: "media.api.files",
        user_id = %user.user_id,
        file_id = %info.id,
        size = info.size,
        "File uploaded"
    );

    Ok(UploadResponse::from(info))
}

/// Download a file.
#[utoipa::path(
    get,
    path = "/files/{file_id}",
    tag = "Files",
    params(("file_id" = String, Path, description = "File id returned by upload")),
    responses(
        (status = 200, description = "File content with its stored Content-Type"),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let (reader, info) = state.storage.open(&file_id).await.map_err(|e| match e {
        StorageError::NotFound(_) => {
            tracing::debug!(target: "media.api.files", file_id = %file_id, "File not found");
            ApiError::not_found("File not found")
        }
        other => {
            tracing::error!(target: "media.api.files", file_id = %file_id, error = %other, "Failed to open file");
            ApiError::internal("Failed to read file")
        }
    })?;

    let content_type = HeaderValue::from_str(&info.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
    let headers = [
        (CONTENT_TYPE, content_type),
        (CONTENT_LENGTH, HeaderValue::from(info.size)),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(reader))).into_response())
}

/// Delete a file.
#[utoipa::path(
    delete,
    path = "/files/{file_id}",
    tag = "Files",
    params(("file_id" = String, Path, description = "File id returned by upload")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Missing files:delete permission", body = PermissionErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(file_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.storage.delete(&file_id).await {
        Ok(()) => {
            tracing::info!(target: "media.api.files", user_id = %user.user_id, file_id = %file_id, "File deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(StorageError::NotFound(_)) => Err(ApiError::not_found("File not found")),
        Err(e) => {
            tracing::error!(target: "media.api.files", file_id = %file_id, error = %e, "Failed to delete file");
            Err(ApiError::internal("Failed to delete file"))
        }
    }
}

/// Content type from the part header, else the file extension.
///
/// Parameters such as `; charset=...` are dropped.
fn resolve_content_type(declared: Option<&str>, file_name: Option<&str>) -> String {
    let declared = declared
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    declared.unwrap_or_else(|| {
        file_name
            .and_then(content_type_from_name)
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string()
    })
}

/// Adapt a multipart part into a reader, keeping read failures recognizable.
fn upload_reader(field: Field<'_>) -> impl AsyncRead + Send + Unpin + '_ {
    let chunks = field.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
    StreamReader::new(Box::pin(chunks))
}

fn save_error(e: StorageError) -> ApiError {
    let multipart_error = match &e {
        StorageError::Io(io_error) => io_error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>()),
        _ => None,
    };
    match multipart_error {
        Some(multipart_error) => read_error(multipart_error),
        None => {
            tracing::error!(target: "media.api.files", error = %e, "Failed to save file");
            ApiError::internal("Failed to save file")
        }
    }
}

fn read_error(e: &MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(target: "media.api.files", "Request body exceeded limit");
        ApiError::payload_too_large("File too large")
    } else {
        tracing::warn!(target: "media.api.files", error = %e, "Failed to read multipart body");
        ApiError::bad_request("Failed to process file")
    }
}
