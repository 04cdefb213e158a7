// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Media Storage Module
//!
//! File storage behind the upload and download handlers. Handlers depend on
//! the [`FileStorage`] trait only; [`LocalStorage`] keeps files on disk.
//!
//! ## Storage Layout
//!
//! ```text
//! <root>/
//!   avatars/
//!     {file_id}             # File content
//!     {file_id}.meta.json   # Original name, content type, size, created_at
//!   files/
//!     ...
//! ```
//!
//! File ids are UUIDs. Any id that does not parse as one is reported as not
//! found without touching the filesystem.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncRead;

pub mod local;
pub mod paths;

pub use local::LocalStorage;
pub use paths::StoragePaths;

/// Owned reader over a stored file's content.
pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unknown storage directory: {0}")]
    InvalidDirectory(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Options for [`FileStorage::save`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Target directory (`avatars` or `files`)
    pub directory: String,
    pub content_type: String,
    /// Client-supplied file name, kept in metadata only
    pub original_name: Option<String>,
}

/// Description of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub id: String,
    pub path: PathBuf,
    pub content_type: String,
    pub size: u64,
    /// Public download URL
    pub url: String,
}

/// Metadata sidecar persisted next to each stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Storage backend contract used by the HTTP handlers.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store the reader's content under a fresh id.
    async fn save(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        options: SaveOptions,
    ) -> StorageResult<FileInfo>;

    /// Open a stored file for reading.
    async fn open(&self, id: &str) -> StorageResult<(FileReader, FileInfo)>;

    /// Remove a stored file and its metadata.
    async fn delete(&self, id: &str) -> StorageResult<()>;

    /// Check that the backend can serve requests.
    async fn health_check(&self) -> StorageResult<()>;
}

/// Infer a content type from a file name's extension.
pub fn content_type_from_name(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
