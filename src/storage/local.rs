// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local filesystem storage backend.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

use super::paths::{is_known_directory, StoragePaths, KNOWN_DIRECTORIES};
use super::{
    content_type_from_name, FileInfo, FileMetadata, FileReader, FileStorage, SaveOptions,
    StorageError, StorageResult,
};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Stores files under a root directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    paths: StoragePaths,
    /// Without trailing slash
    public_base_url: String,
}

impl LocalStorage {
    /// Create the storage root and its known directories.
    ///
    /// Safe to call multiple times (idempotent).
    pub async fn new(root: impl AsRef<Path>, public_base_url: impl Into<String>) -> StorageResult<Self> {
        let paths = StoragePaths::new(root);
        for dir in KNOWN_DIRECTORIES {
            fs::create_dir_all(paths.directory(dir)).await?;
        }

        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            paths,
            public_base_url,
        })
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Public download URL for a file id.
    pub fn file_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.public_base_url, id)
    }

    /// Write the metadata sidecar (atomic write via rename).
    async fn write_metadata(&self, directory: &str, metadata: &FileMetadata) -> StorageResult<()> {
        let path = self.paths.metadata(directory, &metadata.id);
        let temp_path = path.with_extension("json.tmp");

        let body = serde_json::to_vec_pretty(metadata)?;
        fs::write(&temp_path, body).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Metadata sidecar for a stored file, if readable.
    async fn recorded_metadata(&self, directory: &str, id: &str) -> Option<FileMetadata> {
        let path = self.paths.metadata(directory, id);
        let bytes = fs::read(&path).await.ok()?;
        serde_json::from_slice(&bytes)
            .map_err(|e| {
                tracing::warn!(target: "media.storage", file_id = %id, error = %e, "Unreadable metadata sidecar");
            })
            .ok()
    }
}

/// Recorded content type, else one inferred from the original file name.
fn served_content_type(metadata: Option<FileMetadata>) -> String {
    let Some(metadata) = metadata else {
        return FALLBACK_CONTENT_TYPE.to_string();
    };
    if !metadata.content_type.is_empty() {
        return metadata.content_type;
    }
    metadata
        .original_name
        .as_deref()
        .and_then(content_type_from_name)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

/// Normalize a file id, rejecting anything that is not a UUID.
fn canonical_id(id: &str) -> StorageResult<String> {
    Uuid::parse_str(id)
        .map(|uuid| uuid.to_string())
        .map_err(|_| StorageError::NotFound(id.to_string()))
}

async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn save(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        options: SaveOptions,
    ) -> StorageResult<FileInfo> {
        if !is_known_directory(&options.directory) {
            return Err(StorageError::InvalidDirectory(options.directory));
        }

        let id = Uuid::new_v4().to_string();
        let path = self.paths.file(&options.directory, &id);

        let mut file = File::create(&path).await?;
        let copied = async {
            let size = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            Ok::<_, io::Error>(size)
        }
        .await;
        drop(file);

        let size = match copied {
            Ok(size) => size,
            Err(e) => {
                tracing::error!(target: "media.storage", file_id = %id, error = %e, "Write failed, removing partial file");
                let _ = fs::remove_file(&path).await;
                return Err(e.into());
            }
        };

        let metadata = FileMetadata {
            id: id.clone(),
            original_name: options.original_name,
            content_type: options.content_type.clone(),
            size,
            created_at: Utc::now(),
        };
        if let Err(e) = self.write_metadata(&options.directory, &metadata).await {
            tracing::error!(target: "media.storage", file_id = %id, error = %e, "Metadata write failed, removing file");
            let _ = fs::remove_file(&path).await;
            return Err(e);
        }

        tracing::debug!(target: "media.storage", file_id = %id, directory = %options.directory, size, "Stored file");

        Ok(FileInfo {
            url: self.file_url(&id),
            id,
            path,
            content_type: options.content_type,
            size,
        })
    }

    async fn open(&self, id: &str) -> StorageResult<(FileReader, FileInfo)> {
        let id = canonical_id(id)?;

        for directory in KNOWN_DIRECTORIES {
            let path = self.paths.file(directory, &id);
            let file = match File::open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let size = file.metadata().await?.len();
            let content_type = served_content_type(self.recorded_metadata(directory, &id).await);

            let info = FileInfo {
                url: self.file_url(&id),
                id,
                path,
                content_type,
                size,
            };
            return Ok((Box::new(file), info));
        }

        Err(StorageError::NotFound(id))
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let id = canonical_id(id)?;

        for directory in KNOWN_DIRECTORIES {
            if remove_if_exists(&self.paths.file(directory, &id)).await? {
                remove_if_exists(&self.paths.metadata(directory, &id)).await?;
                tracing::debug!(target: "media.storage", file_id = %id, directory, "Deleted file");
                return Ok(());
            }
        }

        Err(StorageError::NotFound(id))
    }

    /// Write-read-delete probe in the storage root.
    async fn health_check(&self) -> StorageResult<()> {
        let probe = self.paths.root().join(".health_check");
        let data = b"health_check_data";

        fs::write(&probe, data).await?;
        let read_back = fs::read(&probe).await?;
        fs::remove_file(&probe).await?;

        if read_back != data {
            return Err(StorageError::Io(io::Error::other("health check data mismatch")));
        }
        Ok(())
    }
}
