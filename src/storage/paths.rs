// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the media storage layout.

use std::path::{Path, PathBuf};

/// Default root directory for stored media.
pub const MEDIA_ROOT: &str = "/var/media";

/// Directory for user avatars (all uploads land here today).
pub const AVATARS_DIR: &str = "avatars";

/// Directory for generic files.
pub const FILES_DIR: &str = "files";

/// Directories searched when resolving a file id, in order.
pub const KNOWN_DIRECTORIES: [&str; 2] = [AVATARS_DIR, FILES_DIR];

const METADATA_SUFFIX: &str = ".meta.json";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(MEDIA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all media.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn directory(&self, directory: &str) -> PathBuf {
        self.root.join(directory)
    }

    /// Path to a stored file's content.
    pub fn file(&self, directory: &str, file_id: &str) -> PathBuf {
        self.directory(directory).join(file_id)
    }

    /// Path to a stored file's metadata sidecar.
    pub fn metadata(&self, directory: &str, file_id: &str) -> PathBuf {
        self.directory(directory)
            .join(format!("{file_id}{METADATA_SUFFIX}"))
    }
}

/// Whether `directory` is one of the known storage directories.
pub fn is_known_directory(directory: &str) -> bool {
    KNOWN_DIRECTORIES.contains(&directory)
}
