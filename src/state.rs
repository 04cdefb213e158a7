// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::AuthState;
use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::storage::FileStorage;

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthState,
    pub storage: Arc<dyn FileStorage>,
    /// Upload size limit in bytes
    pub max_file_size: u64,
}

impl AppState {
    pub fn new(auth: AuthState, storage: Arc<dyn FileStorage>) -> Self {
        Self {
            auth,
            storage,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }
}

