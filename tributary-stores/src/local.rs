// Copyright 2025 Tributary Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! File-backed cursor store.
//!
//! Keeps the resume token in a single file. Saves go through a temporary
//! file in the same directory followed by a rename, so a crash mid-write
//! leaves either the previous token or the new one fully visible, never a
//! torn blob.

use async_trait::async_trait;
use bson::Document;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tributary_core::cursor::{CursorStore, CursorStoreError};

use crate::{token_from_bytes, token_to_bytes};

/// Cursor store backed by a file on the local filesystem.
///
/// Chosen when no remote credentials are configured.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    /// Creates a store writing to `path`.
    ///
    /// The parent directory is created on the first save if it does not
    /// exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!(path = %path.display(), "Using local resume cursor storage");
        Self { path }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map_or_else(
            || std::ffi::OsString::from("resume-token"),
            std::borrow::ToOwned::to_owned,
        );
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<Option<Document>, CursorStoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                debug!(path = %self.path.display(), "Loaded resume cursor from file");
                token_from_bytes(&bytes).map(Some)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "No resume cursor file found");
                Ok(None)
            }
            Err(err) => Err(CursorStoreError::Io(err)),
        }
    }

    async fn save(&self, token: &Document) -> Result<(), CursorStoreError> {
        let bytes = token_to_bytes(token)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write-then-rename keeps the previous token readable if the
        // process dies mid-save.
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), "Saved resume cursor to file");
        Ok(())
    }

    async fn close(&self) -> Result<(), CursorStoreError> {
        Ok(())
    }
}
