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

//! In-memory cursor store.
//!
//! Volatile: the token is lost on process exit. Suitable for local
//! development and for tests that need to observe cursor traffic; the
//! file and S3 backings are the durable choices.

use async_trait::async_trait;
use bson::Document;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use tributary_core::cursor::{CursorStore, CursorStoreError};

/// Cursor store keeping the token in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursorStore {
    token: Arc<RwLock<Option<Document>>>,
    saves: Arc<AtomicU64>,
}

impl MemoryCursorStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a token.
    ///
    /// Useful for resume tests and for migrating from another backing.
    #[must_use]
    pub fn with_token(token: Document) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token))),
            saves: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of save calls observed.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Returns the current token without going through the trait.
    pub async fn token(&self) -> Option<Document> {
        self.token.read().await.clone()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Option<Document>, CursorStoreError> {
        Ok(self.token.read().await.clone())
    }

    async fn save(&self, token: &Document) -> Result<(), CursorStoreError> {
        debug!(?token, "Saving resume cursor in memory");
        *self.token.write().await = Some(token.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), CursorStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn starts_empty_and_overwrites() {
        let store = MemoryCursorStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save(&doc! { "_data": "t1" }).await.unwrap();
        store.save(&doc! { "_data": "t2" }).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(doc! { "_data": "t2" }));
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn with_token_pre_populates() {
        let store = MemoryCursorStore::with_token(doc! { "_data": "t1" });
        assert_eq!(store.load().await.unwrap(), Some(doc! { "_data": "t1" }));
        assert_eq!(store.save_count(), 0);
    }
}
