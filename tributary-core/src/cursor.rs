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

//! Resume-cursor persistence.
//!
//! The [`CursorStore`] trait abstracts where the change stream resume token
//! lives between process restarts. Exactly one token is stored: the store
//! holds the position of the last acknowledged event and is overwritten on
//! every acknowledgement.
//!
//! Each pipeline instance assumes sole ownership of its cursor; there is no
//! cross-instance coordination.
//!
//! # Example
//!
//! ```rust
//! use tributary_core::cursor::{CursorStore, CursorStoreError};
//! use bson::{doc, Document};
//! use std::sync::Arc;
//! use tokio::sync::RwLock;
//!
//! #[derive(Default)]
//! struct InMemory {
//!     token: Arc<RwLock<Option<Document>>>,
//! }
//!
//! #[async_trait::async_trait]
//! impl CursorStore for InMemory {
//!     async fn load(&self) -> Result<Option<Document>, CursorStoreError> {
//!         Ok(self.token.read().await.clone())
//!     }
//!
//!     async fn save(&self, token: &Document) -> Result<(), CursorStoreError> {
//!         *self.token.write().await = Some(token.clone());
//!         Ok(())
//!     }
//!
//!     async fn close(&self) -> Result<(), CursorStoreError> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use bson::Document;
use thiserror::Error;

/// Errors that can occur during cursor store operations.
#[derive(Debug, Error)]
pub enum CursorStoreError {
    /// I/O error from a filesystem backing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored bytes could not be parsed back into a token.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A remote backing could not be reached or rejected the request.
    #[error("backend error: {0}")]
    Backend(String),

    /// Other errors.
    #[error("cursor store error: {0}")]
    Other(String),
}

/// Trait for resume-cursor storage backends.
///
/// Implementations must make `save` resilient to partial writes: after a
/// crash mid-save, either the new token is fully visible or the previous
/// one remains readable.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Loads the persisted resume token.
    ///
    /// Returns `None` when no token has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing is reachable but the token cannot
    /// be read or parsed. Callers treat this as "start from now" after
    /// logging.
    async fn load(&self) -> Result<Option<Document>, CursorStoreError>;

    /// Persists the resume token, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be written. Save failures never
    /// abort the feed loop; the next acknowledgement overwrites.
    async fn save(&self, token: &Document) -> Result<(), CursorStoreError>;

    /// Closes the store, releasing any resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be closed cleanly.
    async fn close(&self) -> Result<(), CursorStoreError>;
}
