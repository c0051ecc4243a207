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

//! Resume-cursor store backings for the Tributary CDC pipeline.
//!
//! This crate provides the implementations of the
//! [`CursorStore`](tributary_core::cursor::CursorStore) trait:
//!
//! - [`local::FileCursorStore`] - a single file on the local filesystem,
//!   written atomically; chosen when no remote credentials are present.
//! - [`s3::S3CursorStore`] - an object on S3, relying on the store's
//!   atomic PUT; chosen when AWS credentials are configured.
//! - [`memory::MemoryCursorStore`] - volatile, for development and tests.
//!
//! The stored blob is the resume token serialized as extended JSON; load
//! and save round-trip it byte-faithfully.
//!
//! # Example
//!
//! ```rust
//! use tributary_stores::memory::MemoryCursorStore;
//! use tributary_core::cursor::CursorStore;
//! use bson::doc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryCursorStore::new();
//!
//! store.save(&doc! { "_data": "token123" }).await?;
//! assert!(store.load().await?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod local;
pub mod memory;
pub mod s3;

use bson::Document;
use tributary_core::cursor::CursorStoreError;

/// Serializes a resume token into the stored blob form.
pub(crate) fn token_to_bytes(token: &Document) -> Result<Vec<u8>, CursorStoreError> {
    serde_json::to_vec(token).map_err(|e| CursorStoreError::Serialization(e.to_string()))
}

/// Parses a stored blob back into a resume token.
pub(crate) fn token_from_bytes(bytes: &[u8]) -> Result<Document, CursorStoreError> {
    serde_json::from_slice(bytes).map_err(|e| CursorStoreError::Serialization(e.to_string()))
}
