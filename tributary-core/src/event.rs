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

//! `MongoDB` change stream event representation.
//!
//! This module defines the event types that flow from the change feed into
//! the egress producer. Each event carries the operation kind, the key of
//! the affected document, the post-image where the stream provides one, and
//! the opaque resume token that positions the stream immediately after the
//! event.
//!
//! # Examples
//!
//! ```rust
//! use tributary_core::event::{ChangeEvent, OperationType};
//! use bson::doc;
//!
//! let event = ChangeEvent {
//!     operation: OperationType::Insert,
//!     document_key: Some(doc! { "_id": "7" }),
//!     full_document: Some(doc! { "_id": "7", "x": 1 }),
//!     resume_token: doc! { "_data": "t1" },
//! };
//!
//! assert!(event.has_full_document());
//! assert_eq!(event.operation.sanitized(), "insert");
//! ```

use bson::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error that can occur when converting from the driver's change stream event.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    /// Failed to convert the resume token into a BSON document.
    #[error("failed to convert resume token: {0}")]
    ResumeToken(String),
}

/// Change stream operation types.
///
/// The `Unknown` variant preserves the raw operation tag so that events from
/// newer `MongoDB` versions can still be counted and skipped instead of
/// failing the stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum OperationType {
    /// A document was inserted into the collection.
    Insert,

    /// A document was updated in place.
    Update,

    /// A document was replaced entirely.
    Replace,

    /// A document was deleted.
    Delete,

    /// The collection was dropped.
    Drop,

    /// The collection was renamed.
    Rename,

    /// The database was dropped.
    #[serde(rename = "dropdatabase")]
    DropDatabase,

    /// The stream was invalidated (collection dropped or renamed away).
    Invalidate,

    /// An operation type this library does not know about.
    ///
    /// Contains the original operation tag for logging.
    #[serde(untagged)]
    Unknown(String),
}

impl OperationType {
    /// Maps the operation onto the sanitized whitelist used in egress
    /// metadata and metric labels.
    ///
    /// Whitelisted operations map onto their wire name; anything else
    /// becomes the literal string `"unknown"`.
    #[must_use]
    pub fn sanitized(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Drop => "drop",
            Self::Rename => "rename",
            Self::DropDatabase => "dropDatabase",
            Self::Invalidate => "invalidate",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Returns true for operations that carry a post-image to emit
    /// (insert, update, replace).
    #[inline]
    #[must_use]
    pub fn carries_post_image(&self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Replace)
    }

    /// Returns true if this is an unknown operation type.
    #[inline]
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sanitized())
    }
}

/// A single change stream event.
///
/// This is the unit of work of the tailing loop: classify, emit, then
/// persist `resume_token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Type of operation that occurred.
    #[serde(rename = "operationType")]
    pub operation: OperationType,

    /// Document key (`_id`, plus the shard key on sharded collections).
    ///
    /// Present for all document-level operations; absent for DDL events.
    #[serde(rename = "documentKey", skip_serializing_if = "Option::is_none")]
    pub document_key: Option<Document>,

    /// Full post-image of the document.
    ///
    /// Present for insert and replace always, and for update when the
    /// stream is opened with full-document update lookup.
    #[serde(rename = "fullDocument", skip_serializing_if = "Option::is_none")]
    pub full_document: Option<Document>,

    /// Opaque resume token positioning the stream after this event.
    #[serde(rename = "_id")]
    pub resume_token: Document,
}

impl ChangeEvent {
    /// Returns the `_id` value from the document key, if present.
    pub fn document_id(&self) -> Option<&bson::Bson> {
        self.document_key.as_ref()?.get("_id")
    }

    /// Returns true if this event has a post-image.
    #[inline]
    #[must_use]
    pub fn has_full_document(&self) -> bool {
        self.full_document.is_some()
    }
}

/// Conversion from the driver's change stream event.
///
/// Unknown operation types are preserved rather than rejected so the loop
/// can count and skip them.
impl TryFrom<mongodb::change_stream::event::ChangeStreamEvent<Document>> for ChangeEvent {
    type Error = ConversionError;

    fn try_from(
        event: mongodb::change_stream::event::ChangeStreamEvent<Document>,
    ) -> Result<Self, Self::Error> {
        use mongodb::change_stream::event::OperationType as MongoOpType;

        let operation = match event.operation_type {
            MongoOpType::Insert => OperationType::Insert,
            MongoOpType::Update => OperationType::Update,
            MongoOpType::Replace => OperationType::Replace,
            MongoOpType::Delete => OperationType::Delete,
            MongoOpType::Drop => OperationType::Drop,
            MongoOpType::Rename => OperationType::Rename,
            MongoOpType::DropDatabase => OperationType::DropDatabase,
            MongoOpType::Invalidate => OperationType::Invalidate,
            other => OperationType::Unknown(format!("{other:?}")),
        };

        // The resume token is critical for stream resumption; a token that
        // cannot round-trip through a BSON document is a hard error.
        let resume_token = bson::to_document(&event.id)
            .map_err(|e| ConversionError::ResumeToken(e.to_string()))?;

        Ok(Self {
            operation,
            document_key: event.document_key,
            full_document: event.full_document,
            resume_token,
        })
    }
}
