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

//! Source-store seam: the thin interfaces through which the snapshot
//! loader and the change feed processor read from the source collection.
//!
//! The pipeline treats the source client library as an external
//! collaborator. [`SnapshotSource`] yields the full collection once;
//! [`FeedSource`] opens the resumable change feed. The production
//! implementation over the `MongoDB` driver lives in
//! [`mongo`](crate::mongo); tests substitute scripted stubs.

use crate::event::{ChangeEvent, ConversionError};
use async_trait::async_trait;
use bson::{doc, Document};
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Stream of raw documents from a collection scan.
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<Document, SourceError>> + Send>>;

/// Stream of change events from the feed.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ChangeEvent, SourceError>> + Send>>;

/// Errors surfaced by a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Driver-level failure: connection loss, timeout, server error.
    #[error("source error: {message}")]
    Driver {
        /// Human-readable error message.
        message: String,
        /// The underlying driver error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A feed event could not be converted into the pipeline event model.
    #[error("event conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// A persisted resume token could not be converted for the driver.
    ///
    /// Surfaced instead of silently opening from "now", which would hide
    /// a gap in the feed behind a corrupt cursor blob.
    #[error("invalid resume token: {0}")]
    ResumeToken(String),
}

impl SourceError {
    /// Creates a driver error with a custom message.
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
            source: None,
        }
    }
}

impl From<mongodb::error::Error> for SourceError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Driver {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Options applied when opening the change feed.
#[derive(Debug, Clone, Default)]
pub struct FeedOptions {
    /// Resume token to continue after; `None` starts from now.
    pub resume_after: Option<Document>,

    /// Server-side batch size for feed reads.
    pub batch_size: Option<u32>,

    /// Upper bound on how long a single feed read may block server-side.
    pub read_timeout: Option<Duration>,
}

/// Source of the one-shot full-collection scan.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Opens a cursor over the entire collection.
    ///
    /// Document order is whatever the server yields; no sort is imposed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be opened.
    async fn scan(&self, batch_size: u32) -> Result<DocumentStream, SourceError>;
}

/// Source of the resumable change feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Opens the change feed with the server-side filter installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be opened (including an invalid
    /// resume token).
    async fn open(&self, options: FeedOptions) -> Result<EventStream, SourceError>;
}

/// The server-side filter installed on every feed open.
///
/// Excludes the internal `system.indexes` namespace and `invalidate`
/// events. Factored here so every feed consumer installs the identical
/// filter.
#[must_use]
pub fn feed_filter() -> Vec<Document> {
    vec![doc! {
        "$match": {
            "$and": [
                { "ns.coll": { "$ne": "system.indexes" } },
                { "operationType": { "$ne": "invalidate" } },
            ]
        }
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_filter_excludes_system_indexes_and_invalidate() {
        let filter = feed_filter();
        assert_eq!(filter.len(), 1);

        let stage = filter[0].get_document("$match").unwrap();
        let clauses = stage.get_array("$and").unwrap();
        assert_eq!(clauses.len(), 2);

        let rendered = serde_json::to_string(&filter[0]).unwrap();
        assert!(rendered.contains("system.indexes"));
        assert!(rendered.contains("invalidate"));
    }
}
