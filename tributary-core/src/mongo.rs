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

//! `MongoDB` implementation of the source seam.
//!
//! [`MongoSource`] backs both [`SnapshotSource`] (full-collection scan with
//! server-side batching) and [`FeedSource`] (change stream with the shared
//! filter, full-document update lookup and resume-token support).

use crate::config::SourceConfig;
use crate::event::ChangeEvent;
use crate::source::{
    feed_filter, DocumentStream, EventStream, FeedOptions, FeedSource, SnapshotSource, SourceError,
};
use async_trait::async_trait;
use bson::{doc, Document};
use futures::StreamExt;
use mongodb::change_stream::event::ResumeToken;
use mongodb::options::{ChangeStreamOptions, ClientOptions, FullDocumentType};
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

/// Source client bound to one database and collection.
#[derive(Clone)]
pub struct MongoSource {
    database: Database,
    collection: Collection<Document>,
}

impl MongoSource {
    /// Binds a source to the database and collection named in `config`.
    #[must_use]
    pub fn new(client: &Client, config: &SourceConfig) -> Self {
        let database = client.database(&config.database);
        let collection = database.collection(&config.collection);
        Self {
            database,
            collection,
        }
    }

    /// Builds a `MongoDB` client from the source configuration.
    ///
    /// Pool bounds and the connect timeout come from the configuration; the
    /// read timeout is applied per-operation when cursors are opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI cannot be parsed or the client cannot be
    /// constructed.
    pub async fn connect(config: &SourceConfig) -> Result<Client, SourceError> {
        info!(
            database = %config.database,
            collection = %config.collection,
            "Connecting to MongoDB"
        );

        let mut options = ClientOptions::parse(&config.uri).await?;
        options.min_pool_size = Some(config.min_pool_size);
        options.max_pool_size = Some(config.max_pool_size);
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.connect_timeout);

        Ok(Client::with_options(options)?)
    }

    /// Round-trips a `ping` command to verify connectivity.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or replies non-ok.
    pub async fn ping(&self) -> Result<(), SourceError> {
        let reply = self.database.run_command(doc! { "ping": 1 }).await?;
        match reply.get_f64("ok").ok().or_else(|| {
            reply
                .get_i32("ok")
                .ok()
                .map(f64::from)
        }) {
            Some(ok) if ok == 1.0 => Ok(()),
            _ => Err(SourceError::driver("ping returned non-ok reply")),
        }
    }
}

#[async_trait]
impl SnapshotSource for MongoSource {
    async fn scan(&self, batch_size: u32) -> Result<DocumentStream, SourceError> {
        debug!(batch_size, "Opening full collection scan");

        let cursor = self
            .collection
            .find(doc! {})
            .batch_size(batch_size)
            .await?;

        Ok(Box::pin(cursor.map(|item| item.map_err(SourceError::from))))
    }
}

#[async_trait]
impl FeedSource for MongoSource {
    async fn open(&self, options: FeedOptions) -> Result<EventStream, SourceError> {
        let mut stream_options = ChangeStreamOptions::default();
        stream_options.full_document = Some(FullDocumentType::UpdateLookup);
        stream_options.batch_size = options.batch_size;
        stream_options.max_await_time = options.read_timeout;

        if let Some(ref token_doc) = options.resume_after {
            debug!(token = ?token_doc, "Resuming change feed from persisted token");
            stream_options.resume_after = Some(convert_resume_token(token_doc)?);
        } else {
            info!("Opening change feed from current position");
        }

        let stream = self
            .collection
            .watch()
            .pipeline(feed_filter())
            .with_options(stream_options)
            .await?;

        Ok(Box::pin(stream.map(|item| match item {
            Ok(event) => ChangeEvent::try_from(event).map_err(SourceError::from),
            Err(err) => Err(SourceError::from(err)),
        })))
    }
}

/// Round-trips a persisted token document into the driver's token type.
///
/// Tokens are persisted as BSON documents; the driver wants its own token
/// type back, so the conversion goes through raw BSON bytes. A token that
/// does not round-trip is an error, never a silent start-from-now: the
/// caller decides whether a gap in the feed is acceptable.
fn convert_resume_token(token_doc: &Document) -> Result<ResumeToken, SourceError> {
    let bytes =
        bson::to_vec(token_doc).map_err(|e| SourceError::ResumeToken(e.to_string()))?;
    bson::from_slice::<ResumeToken>(&bytes).map_err(|e| SourceError::ResumeToken(e.to_string()))
}
