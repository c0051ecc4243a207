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

//! Shared stubs for pipeline scenario tests: a scripted feed source, a
//! scripted snapshot source, a recording sink and an in-memory cursor
//! store.

#![allow(dead_code)]

use async_trait::async_trait;
use bson::Document;
use std::sync::{Arc, Mutex as StdMutex};
use tributary_core::cursor::{CursorStore, CursorStoreError};
use tributary_core::event::ChangeEvent;
use tributary_core::sink::{DocumentSink, SinkError};
use tributary_core::source::{
    DocumentStream, EventStream, FeedOptions, FeedSource, SnapshotSource, SourceError,
};

/// A record captured by [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub key: String,
    pub payload: serde_json::Value,
}

/// Sink that records everything it is handed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub records: Vec<SentRecord>,
    pub flush_count: usize,
    pub close_count: usize,
    pub fail_sends: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key.clone()).collect()
    }
}

#[async_trait]
impl DocumentSink for RecordingSink {
    async fn send(&mut self, key: &str, payload: Vec<u8>) -> Result<(), SinkError> {
        if self.fail_sends {
            return Err(SinkError::submit("stubbed send failure"));
        }

        let payload = serde_json::from_slice(&payload)
            .map_err(|e| SinkError::submit(format!("non-JSON payload: {e}")))?;
        self.records.push(SentRecord {
            key: key.to_string(),
            payload,
        });
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.flush_count += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.close_count += 1;
        Ok(())
    }
}

/// Feed source replaying a scripted sequence of events and read errors.
///
/// The stream ends after the script is exhausted, which makes the
/// processor's run return cleanly.
pub struct ScriptedFeed {
    script: StdMutex<Option<Vec<Result<ChangeEvent, SourceError>>>>,
    opened_with: Arc<StdMutex<Option<FeedOptions>>>,
}

impl ScriptedFeed {
    pub fn new(script: Vec<Result<ChangeEvent, SourceError>>) -> Self {
        Self {
            script: StdMutex::new(Some(script)),
            opened_with: Arc::new(StdMutex::new(None)),
        }
    }

    pub fn from_events(events: Vec<ChangeEvent>) -> Self {
        Self::new(events.into_iter().map(Ok).collect())
    }

    /// Handle to the options the feed was opened with.
    pub fn opened_with(&self) -> Arc<StdMutex<Option<FeedOptions>>> {
        Arc::clone(&self.opened_with)
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn open(&self, options: FeedOptions) -> Result<EventStream, SourceError> {
        *self.opened_with.lock().unwrap() = Some(options);
        let script = self
            .script
            .lock()
            .unwrap()
            .take()
            .unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(script)))
    }
}

/// Feed source whose every read fails, for breaker tests.
pub struct FailingFeed;

#[async_trait]
impl FeedSource for FailingFeed {
    async fn open(&self, _options: FeedOptions) -> Result<EventStream, SourceError> {
        Ok(Box::pin(futures::stream::repeat_with(|| {
            Err(SourceError::driver("stubbed read failure"))
        })))
    }
}

/// Snapshot source replaying a fixed document list.
pub struct ScriptedScan {
    documents: StdMutex<Option<Vec<Document>>>,
}

impl ScriptedScan {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: StdMutex::new(Some(documents)),
        }
    }
}

#[async_trait]
impl SnapshotSource for ScriptedScan {
    async fn scan(&self, _batch_size: u32) -> Result<DocumentStream, SourceError> {
        let documents = self
            .documents
            .lock()
            .unwrap()
            .take()
            .unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(
            documents.into_iter().map(Ok),
        )))
    }
}

/// In-memory cursor store recording every save in order.
#[derive(Debug, Default)]
pub struct TestCursorStore {
    token: StdMutex<Option<Document>>,
    saved: StdMutex<Vec<Document>>,
    pub fail_saves: bool,
    pub fail_loads: bool,
}

impl TestCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Document) -> Self {
        Self {
            token: StdMutex::new(Some(token)),
            ..Self::default()
        }
    }

    pub fn failing_saves() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn failing_loads() -> Self {
        Self {
            fail_loads: true,
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<Document> {
        self.token.lock().unwrap().clone()
    }

    /// Every token saved, in save order.
    pub fn history(&self) -> Vec<Document> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl CursorStore for TestCursorStore {
    async fn load(&self) -> Result<Option<Document>, CursorStoreError> {
        if self.fail_loads {
            return Err(CursorStoreError::Backend("stubbed load failure".into()));
        }
        Ok(self.token.lock().unwrap().clone())
    }

    async fn save(&self, token: &Document) -> Result<(), CursorStoreError> {
        if self.fail_saves {
            return Err(CursorStoreError::Backend("stubbed save failure".into()));
        }
        *self.token.lock().unwrap() = Some(token.clone());
        self.saved.lock().unwrap().push(token.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), CursorStoreError> {
        Ok(())
    }
}
