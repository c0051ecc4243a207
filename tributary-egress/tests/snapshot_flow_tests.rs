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

//! End-to-end snapshot flow: the bulk loader driving the batching
//! producer, with flush boundaries asserted against a stub log client.

use async_trait::async_trait;
use bson::{doc, Document};
use futures::future::{ready, Ready};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tributary_core::sink::DocumentSink;
use tributary_core::snapshot::SnapshotLoader;
use tributary_core::source::{DocumentStream, SnapshotSource, SourceError};
use tributary_egress::producer::{
    BatchingProducer, DeliveryError, DeliveryReport, LogClient, SubmitError,
};

struct FixedScan(StdMutex<Option<Vec<Document>>>);

#[async_trait]
impl SnapshotSource for FixedScan {
    async fn scan(&self, _batch_size: u32) -> Result<DocumentStream, SourceError> {
        let documents = self.0.lock().unwrap().take().unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(
            documents.into_iter().map(Ok),
        )))
    }
}

#[derive(Default)]
struct CapturingClient {
    records: Arc<StdMutex<Vec<(String, serde_json::Value)>>>,
}

impl LogClient for CapturingClient {
    type Delivery = Ready<Result<DeliveryReport, DeliveryError>>;

    fn submit(&mut self, key: &str, payload: &[u8]) -> Result<Self::Delivery, SubmitError> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| SubmitError {
                message: e.to_string(),
            })?;

        let mut records = self.records.lock().unwrap();
        records.push((key.to_string(), value));
        let offset = records.len() as i64 - 1;

        Ok(ready(Ok(DeliveryReport {
            topic: "mongodb-data".to_string(),
            partition: 0,
            offset,
        })))
    }

    fn close(&mut self) {}
}

#[tokio::test]
async fn snapshot_of_three_documents_flushes_at_the_bound_and_on_close() {
    let scan = FixedScan(StdMutex::new(Some(vec![
        doc! { "_id": "1", "name": "a" },
        doc! { "_id": "2", "name": "b", "vuid": "V2" },
        doc! { "_id": "3" },
    ])));

    let client = CapturingClient::default();
    let records = Arc::clone(&client.records);
    let sink = Arc::new(Mutex::new(BatchingProducer::new(client, 2)));

    let loader = SnapshotLoader::new(scan, Arc::clone(&sink), true, 2);
    let summary = loader.run().await.unwrap();
    assert_eq!(summary.documents, 3);

    // The second record filled the batch: one inline flush so far, with
    // the third record still pending.
    {
        let records = records.lock().unwrap();
        let keys: Vec<&str> = records.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["1", "V2"]);
    }
    {
        let producer = sink.lock().await;
        assert_eq!(producer.pending(), 1);
        assert_eq!(producer.flush_count(), 1);
    }

    // Close drains the remainder: second flush.
    sink.lock().await.close().await.unwrap();

    let records = records.lock().unwrap();
    let keys: Vec<&str> = records.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["1", "V2", "3"]);

    for (_, payload) in records.iter() {
        assert_eq!(payload["_source"], "initial_load");
        assert_eq!(payload["_operation"], "read");
    }

    let producer = sink.lock().await;
    assert_eq!(producer.flush_count(), 2);
    assert_eq!(producer.delivered_ok(), 3);
}
