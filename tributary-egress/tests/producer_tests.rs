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

//! Batch discipline tests for the egress producer, driven against a stub
//! log client.

use futures::future::{ready, Ready};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tributary_core::sink::{DocumentSink, SinkError};
use tributary_egress::producer::{
    BatchingProducer, DeliveryError, DeliveryReport, LogClient, SubmitError,
};

/// Stub client recording submissions and resolving deliveries instantly.
#[derive(Default)]
struct StubClient {
    submissions: Arc<StdMutex<Vec<String>>>,
    reject_submits: bool,
    fail_deliveries: bool,
    closed: Arc<AtomicBool>,
}

impl StubClient {
    fn new() -> Self {
        Self::default()
    }

    fn submissions(&self) -> Arc<StdMutex<Vec<String>>> {
        Arc::clone(&self.submissions)
    }

    fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl LogClient for StubClient {
    type Delivery = Ready<Result<DeliveryReport, DeliveryError>>;

    fn submit(&mut self, key: &str, _payload: &[u8]) -> Result<Self::Delivery, SubmitError> {
        if self.reject_submits {
            return Err(SubmitError {
                message: "queue full".to_string(),
            });
        }

        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(key.to_string());
        let offset = submissions.len() as i64 - 1;

        if self.fail_deliveries {
            Ok(ready(Err(DeliveryError::Failed("broker down".to_string()))))
        } else {
            Ok(ready(Ok(DeliveryReport {
                topic: "mongodb-data".to_string(),
                partition: 0,
                offset,
            })))
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn batch_below_bound_does_not_flush() {
    let client = StubClient::new();
    let submissions = client.submissions();
    let mut producer = BatchingProducer::new(client, 3);

    producer.send("a", b"1".to_vec()).await.unwrap();
    producer.send("b", b"2".to_vec()).await.unwrap();

    assert!(submissions.lock().unwrap().is_empty());
    assert_eq!(producer.pending(), 2);
    assert_eq!(producer.flush_count(), 0);
}

#[tokio::test]
async fn reaching_the_bound_flushes_inline() {
    let client = StubClient::new();
    let submissions = client.submissions();
    let mut producer = BatchingProducer::new(client, 3);

    producer.send("a", b"1".to_vec()).await.unwrap();
    producer.send("b", b"2".to_vec()).await.unwrap();
    producer.send("c", b"3".to_vec()).await.unwrap();

    assert_eq!(*submissions.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(producer.pending(), 0);
    assert_eq!(producer.flush_count(), 1);
    assert_eq!(producer.delivered_ok(), 3);
}

#[tokio::test]
async fn records_are_submitted_in_fifo_order() {
    let client = StubClient::new();
    let submissions = client.submissions();
    let mut producer = BatchingProducer::new(client, 100);

    for key in ["k1", "k2", "k3", "k4", "k5"] {
        producer.send(key, b"payload".to_vec()).await.unwrap();
    }
    producer.flush().await.unwrap();

    assert_eq!(
        *submissions.lock().unwrap(),
        vec!["k1", "k2", "k3", "k4", "k5"]
    );
}

#[tokio::test]
async fn close_on_empty_batch_touches_no_records() {
    let client = StubClient::new();
    let submissions = client.submissions();
    let closed = client.closed_flag();
    let mut producer = BatchingProducer::new(client, 3);

    producer.close().await.unwrap();

    assert!(submissions.lock().unwrap().is_empty());
    assert_eq!(producer.flush_count(), 0);
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn close_drains_the_pending_batch() {
    let client = StubClient::new();
    let submissions = client.submissions();
    let closed = client.closed_flag();
    let mut producer = BatchingProducer::new(client, 100);

    producer.send("a", b"1".to_vec()).await.unwrap();
    producer.close().await.unwrap();

    assert_eq!(*submissions.lock().unwrap(), vec!["a"]);
    assert_eq!(producer.flush_count(), 1);
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn send_after_close_is_rejected() {
    let mut producer = BatchingProducer::new(StubClient::new(), 3);
    producer.close().await.unwrap();

    let err = producer.send("a", b"1".to_vec()).await.unwrap_err();
    assert!(matches!(err, SinkError::Closed));
}

#[tokio::test]
async fn delivery_failures_are_counted_not_propagated() {
    let client = StubClient {
        fail_deliveries: true,
        ..StubClient::new()
    };
    let mut producer = BatchingProducer::new(client, 2);

    producer.send("a", b"1".to_vec()).await.unwrap();
    producer.send("b", b"2".to_vec()).await.unwrap();

    assert_eq!(producer.delivered_ok(), 0);
    assert_eq!(producer.delivered_err(), 2);
}

#[tokio::test]
async fn submit_rejections_are_counted_not_propagated() {
    let client = StubClient {
        reject_submits: true,
        ..StubClient::new()
    };
    let mut producer = BatchingProducer::new(client, 100);

    producer.send("a", b"1".to_vec()).await.unwrap();
    producer.flush().await.unwrap();

    assert_eq!(producer.delivered_err(), 1);
    assert_eq!(producer.pending(), 0);
}

#[tokio::test]
async fn explicit_flush_on_partial_batch_drains_it() {
    let client = StubClient::new();
    let submissions = client.submissions();
    let mut producer = BatchingProducer::new(client, 100);

    producer.send("a", b"1".to_vec()).await.unwrap();
    producer.flush().await.unwrap();
    producer.flush().await.unwrap(); // empty: no second flush recorded

    assert_eq!(*submissions.lock().unwrap(), vec!["a"]);
    assert_eq!(producer.flush_count(), 1);
}
