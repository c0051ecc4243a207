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

//! Scenario tests for the bulk snapshot loader.

mod common;

use bson::doc;
use common::{RecordingSink, ScriptedScan};
use std::sync::Arc;
use tokio::sync::Mutex;
use tributary_core::snapshot::SnapshotLoader;

#[tokio::test]
async fn snapshot_emits_every_document_with_initial_load_metadata() {
    let scan = ScriptedScan::new(vec![
        doc! { "_id": "1", "name": "a" },
        doc! { "_id": "2", "name": "b", "vuid": "V2" },
        doc! { "_id": "3" },
    ]);
    let sink = Arc::new(Mutex::new(RecordingSink::new()));

    let loader = SnapshotLoader::new(scan, Arc::clone(&sink), true, 2);
    let summary = loader.run().await.unwrap();

    assert!(summary.ran);
    assert_eq!(summary.documents, 3);

    let sink = sink.lock().await;
    assert_eq!(sink.keys(), vec!["1", "V2", "3"]);
    for record in &sink.records {
        assert_eq!(record.payload["_operation"], "read");
        assert_eq!(record.payload["_source"], "initial_load");
        assert!(record.payload["_timestamp"].is_string());
    }
}

#[tokio::test]
async fn disabled_snapshot_is_a_no_op() {
    let scan = ScriptedScan::new(vec![doc! { "_id": "1" }]);
    let sink = Arc::new(Mutex::new(RecordingSink::new()));

    let loader = SnapshotLoader::new(scan, Arc::clone(&sink), false, 100);
    let summary = loader.run().await.unwrap();

    assert!(!summary.ran);
    assert_eq!(summary.documents, 0);

    let sink = sink.lock().await;
    assert!(sink.records.is_empty());
    assert_eq!(sink.flush_count, 0);
}

#[tokio::test]
async fn snapshot_of_empty_collection_completes_with_zero_documents() {
    let scan = ScriptedScan::new(vec![]);
    let sink = Arc::new(Mutex::new(RecordingSink::new()));

    let loader = SnapshotLoader::new(scan, Arc::clone(&sink), true, 100);
    let summary = loader.run().await.unwrap();

    assert!(summary.ran);
    assert_eq!(summary.documents, 0);
    assert!(sink.lock().await.records.is_empty());
}

#[tokio::test]
async fn sink_rejections_skip_the_document_but_keep_loading() {
    let scan = ScriptedScan::new(vec![doc! { "_id": "1" }, doc! { "_id": "2" }]);
    let sink = Arc::new(Mutex::new(RecordingSink {
        fail_sends: true,
        ..RecordingSink::new()
    }));

    let loader = SnapshotLoader::new(scan, Arc::clone(&sink), true, 100);
    let summary = loader.run().await.unwrap();

    // Both documents were attempted; none landed.
    assert!(summary.ran);
    assert_eq!(summary.documents, 0);
    assert!(sink.lock().await.records.is_empty());
}
