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

//! Filesystem-backed cursor store tests.

use bson::doc;
use tempfile::tempdir;
use tributary_core::cursor::{CursorStore, CursorStoreError};
use tributary_stores::local::FileCursorStore;

#[tokio::test]
async fn load_returns_none_when_file_is_missing() {
    let dir = tempdir().unwrap();
    let store = FileCursorStore::new(dir.path().join("resume-token.json"));

    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn save_then_load_round_trips_the_token() {
    let dir = tempdir().unwrap();
    let store = FileCursorStore::new(dir.path().join("resume-token.json"));

    let token = doc! { "_data": "82637FD1C8000000012B0229296E04" };
    store.save(&token).await.unwrap();

    assert_eq!(store.load().await.unwrap(), Some(token));
}

#[tokio::test]
async fn save_overwrites_the_previous_token() {
    let dir = tempdir().unwrap();
    let store = FileCursorStore::new(dir.path().join("resume-token.json"));

    store.save(&doc! { "_data": "t1" }).await.unwrap();
    store.save(&doc! { "_data": "t2" }).await.unwrap();

    assert_eq!(store.load().await.unwrap(), Some(doc! { "_data": "t2" }));
}

#[tokio::test]
async fn save_leaves_no_temporary_file_behind() {
    let dir = tempdir().unwrap();
    let store = FileCursorStore::new(dir.path().join("resume-token.json"));

    store.save(&doc! { "_data": "t1" }).await.unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries, vec!["resume-token.json"]);
}

#[tokio::test]
async fn save_creates_missing_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("dir").join("token.json");
    let store = FileCursorStore::new(&path);

    store.save(&doc! { "_data": "t1" }).await.unwrap();

    assert!(path.exists());
    assert!(store.load().await.unwrap().is_some());
}

#[tokio::test]
async fn corrupt_file_surfaces_a_serialization_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("resume-token.json");
    std::fs::write(&path, b"not json at all").unwrap();

    let store = FileCursorStore::new(&path);
    let err = store.load().await.unwrap_err();

    assert!(matches!(err, CursorStoreError::Serialization(_)));
}

#[tokio::test]
async fn stored_blob_is_readable_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("resume-token.json");
    let store = FileCursorStore::new(&path);

    store.save(&doc! { "_data": "t1" }).await.unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["_data"], "t1");
}
