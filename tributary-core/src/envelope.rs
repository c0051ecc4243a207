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

//! Egress envelope codec.
//!
//! Serializes a source document plus metadata into the JSON payload emitted
//! to the log topic. The document is mapped with a relaxed BSON-to-JSON
//! conversion in which identifiers, timestamps and decimals render in their
//! natural human-readable forms (`ObjectId` as hex, dates as ISO-8601 UTC)
//! rather than extended-JSON wrappers. Three metadata fields are then
//! appended at the top level:
//!
//! - `_operation` - the sanitized operation string;
//! - `_source` - `"initial_load"` or `"change_stream"`;
//! - `_timestamp` - envelope build time, ISO-8601 UTC with millisecond
//!   precision.
//!
//! Metadata wins on collision: a source document that already carries one
//! of the three fields has it overwritten, which also makes envelope
//! building idempotent.
//!
//! # Examples
//!
//! ```rust
//! use tributary_core::envelope::{self, EventSource};
//! use bson::doc;
//!
//! let document = doc! { "_id": "7", "x": 1 };
//! let payload = envelope::build(&document, "insert", EventSource::ChangeStream);
//!
//! assert_eq!(payload["_id"], "7");
//! assert_eq!(payload["x"], 1);
//! assert_eq!(payload["_operation"], "insert");
//! assert_eq!(payload["_source"], "change_stream");
//! ```

use bson::{Bson, Document};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

/// Envelope metadata field holding the operation string.
pub const FIELD_OPERATION: &str = "_operation";

/// Envelope metadata field holding the event source.
pub const FIELD_SOURCE: &str = "_source";

/// Envelope metadata field holding the envelope build timestamp.
pub const FIELD_TIMESTAMP: &str = "_timestamp";

/// Which phase of the pipeline produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// The one-shot bulk snapshot.
    InitialLoad,

    /// The change stream tail.
    ChangeStream,
}

impl EventSource {
    /// The wire value written into the `_source` metadata field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InitialLoad => "initial_load",
            Self::ChangeStream => "change_stream",
        }
    }
}

/// Builds the egress envelope for a document.
///
/// The returned value is always a JSON object: the relaxed mapping of
/// `document` with the three metadata fields appended on top.
#[must_use]
pub fn build(document: &Document, operation: &str, source: EventSource) -> Value {
    let mut object = match document_to_json(document) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    object.insert(FIELD_OPERATION.to_string(), json!(operation));
    object.insert(FIELD_SOURCE.to_string(), json!(source.as_str()));
    object.insert(
        FIELD_TIMESTAMP.to_string(),
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    Value::Object(object)
}

/// Derives the partition key for a document.
///
/// The user-defined `vuid` field overrides `_id` when present; a document
/// with neither resolvable yields the literal string `"null"`.
#[must_use]
pub fn partition_key(document: &Document) -> String {
    if let Some(vuid) = document.get("vuid") {
        return scalar_to_string(vuid);
    }
    match document.get("_id") {
        Some(id) => scalar_to_string(id),
        None => "null".to_string(),
    }
}

/// Maps a BSON document onto a JSON object under the relaxed mapping.
#[must_use]
pub fn document_to_json(document: &Document) -> Value {
    let mut object = Map::with_capacity(document.len());
    for (key, value) in document {
        object.insert(key.clone(), bson_to_json(value));
    }
    Value::Object(object)
}

/// Renders a scalar BSON value as the string used for partition keys and
/// marker checks.
///
/// Strings render unquoted; everything else follows the relaxed mapping
/// and is stringified. `Null` renders as `"null"`.
#[must_use]
pub fn scalar_to_string(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Null => "null".to_string(),
        other => match bson_to_json(other) {
            Value::String(s) => s,
            json => json.to_string(),
        },
    }
}

/// The relaxed BSON-to-JSON value mapping.
///
/// Identifier, timestamp and decimal types render as plain strings or
/// numbers instead of extended-JSON wrapper objects; containers are mapped
/// recursively.
fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Double(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        Bson::String(v) => json!(v),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_json(doc),
        Bson::Boolean(v) => json!(v),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Int32(v) => json!(v),
        Bson::Int64(v) => json!(v),
        Bson::ObjectId(oid) => json!(oid.to_hex()),
        Bson::DateTime(dt) => json!(dt
            .to_chrono()
            .to_rfc3339_opts(SecondsFormat::Millis, true)),
        Bson::Timestamp(ts) => {
            // Oplog timestamps carry seconds plus an in-second counter; the
            // counter has no wall-clock meaning and is dropped.
            chrono::DateTime::from_timestamp(i64::from(ts.time), 0)
                .map_or(Value::Null, |dt| {
                    json!(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
                })
        }
        Bson::Decimal128(d) => json!(d.to_string()),
        Bson::Binary(bin) => json!(hex_string(&bin.bytes)),
        Bson::RegularExpression(re) => json!(re.pattern),
        Bson::JavaScriptCode(code) => json!(code),
        Bson::JavaScriptCodeWithScope(code) => json!(code.code),
        Bson::Symbol(s) => json!(s),
        Bson::MinKey | Bson::MaxKey | Bson::DbPointer(_) => Value::Null,
    }
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
