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

//! Tributary Core - change-data-capture pipeline components.
//!
//! This crate provides the building blocks of the Tributary CDC pipeline,
//! which copies a `MongoDB` collection into a partitioned Kafka topic: a
//! one-shot bulk snapshot followed by an indefinite tail of the change
//! stream, with a durable resume cursor persisted after every processed
//! event.
//!
//! # Key Components
//!
//! - [`processor`] - the change feed processor (snapshot → tail state
//!   machine, classification, cursor acknowledgement)
//! - [`snapshot`] - the bulk snapshot loader
//! - [`envelope`] - the egress envelope codec
//! - [`breaker`] - circuit breaker for external dependencies
//! - [`sink`] / [`cursor`] / [`source`] - the trait seams toward the log
//!   producer, the cursor store and the source client
//! - [`mongo`] - the `MongoDB` source implementation
//! - [`shutdown`] - the graceful shutdown coordinator
//! - [`metrics`] - metrics instrumentation shared by every component
//!
//! # Example
//!
//! ```rust
//! use tributary_core::event::{ChangeEvent, OperationType};
//!
//! fn classify(event: &ChangeEvent) -> &'static str {
//!     match event.operation {
//!         OperationType::Insert => "new document",
//!         OperationType::Delete => "document removed",
//!         _ => "other change",
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod breaker;
pub mod config;
pub mod cursor;
pub mod envelope;
pub mod event;
pub mod metrics;
pub mod mongo;
pub mod processor;
pub mod shutdown;
pub mod sink;
pub mod snapshot;
pub mod source;
