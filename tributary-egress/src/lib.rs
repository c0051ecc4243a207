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

//! Batching Kafka egress for the Tributary CDC pipeline.
//!
//! This crate implements the pipeline's single
//! [`DocumentSink`](tributary_core::sink::DocumentSink): a count-bounded
//! batching producer over the Kafka client, with ordered submission and
//! per-record delivery accounting.
//!
//! # Example
//!
//! ```rust,ignore
//! use tributary_egress::kafka::{KafkaEgressConfig, KafkaLogClient};
//! use tributary_egress::producer::BatchingProducer;
//!
//! let config = KafkaEgressConfig::builder()
//!     .bootstrap_servers("localhost:9092")
//!     .topic("mongodb-data")
//!     .build()?;
//!
//! let client = KafkaLogClient::new(&config)?;
//! let producer = BatchingProducer::new(client, config.batch_count);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod kafka;
pub mod producer;
