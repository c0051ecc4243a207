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

//! Tributary CDC daemon.
//!
//! Loads configuration from the environment, wires the pipeline, runs the
//! bulk snapshot followed by the change feed tail, and shuts down
//! gracefully on SIGINT/SIGTERM.

mod context;
mod env;
mod health;

use context::PipelineContext;
use env::Settings;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Deadline for the graceful shutdown pass.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tributary_core::metrics::init_metrics();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let context = match PipelineContext::new(settings).await {
        Ok(context) => context,
        Err(err) => {
            error!(error = %err, "Failed to initialize pipeline");
            return ExitCode::FAILURE;
        }
    };

    let live = context.health().liveness();
    let ready = context.health().readiness().await;
    info!(live, ready, "Startup health probes");

    let coordinator = context.coordinator();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        coordinator.shutdown(SHUTDOWN_DEADLINE).await;
    });

    let outcome = context.run().await;

    // A second shutdown call collapses into the signal-triggered one.
    let clean = context.coordinator().shutdown(SHUTDOWN_DEADLINE).await;

    match outcome {
        Ok(()) => {
            info!(clean, "Pipeline stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "Pipeline failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            error!(error = %err, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
