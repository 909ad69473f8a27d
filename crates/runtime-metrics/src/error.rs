// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::stats::StatsError;

/// Errors that can occur when starting or stopping the agent
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Runtime statistics unavailable: {0}")]
    StatsUnavailable(#[from] StatsError),

    #[error("Shutdown timeout exceeded")]
    ShutdownTimeout,
}
