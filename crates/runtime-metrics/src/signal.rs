// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::{debug, error};

/// Resolves on the first SIGINT, SIGTERM or SIGQUIT.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigquit) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(term), Ok(quit)) => (term, quit),
        _ => {
            error!("Failed to install signal handlers, falling back to Ctrl-C");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => debug!("Received SIGINT"),
        _ = sigterm.recv() => debug!("Received SIGTERM"),
        _ = sigquit.recv() => debug!("Received SIGQUIT"),
    }
}

/// Resolves on Ctrl-C.
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        debug!("Received Ctrl-C");
    } else {
        error!("Failed to listen for Ctrl-C");
    }
}
