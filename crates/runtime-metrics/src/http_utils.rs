// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use std::error::Error;

/// Idle pooled connections are closed after this long.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Builds the client shared by every update request.
///
/// `timeout` bounds each request end to end; `max_idle_per_host` bounds the
/// number of kept-alive connections to the collector.
pub fn build_client(
    timeout: Duration,
    max_idle_per_host: usize,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .pool_max_idle_per_host(max_idle_per_host)
        .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
        // Enable TCP keepalive to detect dead connections
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5), 30).is_ok());
        assert!(build_client(Duration::from_millis(1), 0).is_ok());
    }
}
