// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use runtime_metrics::{Agent, AgentConfig, AgentStatus, ProcessStatsReader, Transmitter};

fn config(url: String) -> AgentConfig {
    AgentConfig {
        collector_url: url,
        poll_interval: Duration::from_millis(100),
        report_interval: Duration::from_millis(300),
        request_timeout: Duration::from_secs(1),
        shutdown_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_agent_reports_to_collector() {
    let mut server = Server::new_async().await;
    let gauges = server
        .mock("POST", Matcher::Regex(r"^/update/gauge/Alloc/[0-9.]+$".to_string()))
        .match_header("content-type", "text/plain")
        .with_status(200)
        .expect_at_least(1)
        .create_async()
        .await;
    let poll_count = server
        .mock("POST", Matcher::Regex(r"^/update/counter/PollCount/[0-9]+$".to_string()))
        .match_header("content-type", "text/plain")
        .with_status(200)
        .expect_at_least(1)
        .create_async()
        .await;
    let _others = server
        .mock("POST", Matcher::Regex(r"^/update/".to_string()))
        .with_status(200)
        .create_async()
        .await;

    let config = config(server.url());
    let transmitter = Transmitter::new(&config).expect("failed to build transmitter");
    let agent = Agent::new(
        config,
        Arc::new(ProcessStatsReader::new()),
        Arc::new(transmitter),
    );
    let handle = agent.start().expect("failed to start agent");

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    handle.shutdown().await.expect("shutdown failed");
    assert_eq!(handle.status().await, AgentStatus::Stopped);

    gauges.assert_async().await;
    poll_count.assert_async().await;
}

#[tokio::test]
async fn test_agent_survives_unavailable_collector() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let config = config(format!("http://{addr}"));
    let transmitter = Transmitter::new(&config).expect("failed to build transmitter");
    let agent = Agent::new(
        config,
        Arc::new(ProcessStatsReader::new()),
        Arc::new(transmitter),
    );
    let handle = agent.start().expect("failed to start agent");

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(handle.is_running().await);
    assert!(handle.store().len() > 2);

    handle.shutdown().await.expect("shutdown failed");
}
