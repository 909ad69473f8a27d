// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use runtime_metrics::{
    Agent, AgentConfig, MetricStore, MetricValue, ProcessStatsReader, Transmitter,
};
use runtime_metrics_collector::serve;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct RunningCollector {
    url: String,
    store: Arc<MetricStore>,
    shutdown_token: CancellationToken,
    task: JoinHandle<Result<(), runtime_metrics_collector::CollectorError>>,
}

async fn start_collector() -> RunningCollector {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let store = Arc::new(MetricStore::new());
    let shutdown_token = CancellationToken::new();
    let task = tokio::spawn(serve(
        listener,
        Arc::clone(&store),
        shutdown_token.clone(),
    ));
    RunningCollector {
        url: format!("http://{addr}"),
        store,
        shutdown_token,
        task,
    }
}

#[tokio::test]
async fn test_collector_routes_over_http() {
    let collector = start_collector().await;
    let client = reqwest::Client::new();

    let cases = [
        ("POST", "/update/gauge/Alloc/3.5", StatusCode::OK),
        ("POST", "/update/counter/PollCount/5", StatusCode::OK),
        ("POST", "/update/counter/PollCount/42", StatusCode::OK),
        ("POST", "/update/gauge/", StatusCode::NOT_FOUND),
        ("POST", "/update/histogram/Alloc/1", StatusCode::BAD_REQUEST),
        ("POST", "/update/gauge/Alloc/none", StatusCode::BAD_REQUEST),
        ("POST", "/status", StatusCode::NOT_FOUND),
        ("GET", "/update/gauge/Alloc/3.5", StatusCode::METHOD_NOT_ALLOWED),
    ];
    for (method, path, expected) in cases {
        let method = reqwest::Method::from_bytes(method.as_bytes()).expect("method");
        let response = client
            .request(method.clone(), format!("{}{path}", collector.url))
            .header("content-type", "text/plain")
            .send()
            .await
            .expect("request failed");
        assert_eq!(response.status(), expected, "{method} {path}");
    }

    assert_eq!(collector.store.get("Alloc"), Some(MetricValue::Gauge(3.5)));
    assert_eq!(
        collector.store.get("PollCount"),
        Some(MetricValue::Counter(42))
    );

    collector.shutdown_token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), collector.task)
        .await
        .expect("collector did not stop");
    assert!(matches!(result, Ok(Ok(()))));
}

#[tokio::test]
async fn test_agent_reports_to_collector() {
    let collector = start_collector().await;

    let config = AgentConfig {
        collector_url: collector.url.clone(),
        poll_interval: Duration::from_millis(100),
        report_interval: Duration::from_millis(250),
        request_timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let transmitter = Transmitter::new(&config).expect("failed to build transmitter");
    let agent = Agent::new(
        config,
        Arc::new(ProcessStatsReader::new()),
        Arc::new(transmitter),
    );
    let handle = agent.start().expect("failed to start agent");

    tokio::time::sleep(Duration::from_millis(900)).await;
    handle.shutdown().await.expect("agent shutdown failed");

    let received = collector.store.snapshot();
    // every gauge plus RandomValue and PollCount
    assert_eq!(
        received.len(),
        runtime_metrics::stats::RUNTIME_GAUGE_COUNT + 2
    );
    assert!(matches!(
        received.get("RandomValue"),
        Some(MetricValue::Gauge(_))
    ));
    // the collector keeps the last total it received, never more than sampled
    let Some(MetricValue::Counter(received_polls)) = received.get("PollCount") else {
        panic!("PollCount not received");
    };
    let Some(MetricValue::Counter(sampled_polls)) = handle.store().get("PollCount") else {
        panic!("PollCount not sampled");
    };
    assert!(received_polls > 0);
    assert!(received_polls <= sampled_polls);

    collector.shutdown_token.cancel();
}
