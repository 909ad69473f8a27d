// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ships store snapshots to the collector, one HTTP call per metric.
//!
//! Every call is isolated: a timeout, a connection failure or a non-2xx status
//! is logged for that metric and the remaining calls carry on. Nothing a
//! single call does can stop the agent.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::http_utils::build_client;
use crate::request::{RequestBuilder, UpdateRequest};
use crate::store::Snapshot;

/// Outcome of one reporting tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// Requests acknowledged with a 2xx status
    pub sent: usize,
    /// Requests that failed in transport or were answered with a non-2xx status
    pub failed: usize,
    /// Entries that could not be turned into a request
    pub dropped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("collector answered with status {0}")]
    Status(StatusCode),
}

/// Receives a snapshot on every reporting tick.
#[async_trait]
pub trait Reporter {
    async fn report(&self, snapshot: &Snapshot) -> ReportSummary;
}

pub struct Transmitter {
    client: reqwest::Client,
    builder: RequestBuilder,
}

impl Transmitter {
    /// Builds the transmitter and its pooled HTTP client.
    ///
    /// Fails only when the collector URL is invalid or the client cannot be
    /// constructed, both fatal at startup.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let base_url = config.collector_base_url()?;
        let client = build_client(config.request_timeout, config.max_idle_connections)
            .map_err(|e| AgentError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(client, RequestBuilder::new(base_url)))
    }

    pub fn with_client(client: reqwest::Client, builder: RequestBuilder) -> Self {
        Self { client, builder }
    }

    /// Sends a single update request.
    pub async fn send(&self, request: &UpdateRequest) -> Result<(), TransmitError> {
        send_request(&self.client, request).await
    }
}

async fn send_request(
    client: &reqwest::Client,
    request: &UpdateRequest,
) -> Result<(), TransmitError> {
    let response = client
        .request(request.method(), request.url.clone())
        .header(CONTENT_TYPE, request.content_type())
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(TransmitError::Status(status))
    }
}

#[async_trait]
impl Reporter for Transmitter {
    async fn report(&self, snapshot: &Snapshot) -> ReportSummary {
        let requests = self.builder.build(snapshot);
        let mut summary = ReportSummary {
            dropped: snapshot.len() - requests.len(),
            ..ReportSummary::default()
        };

        let start = Instant::now();
        let mut in_flight = JoinSet::new();
        for (name, request) in requests {
            let client = self.client.clone();
            in_flight.spawn(async move {
                let result = send_request(&client, &request).await;
                (name, result)
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok((_, Ok(()))) => summary.sent += 1,
                Ok((name, Err(e))) => {
                    error!("Failed to send metric {name}: {e}");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Metric send task failed: {e}");
                    summary.failed += 1;
                }
            }
        }

        debug!(
            "Report finished in {} ms: {} sent, {} failed, {} dropped",
            start.elapsed().as_millis(),
            summary.sent,
            summary.failed,
            summary.dropped
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricValue;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn snapshot() -> Snapshot {
        vec![
            ("Alloc".to_string(), MetricValue::Gauge(2048.0)),
            ("RandomValue".to_string(), MetricValue::Gauge(3.5)),
            ("PollCount".to_string(), MetricValue::Counter(5)),
        ]
        .into_iter()
        .collect()
    }

    fn transmitter(url: String) -> Transmitter {
        let config = AgentConfig {
            collector_url: url,
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        Transmitter::new(&config).expect("failed to build transmitter")
    }

    #[tokio::test]
    async fn test_report_sends_one_request_per_metric() {
        let mut server = Server::new_async().await;
        let gauges = server
            .mock(
                "POST",
                Matcher::Regex(r"^/update/gauge/[A-Za-z]+/[0-9.]+$".to_string()),
            )
            .match_header("content-type", "text/plain")
            .match_body("")
            .with_status(200)
            .expect(2)
            .create_async()
            .await;
        let counter = server
            .mock("POST", "/update/counter/PollCount/5")
            .match_header("content-type", "text/plain")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let summary = transmitter(server.url()).report(&snapshot()).await;

        assert_eq!(
            summary,
            ReportSummary {
                sent: 3,
                failed: 0,
                dropped: 0
            }
        );
        gauges.assert_async().await;
        counter.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_a_failure() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("POST", Matcher::Regex(r"^/update/gauge/".to_string()))
            .with_status(200)
            .create_async()
            .await;
        let _failing = server
            .mock("POST", "/update/counter/PollCount/5")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let summary = transmitter(server.url()).report(&snapshot()).await;
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_send_reports_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/update/counter/PollCount/1")
            .with_status(404)
            .create_async()
            .await;

        let transmitter = transmitter(server.url());
        let request = RequestBuilder::new(reqwest::Url::parse(&server.url()).expect("valid url"))
            .build_one("PollCount", MetricValue::Counter(1))
            .expect("request");

        let result = transmitter.send(&request).await;
        assert!(matches!(
            result,
            Err(TransmitError::Status(StatusCode::NOT_FOUND))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_collector_does_not_panic() {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let summary = transmitter(format!("http://{addr}"))
            .report(&snapshot())
            .await;
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.failed, 3);
    }

    #[tokio::test]
    async fn test_unencodable_metrics_are_counted_as_dropped() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/update/gauge/Good/1")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let snapshot: Snapshot = vec![
            ("Good".to_string(), MetricValue::Gauge(1.0)),
            ("Bad".to_string(), MetricValue::Gauge(f64::INFINITY)),
        ]
        .into_iter()
        .collect();

        let summary = transmitter(server.url()).report(&snapshot).await;
        assert_eq!(
            summary,
            ReportSummary {
                sent: 1,
                failed: 0,
                dropped: 1
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_slow_collector_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        // accept connections but never answer
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let config = AgentConfig {
            collector_url: format!("http://{addr}"),
            request_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let transmitter = Transmitter::new(&config).expect("failed to build transmitter");

        let summary =
            tokio::time::timeout(Duration::from_secs(5), transmitter.report(&snapshot()))
                .await
                .expect("report should be bounded by the request timeout");
        assert_eq!(summary.failed, 3);
        server.abort();
    }
}
