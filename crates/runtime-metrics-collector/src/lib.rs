// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Receiving side of the update protocol.
//!
//! Accepts `POST /update/{kind}/{name}/{value}`, logs every accepted update and
//! records the latest value per name in a [`MetricStore`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper::{http, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use runtime_metrics::metric::{MetricUpdate, ParseError, UPDATE_PATH_PREFIX};
use runtime_metrics::MetricStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_COLLECTOR_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("failed to bind collector address: {0}")]
    Bind(#[source] io::Error),

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// Decides the response for a request line and records accepted updates.
pub fn route(method: &Method, path: &str, store: &MetricStore) -> (StatusCode, String) {
    let is_update_path = path
        .trim_start_matches('/')
        .split('/')
        .next()
        .is_some_and(|first| first == UPDATE_PATH_PREFIX);
    if !is_update_path {
        return (StatusCode::NOT_FOUND, "not found".to_string());
    }
    if *method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            format!("method {method} not allowed"),
        );
    }

    match MetricUpdate::from_path(path) {
        Ok(update) => {
            info!("Received {} update {path}", update.kind());
            // agents send counter totals, so every update is a set
            store.set(&update.name, update.value);
            (StatusCode::OK, String::new())
        }
        Err(
            e @ (ParseError::MissingPrefix
            | ParseError::MissingName
            | ParseError::TrailingSegments),
        ) => {
            debug!("Rejected {path}: {e}");
            (StatusCode::NOT_FOUND, e.to_string())
        }
        Err(e) => {
            debug!("Rejected {path}: {e}");
            (StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn handle_update<B>(
    req: Request<B>,
    store: Arc<MetricStore>,
) -> http::Result<Response<Full<Bytes>>> {
    let (status, message) = route(req.method(), req.uri().path(), &store);
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(message)))
}

/// Serves the update endpoint on `listener` until `shutdown_token` is cancelled.
///
/// Open connections are dropped on shutdown.
pub async fn serve(
    listener: TcpListener,
    store: Arc<MetricStore>,
    shutdown_token: CancellationToken,
) -> Result<(), CollectorError> {
    let server = hyper::server::conn::http1::Builder::new();
    let mut joinset = tokio::task::JoinSet::new();

    loop {
        let conn = tokio::select! {
            biased;
            () = shutdown_token.cancelled() => {
                debug!("Collector shutting down, dropping {} connections", joinset.len());
                return Ok(());
            }
            con_res = listener.accept() => match con_res {
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!("Server error: {e}");
                    return Err(CollectorError::Accept(e));
                }
                Ok((conn, _)) => conn,
            },
            finished = async {
                match joinset.join_next().await {
                    Some(finished) => finished,
                    None => std::future::pending().await,
                }
            } => match finished {
                Err(e) if e.is_panic() => {
                    error!("Connection handler panicked: {:?}", e);
                    continue;
                }
                Ok(()) | Err(_) => continue,
            },
        };

        let conn = TokioIo::new(conn);
        let server = server.clone();
        let store = Arc::clone(&store);
        let service = service_fn(move |req| handle_update(req, Arc::clone(&store)));
        joinset.spawn(async move {
            if let Err(e) = server.serve_connection(conn, service).await {
                error!("Connection error: {e}");
            }
        });
    }
}

/// Binds `addr` and serves until `shutdown_token` is cancelled.
pub async fn bind_and_serve(
    addr: &str,
    store: Arc<MetricStore>,
    shutdown_token: CancellationToken,
) -> Result<(), CollectorError> {
    let listener = TcpListener::bind(addr).await.map_err(CollectorError::Bind)?;
    if let Ok(local) = listener.local_addr() {
        info!("Collector listening on {local}");
    }
    serve(listener, store, shutdown_token).await
}
