// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns a store snapshot into one update request per metric.

use std::collections::HashMap;

use reqwest::{Method, Url};
use tracing::warn;

use crate::metric::{MetricKind, MetricUpdate, MetricValue};
use crate::store::Snapshot;

pub const CONTENT_TYPE_TEXT_PLAIN: &str = "text/plain";

/// A fully resolved update request for a single metric.
///
/// The request has no body; everything travels in the path.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub update: MetricUpdate,
    pub url: Url,
}

impl UpdateRequest {
    pub fn method(&self) -> Method {
        Method::POST
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE_TEXT_PLAIN
    }

    pub fn kind(&self) -> MetricKind {
        self.update.kind()
    }

    pub fn name(&self) -> &str {
        &self.update.name
    }
}

/// Builds update requests against a collector base URL.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: Url,
}

impl RequestBuilder {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds a request for a single metric.
    ///
    /// Returns `None` when the name or value cannot be encoded in a path.
    pub fn build_one(&self, name: &str, value: MetricValue) -> Option<UpdateRequest> {
        let update = MetricUpdate::new(name, value);
        let path = match update.to_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("Dropping metric {name}: {e}");
                return None;
            }
        };

        // join() would drop the last segment of a base path without a
        // trailing slash, so the path is appended instead
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);

        Some(UpdateRequest { update, url })
    }

    /// Builds one request per snapshot entry, keyed by metric name.
    ///
    /// Entries that cannot be encoded are dropped with a warning; the rest are
    /// still built.
    pub fn build(&self, snapshot: &Snapshot) -> HashMap<String, UpdateRequest> {
        snapshot
            .iter()
            .filter_map(|(name, value)| {
                self.build_one(name, *value)
                    .map(|request| (name.clone(), request))
            })
            .collect()
    }
}
