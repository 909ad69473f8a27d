// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Metric kinds, values and the `/update/{kind}/{name}/{value}` path codec.
//!
//! The same codec is used by the agent when it builds outbound requests and by
//! the collector when it parses inbound ones, so both ends always agree on the
//! wire shape.

use std::fmt;
use std::str::FromStr;

/// First path segment of every update request.
pub const UPDATE_PATH_PREFIX: &str = "update";

/// Kind of a metric. Fixed per name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(ParseError::UnknownKind(other.to_string())),
        }
    }
}

/// A metric value tagged with its kind.
///
/// Keeping the kind in the value means a name can never be a gauge and a
/// counter at the same time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Counter(i64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }

    /// Formats the value as a path segment.
    ///
    /// Gauges use the shortest decimal representation that parses back to the
    /// same `f64`; counters use plain decimal integers. Non-finite gauges have
    /// no decimal representation and yield `None`.
    pub fn format(&self) -> Option<String> {
        match self {
            MetricValue::Gauge(v) if v.is_finite() => Some(v.to_string()),
            MetricValue::Gauge(_) => None,
            MetricValue::Counter(v) => Some(v.to_string()),
        }
    }

    /// Parses a path segment as a value of the given kind.
    pub fn parse(kind: MetricKind, raw: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidValue {
            kind,
            value: raw.to_string(),
        };
        match kind {
            MetricKind::Gauge => {
                let v = raw.parse::<f64>().map_err(|_| invalid())?;
                if !v.is_finite() {
                    return Err(invalid());
                }
                Ok(MetricValue::Gauge(v))
            }
            MetricKind::Counter => raw
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|_| invalid()),
        }
    }
}

/// Errors produced while decoding an update path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("path does not start with /update/")]
    MissingPrefix,

    #[error("metric name is missing")]
    MissingName,

    #[error("unknown metric kind '{0}'")]
    UnknownKind(String),

    #[error("invalid {kind} value '{value}'")]
    InvalidValue { kind: MetricKind, value: String },

    #[error("invalid metric name '{0}'")]
    InvalidName(String),

    #[error("unexpected trailing path segments")]
    TrailingSegments,
}

/// Returns true if `name` can be used verbatim as a path segment.
///
/// Only ASCII alphanumerics, `_`, `.` and `-` are accepted so names never need
/// percent-encoding.
pub fn is_valid_metric_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// One (name, value) pair as it travels on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricUpdate {
    pub name: String,
    pub value: MetricValue,
}

impl MetricUpdate {
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    /// Encodes the update as `/update/{kind}/{name}/{value}`.
    pub fn to_path(&self) -> Result<String, ParseError> {
        if !is_valid_metric_name(&self.name) {
            return Err(ParseError::InvalidName(self.name.clone()));
        }
        let value = self.value.format().ok_or_else(|| ParseError::InvalidValue {
            kind: self.kind(),
            value: format!("{:?}", self.value),
        })?;
        Ok(format!(
            "/{UPDATE_PATH_PREFIX}/{}/{}/{}",
            self.kind(),
            self.name,
            value
        ))
    }

    /// Decodes a request path of the form `/update/{kind}/{name}/{value}`.
    ///
    /// The kind is checked before the name so `/update/histogram/` reports an
    /// unknown kind rather than a missing name.
    pub fn from_path(path: &str) -> Result<Self, ParseError> {
        let mut segments = path.trim_start_matches('/').split('/');
        if segments.next() != Some(UPDATE_PATH_PREFIX) {
            return Err(ParseError::MissingPrefix);
        }

        let kind: MetricKind = match segments.next() {
            Some(kind) if !kind.is_empty() => kind.parse()?,
            _ => return Err(ParseError::UnknownKind(String::new())),
        };

        let name = match segments.next() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ParseError::MissingName),
        };
        if !is_valid_metric_name(name) {
            return Err(ParseError::InvalidName(name.to_string()));
        }

        let raw_value = segments.next().unwrap_or_default();
        let value = MetricValue::parse(kind, raw_value)?;

        match segments.next() {
            None => {}
            // tolerate a single trailing slash
            Some("") if segments.next().is_none() => {}
            Some(_) => return Err(ParseError::TrailingSegments),
        }

        Ok(Self::new(name, value))
    }
}
