// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use reqwest::Url;

use crate::error::AgentError;

pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_REPORT_INTERVAL_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 30;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the metrics agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the collector, e.g. `http://127.0.0.1:8080`
    pub collector_url: String,
    /// Time between sampling ticks
    pub poll_interval: Duration,
    /// Time between reporting ticks
    pub report_interval: Duration,
    /// Upper bound for a single update request
    pub request_timeout: Duration,
    /// Idle connections kept per collector host
    pub max_idle_connections: usize,
    /// Grace period for both loops to stop on shutdown
    pub shutdown_timeout: Duration,
    /// Send one last report after cancellation
    pub flush_on_shutdown: bool,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            report_interval: Duration::from_secs(DEFAULT_REPORT_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            flush_on_shutdown: false,
            log_level: "info".to_string(),
        }
    }
}

fn env_secs(key: &str, default: u64) -> Result<Duration, AgentError> {
    match env::var(key) {
        Ok(val) => val.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
            AgentError::InvalidConfig(format!(
                "{key} must be a whole number of seconds, got '{val}'"
            ))
        }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, AgentError> {
    match env::var(key) {
        Ok(val) => val.trim().parse::<usize>().map_err(|_| {
            AgentError::InvalidConfig(format!(
                "{key} must be a non-negative whole number, got '{val}'"
            ))
        }),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool, AgentError> {
    match env::var(key) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(AgentError::InvalidConfig(format!(
                "{key} must be one of true, false, 1, 0, got '{val}'"
            ))),
        },
        Err(_) => Ok(default),
    }
}

impl AgentConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, AgentError> {
        let collector_url = env::var("METRICS_COLLECTOR_URL")
            .unwrap_or_else(|_| DEFAULT_COLLECTOR_URL.to_string());
        let poll_interval = env_secs("METRICS_POLL_INTERVAL", DEFAULT_POLL_INTERVAL_SECS)?;
        let report_interval = env_secs("METRICS_REPORT_INTERVAL", DEFAULT_REPORT_INTERVAL_SECS)?;
        let request_timeout = env_secs("METRICS_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let shutdown_timeout =
            env_secs("METRICS_SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_TIMEOUT_SECS)?;
        let max_idle_connections =
            env_usize("METRICS_MAX_IDLE_CONNECTIONS", DEFAULT_MAX_IDLE_CONNECTIONS)?;
        let flush_on_shutdown = env_bool("METRICS_FLUSH_ON_SHUTDOWN", false)?;
        let log_level = env::var("METRICS_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        let config = Self {
            collector_url,
            poll_interval,
            report_interval,
            request_timeout,
            max_idle_connections,
            shutdown_timeout,
            flush_on_shutdown,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.poll_interval.is_zero() {
            return Err(AgentError::InvalidConfig(
                "poll interval must be greater than 0".to_string(),
            ));
        }

        if self.report_interval.is_zero() {
            return Err(AgentError::InvalidConfig(
                "report interval must be greater than 0".to_string(),
            ));
        }

        // several samples should accumulate between two reports
        if self.report_interval < self.poll_interval {
            return Err(AgentError::InvalidConfig(format!(
                "report interval ({:?}) must not be shorter than poll interval ({:?})",
                self.report_interval, self.poll_interval
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(AgentError::InvalidConfig(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        self.collector_base_url()?;

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(AgentError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Parses the collector URL, accepting only http and https.
    pub fn collector_base_url(&self) -> Result<Url, AgentError> {
        let url = Url::parse(self.collector_url.trim()).map_err(|e| {
            AgentError::InvalidConfig(format!(
                "Invalid collector URL '{}': {e}",
                self.collector_url
            ))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(AgentError::InvalidConfig(format!(
                "Unsupported collector URL scheme '{scheme}'"
            ))),
        }
    }
}
