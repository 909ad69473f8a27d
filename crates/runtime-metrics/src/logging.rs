// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use tracing_subscriber::EnvFilter;

/// Builds the filter used by both binaries. Noisy transport crates stay off.
pub fn build_env_filter(log_level: &str) -> Result<EnvFilter, Box<dyn Error + Send + Sync>> {
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);
    Ok(EnvFilter::try_new(env_filter)?)
}

/// Installs the global tracing subscriber at `log_level`.
pub fn init(log_level: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(build_env_filter(log_level)?)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_env_filter() {
        for level in crate::config::VALID_LOG_LEVELS {
            assert!(build_env_filter(level).is_ok(), "{level}");
        }
        assert!(build_env_filter("runtime_metrics=loud").is_err());
    }
}
