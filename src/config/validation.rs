//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Header names in `sticky`/`strip` must be valid HTTP header names
//! - Sticky headers must not clobber the connection tag
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ConfigIssue>>

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::BridgeConfig;
use crate::manager::CONNECTION_HEADER;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("listener.socket_path '{0}' must start with '/'")]
    SocketPath(String),

    #[error("bridge.{list} contains invalid header name '{name}'")]
    HeaderName { list: &'static str, name: String },

    #[error("bridge.sticky may not include '{0}'")]
    ReservedHeader(String),

    #[error("pipeline.max_body_bytes must be greater than zero")]
    BodyLimit,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Check a deserialized configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        issues.push(ConfigIssue::BindAddress(config.listener.bind_address.clone()));
    }
    if !config.listener.socket_path.starts_with('/') {
        issues.push(ConfigIssue::SocketPath(config.listener.socket_path.clone()));
    }

    for (list, names) in [("sticky", &config.bridge.sticky), ("strip", &config.bridge.strip)] {
        for name in names {
            let lowered = name.trim().to_ascii_lowercase();
            if HeaderName::from_bytes(lowered.as_bytes()).is_err() {
                issues.push(ConfigIssue::HeaderName {
                    list,
                    name: name.clone(),
                });
            } else if list == "sticky" && lowered == CONNECTION_HEADER {
                issues.push(ConfigIssue::ReservedHeader(name.clone()));
            }
        }
    }

    if config.pipeline.max_body_bytes == 0 {
        issues.push(ConfigIssue::BodyLimit);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ConfigIssue::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&BridgeConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_issue() {
        let mut config = BridgeConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.listener.socket_path = "socket".into();
        config.bridge.sticky = vec!["bad header".into(), "X-Bridge-Connection".into()];
        config.bridge.strip = vec!["".into()];
        config.pipeline.max_body_bytes = 0;

        let issues = validate_config(&config).unwrap_err();
        assert_eq!(issues.len(), 6);
        assert!(issues.contains(&ConfigIssue::ReservedHeader("X-Bridge-Connection".into())));
        assert!(issues.contains(&ConfigIssue::BodyLimit));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = BridgeConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ConfigIssue::MetricsAddress("bogus".into())])
        );
    }
}
