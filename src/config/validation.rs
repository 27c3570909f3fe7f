//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (fallback chain references existing servers)
//! - Validate value ranges (intervals, timeouts, capacities > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::RouterConfig;
use crate::selection::HOSTED_FALLBACK_ID;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate server id '{0}'")]
    DuplicateServerId(String),

    #[error("server at index {0} has an empty id")]
    EmptyServerId(usize),

    #[error("server '{0}' has an empty model")]
    EmptyModel(String),

    #[error("'{field}' is not a valid http(s) URL: {value}")]
    InvalidUrl { field: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("fallback chain references unknown server '{0}'")]
    UnknownFallbackServer(String),

    #[error("fallback chain contains 'hosted-fallback' but no hosted endpoint is configured")]
    MissingHostedEndpoint,
}

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for (index, server) in config.servers.iter().enumerate() {
        if server.id.trim().is_empty() {
            errors.push(ValidationError::EmptyServerId(index));
            continue;
        }
        if !seen.insert(server.id.as_str()) {
            errors.push(ValidationError::DuplicateServerId(server.id.clone()));
        }
        if server.model.trim().is_empty() {
            errors.push(ValidationError::EmptyModel(server.id.clone()));
        }
        check_url(&mut errors, &format!("servers.{}.base_url", server.id), &server.base_url);
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::Zero("health_check.interval_secs"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::Zero("health_check.timeout_secs"));
    }
    if config.streaming.channel_capacity == 0 {
        errors.push(ValidationError::Zero("streaming.channel_capacity"));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::Zero("retries.max_attempts"));
    }

    for id in &config.fallback.chain {
        if id == HOSTED_FALLBACK_ID {
            if config.fallback.hosted.is_none() {
                errors.push(ValidationError::MissingHostedEndpoint);
            }
        } else if !config.servers.is_empty() && !seen.contains(id.as_str()) {
            // With no configured servers the registry comes from persistence,
            // so chain ids cannot be checked here.
            errors.push(ValidationError::UnknownFallbackServer(id.clone()));
        }
    }

    if let Some(hosted) = &config.fallback.hosted {
        check_url(&mut errors, "fallback.hosted.base_url", &hosted.base_url);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    let valid = Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
    if !valid {
        errors.push(ValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::HostedFallbackConfig;
    use crate::registry::ServerConfig;

    fn config_with(servers: Vec<ServerConfig>) -> RouterConfig {
        RouterConfig {
            servers,
            ..RouterConfig::default()
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&RouterConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = config_with(vec![
            ServerConfig::new("a", "http://a.local/v1", "m"),
            ServerConfig::new("a", "ftp://a.local", ""),
            ServerConfig::new("", "http://x", "m"),
        ]);
        config.health_check.interval_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateServerId("a".into())));
        assert!(errors.contains(&ValidationError::EmptyModel("a".into())));
        assert!(errors.contains(&ValidationError::EmptyServerId(2)));
        assert!(errors.contains(&ValidationError::Zero("health_check.interval_secs")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidUrl { .. })));
    }

    #[test]
    fn test_fallback_chain_references() {
        let mut config = config_with(vec![ServerConfig::new("a", "http://a.local/v1", "m")]);
        config.fallback.chain = vec!["a".into(), "ghost".into(), HOSTED_FALLBACK_ID.into()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::UnknownFallbackServer("ghost".into()),
                ValidationError::MissingHostedEndpoint,
            ]
        );

        config.fallback.chain = vec!["a".into(), HOSTED_FALLBACK_ID.into()];
        config.fallback.hosted = Some(HostedFallbackConfig {
            name: "Hosted".into(),
            base_url: "https://api.example.com/v1".into(),
            model: "large".into(),
            api_key: None,
        });
        assert!(validate_config(&config).is_ok());
    }
}
