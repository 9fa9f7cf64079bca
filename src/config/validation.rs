//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (TTLs and capacities > 0)
//! - Detect conflicting route prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must start with '/' (got {value:?})")]
    RelativePath { field: &'static str, value: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },
    #[error("{field} is not a valid URL: {value}")]
    BadUrl { field: &'static str, value: String },
    #[error("{first} and {second} overlap")]
    OverlappingRoutes { first: &'static str, second: &'static str },
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let routes = &config.routes;

    for (field, value) in [
        ("routes.render_prefix", &routes.render_prefix),
        ("routes.proxy_prefix", &routes.proxy_prefix),
        ("routes.metrics_path", &routes.metrics_path),
    ] {
        if !value.starts_with('/') {
            errors.push(ValidationError::RelativePath { field, value: value.clone() });
        }
    }

    if routes.proxy_prefix.starts_with(&routes.render_prefix)
        || routes.render_prefix.starts_with(&routes.proxy_prefix)
    {
        errors.push(ValidationError::OverlappingRoutes {
            first: "routes.render_prefix",
            second: "routes.proxy_prefix",
        });
    }

    for (field, value) in [
        ("cache.local_capacity", config.cache.local_capacity as u64),
        ("cache.local_ttl_secs", config.cache.local_ttl_secs),
        ("cache.render_ttl_secs", config.cache.render_ttl_secs),
        ("cache.proxy_ttl_secs", config.cache.proxy_ttl_secs),
        ("render.timeout_secs", config.render.timeout_secs),
        ("fetch.timeout_secs", config.fetch.timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.listener.workers == Some(0) {
        errors.push(ValidationError::Zero { field: "listener.workers" });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if Url::parse(&config.render.endpoint).is_err() {
        errors.push(ValidationError::BadUrl {
            field: "render.endpoint",
            value: config.render.endpoint.clone(),
        });
    }

    if let Some(redis_url) = &config.cache.redis_url {
        if Url::parse(redis_url).is_err() {
            errors.push(ValidationError::BadUrl {
                field: "cache.redis_url",
                value: redis_url.clone(),
            });
        }
    }

    if config.tunnel.enabled {
        if !config.tunnel.path_prefix.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field: "tunnel.path_prefix",
                value: config.tunnel.path_prefix.clone(),
            });
        }
        if config.tunnel.upstream.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::BadAddress {
                field: "tunnel.upstream",
                value: config.tunnel.upstream.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.routes.render_prefix = "render".into();
        config.cache.local_capacity = 0;
        config.cache.render_ttl_secs = 0;
        config.render.endpoint = "not a url".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero { field: "cache.local_capacity" }));
        assert!(errors.contains(&ValidationError::Zero { field: "cache.render_ttl_secs" }));
    }

    #[test]
    fn overlapping_prefixes_rejected() {
        let mut config = ProxyConfig::default();
        config.routes.proxy_prefix = "/render/proxy/".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::OverlappingRoutes { .. }));
    }

    #[test]
    fn tunnel_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.tunnel.upstream = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.tunnel.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::BadAddress {
                field: "tunnel.upstream",
                value: "nowhere".into(),
            }]
        );
    }
}
