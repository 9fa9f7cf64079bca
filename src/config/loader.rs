//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{ProxyConfig, TlsConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid PORT value: {0}")]
    Port(String),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `REDIS_URL`, `PORT`, `TLS_KEY` and `TLS_CERT` overrides.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("REDIS_URL").filter(|v| !v.is_empty()) {
        config.cache.redis_url = Some(url);
    }

    if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
        let port: u16 = port.parse().map_err(|_| ConfigError::Port(port.clone()))?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    match (lookup("TLS_KEY"), lookup("TLS_CERT")) {
        (Some(key_path), Some(cert_path)) => {
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("TLS_KEY and TLS_CERT must both be set; ignoring TLS environment");
        }
        (None, None) => {}
    }

    Ok(())
}
