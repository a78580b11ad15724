//! Configuration management for the NANDA bridge.
//!
//! Configuration can be set via environment variables:
//! - `UI_PORT` - Optional. Port for the UI/API server. Defaults to `5000`.
//! - `AGENT_PORT` - Optional. Port the agent bridge is advertised on. Defaults to `3000`.
//! - `HOST` - Optional. Server host. Defaults to `0.0.0.0`.
//! - `AGENT_ID` - Optional. Agent identifier. Defaults to `default_agent`.
//! - `AGENT_NAME` - Optional. Agent display name used as payment recipient. Defaults to `nanda-adapter`.
//! - `REGISTRY_URL` - Optional. Agent registry base URL. Registration is skipped when unset.
//! - `ANTHROPIC_API_KEY` - Optional. LLM paths fall back to canned responses when unset.
//! - `FACILITATOR_URL` - Optional. NANDA Points facilitator base URL. Defaults to `http://localhost:3001`.
//! - `SSL_CERT_PATH` / `SSL_KEY_PATH` - Optional pair. Serve HTTPS when both are set.
//! - `MESSAGE_LOG_CAPACITY` - Optional. Ring capacity of the in-memory message log. Defaults to `1000`.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::payments::PaymentConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Port the UI/API server listens on
    pub ui_port: u16,

    /// Port the agent bridge is reachable on (advertised to the registry)
    pub agent_port: u16,

    /// Agent identifier attached to message records
    pub agent_id: String,

    /// Agent display name, used as the default payment recipient
    pub agent_name: String,

    /// Agent registry base URL
    pub registry_url: Option<String>,

    /// Anthropic API key for the LLM paths
    pub anthropic_api_key: Option<String>,

    /// NANDA Points facilitator base URL
    pub facilitator_url: String,

    /// TLS certificate path (PEM)
    pub ssl_cert_path: Option<PathBuf>,

    /// TLS private key path (PEM)
    pub ssl_key_path: Option<PathBuf>,

    /// Ring capacity of the in-memory message log
    pub message_log_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            ui_port: parse_env("UI_PORT", 5000)?,
            agent_port: parse_env("AGENT_PORT", 3000)?,
            agent_id: std::env::var("AGENT_ID").unwrap_or_else(|_| "default_agent".to_string()),
            agent_name: std::env::var("AGENT_NAME")
                .unwrap_or_else(|_| "nanda-adapter".to_string()),
            registry_url: std::env::var("REGISTRY_URL").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            facilitator_url: std::env::var("FACILITATOR_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            ssl_cert_path: std::env::var("SSL_CERT_PATH").ok().map(PathBuf::from),
            ssl_key_path: std::env::var("SSL_KEY_PATH").ok().map(PathBuf::from),
            message_log_capacity: parse_env("MESSAGE_LOG_CAPACITY", 1000)?,
        })
    }

    /// URL the agent bridge is advertised on.
    pub fn agent_url(&self) -> String {
        format!("http://localhost:{}", self.agent_port)
    }

    /// Payment configuration derived from the facilitator URL and agent name.
    pub fn payment_config(&self) -> PaymentConfig {
        PaymentConfig::new(&self.facilitator_url, &self.agent_name)
    }

    /// TLS certificate/key pair, if both paths are configured.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.ssl_cert_path, &self.ssl_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
