//! Agent registry client.
//!
//! Registration is fired once at startup in a background task; failure is
//! logged and never fatal.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::Serialize;

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct Registration<'a> {
    name: &'a str,
    url: &'a str,
    capabilities: &'a [&'a str],
    status: &'a str,
}

/// Client for the external agent registry.
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(registry_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: registry_url.trim_end_matches('/').to_string(),
        }
    }

    /// Register this agent with the registry.
    pub async fn register(&self, name: &str, url: &str, capabilities: &[&str]) -> Result<()> {
        let registration = Registration {
            name,
            url,
            capabilities,
            status: "active",
        };
        let response = self
            .client
            .post(format!("{}/register", self.base_url))
            .json(&registration)
            .timeout(REGISTRY_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("registry registration failed: HTTP {}", response.status());
        }
        tracing::info!("Registered with registry: {}", self.base_url);
        Ok(())
    }
}
