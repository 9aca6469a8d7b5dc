//! Remote connection configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Service base URL, e.g. `https://dev.example.com/acme`.
    pub base_url: String,
    /// Project the repositories live under.
    pub project: String,
    /// Personal access token. Optional for anonymous read-only use.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: std::env::var("SLIPWAY_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            project: std::env::var("SLIPWAY_PROJECT").unwrap_or_else(|_| "default".to_string()),
            token: std::env::var("SLIPWAY_TOKEN").ok(),
        }
    }
}

impl RemoteConfig {
    /// Create a new config from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific service and project.
    pub fn new(base_url: &str, project: &str) -> Self {
        RemoteConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            token: None,
        }
    }

    /// Set the access token.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}
