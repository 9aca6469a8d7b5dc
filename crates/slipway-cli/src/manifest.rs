//! Batch manifest: which repositories to release and how to reach the
//! remote service.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use slipway_core::version::BumpKind;
use slipway_remote::RemoteConfig;

/// Top-level manifest file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub remote: RemoteSection,
    pub repositories: Vec<RepoEntry>,
}

/// Connection section. The token itself never lives in the file; the
/// manifest names the environment variable that holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    pub base_url: String,
    pub project: String,
    #[serde(default)]
    pub token_env: Option<String>,
}

/// One repository to release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub bump: BumpKind,
    #[serde(default = "default_source_branch")]
    pub source_branch: String,
    /// Keep the entry in the file but leave it out of the batch.
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_source_branch() -> String {
    "main".to_string()
}

fn default_selected() -> bool {
    true
}

impl BatchManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let manifest: BatchManifest = serde_json::from_str(&raw)
            .with_context(|| format!("parsing manifest {}", path.display()))?;
        Ok(manifest)
    }

    /// Connection config with the token pulled from the named env var.
    pub fn remote_config(&self) -> RemoteConfig {
        let mut config = RemoteConfig::new(&self.remote.base_url, &self.remote.project);
        if let Some(var) = &self.remote.token_env {
            if let Ok(token) = std::env::var(var) {
                config = config.with_token(&token);
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parses_with_defaults() {
        let manifest: BatchManifest = serde_json::from_str(
            r#"{
                "remote": { "base_url": "https://dev.example.com/acme", "project": "payments" },
                "repositories": [
                    { "name": "org/app", "bump": "minor" },
                    { "name": "org/lib", "bump": "major", "source_branch": "develop" },
                    { "name": "org/paused", "bump": "minor", "selected": false }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.repositories.len(), 3);
        assert_eq!(manifest.repositories[0].source_branch, "main");
        assert!(manifest.repositories[0].selected);
        assert_eq!(manifest.repositories[1].source_branch, "develop");
        assert_eq!(manifest.repositories[1].bump, BumpKind::Major);
        assert!(!manifest.repositories[2].selected);
        assert!(manifest.remote.token_env.is_none());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = BatchManifest::load(Path::new("/nonexistent/batch.json")).unwrap_err();
        assert!(err.to_string().contains("batch.json"));
    }
}
