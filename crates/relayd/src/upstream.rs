//! Shared plumbing for the upstream HTTP adapters.

use anyhow::{Context, Result};
use relay_shared::UpstreamError;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Longest upstream error body kept in an error message
const MAX_ERROR_BODY: usize = 200;

/// Credential material for a Google-hosted service, read once at startup.
#[derive(Clone, Deserialize)]
pub struct ServiceCredentials {
    pub project_id: String,
    /// Pre-minted bearer token
    pub access_token: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Knowledge bases to query; only used by the knowledge-base adapter
    #[serde(default)]
    pub knowledge_base_names: Vec<String>,
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("project_id", &self.project_id)
            .field("access_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("knowledge_base_names", &self.knowledge_base_names)
            .finish()
    }
}

impl ServiceCredentials {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials {}", path.display()))?;
        let creds: ServiceCredentials = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials {}", path.display()))?;
        if creds.project_id.trim().is_empty() || creds.access_token.trim().is_empty() {
            anyhow::bail!("Credentials {} lack project_id or access_token", path.display());
        }
        Ok(creds)
    }

    /// Load credentials for `feature`; any failure disables the feature instead of aborting.
    pub fn load_optional(path: Option<&Path>, feature: &str) -> Option<Self> {
        let Some(path) = path else {
            warn!("No credentials configured, {} disabled", feature);
            return None;
        };
        match Self::load(path) {
            Ok(creds) => {
                info!("Loaded {} credentials for project {}", feature, creds.project_id);
                Some(creds)
            }
            Err(e) => {
                warn!("{} disabled: {:#}", feature, e);
                None
            }
        }
    }
}

/// Build a client whose every call fails locally after `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

pub fn map_reqwest_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::timeout(err.to_string())
    } else if err.is_decode() {
        UpstreamError::malformed(err.to_string())
    } else if let Some(status) = err.status() {
        UpstreamError::bad_status(status.as_u16(), err.to_string())
    } else {
        UpstreamError::unavailable(err.to_string())
    }
}

/// Read a non-2xx response into a `BadStatus` error, keeping a short body excerpt.
pub async fn status_error(response: reqwest::Response) -> UpstreamError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    UpstreamError::bad_status(status, excerpt(&body))
}

pub fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_credentials() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"project_id":"garden-app","access_token":"ya29.token","knowledge_base_names":["kb1"]}}"#
        )
        .unwrap();

        let creds = ServiceCredentials::load(file.path()).unwrap();
        assert_eq!(creds.project_id, "garden-app");
        assert_eq!(creds.knowledge_base_names, vec!["kb1".to_string()]);
        assert!(creds.endpoint.is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = ServiceCredentials {
            project_id: "p".to_string(),
            access_token: "ya29.secret".to_string(),
            endpoint: None,
            knowledge_base_names: vec![],
        };
        let out = format!("{:?}", creds);
        assert!(!out.contains("ya29.secret"));
        assert!(out.contains("<redacted>"));
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"project_id":"p","access_token":""}}"#).unwrap();
        assert!(ServiceCredentials::load(file.path()).is_err());
    }

    #[test]
    fn test_optional_load_disables_on_error() {
        assert!(ServiceCredentials::load_optional(None, "notifications").is_none());
        assert!(
            ServiceCredentials::load_optional(Some(Path::new("/nonexistent.json")), "notifications")
                .is_none()
        );
    }

    #[test]
    fn test_excerpt_truncates() {
        let body = "x".repeat(500);
        let out = excerpt(&body);
        assert_eq!(out.chars().count(), MAX_ERROR_BODY + 3);
        assert_eq!(excerpt("  short  "), "short");
    }
}
