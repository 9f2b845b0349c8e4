//! Toolkit configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use pftoolkit_backend::playfab::client::default_endpoint;
use pftoolkit_common::{Error, Result, TitleId};

/// Which backend the registry builds gateways over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// PlayFab REST API.
    #[default]
    PlayFab,
    /// In-process memory backend (offline runs, tests).
    Memory,
}

/// Startup configuration.
///
/// The title id is the only required value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolkitConfig {
    /// PlayFab title id.
    pub title_id: String,
    /// Override for the API endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Backend selection.
    #[serde(default)]
    pub backend: BackendKind,
}

impl ToolkitConfig {
    /// Configuration for `title_id` against the default PlayFab endpoint.
    pub fn new(title_id: impl Into<String>) -> Self {
        Self {
            title_id: title_id.into(),
            endpoint: None,
            backend: BackendKind::default(),
        }
    }

    /// Set a custom endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Select the backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// The title id, checked for emptiness.
    pub fn title_id(&self) -> Result<TitleId> {
        TitleId::new(self.title_id.clone())
    }

    /// Endpoint requests are sent to.
    pub fn endpoint_url(&self) -> Result<String> {
        match &self.endpoint {
            Some(endpoint) => Ok(endpoint.trim_end_matches('/').to_string()),
            None => Ok(default_endpoint(&self.title_id()?)),
        }
    }

    /// Check the configuration.
    ///
    /// Returns non-fatal warnings; fatal problems are errors.
    ///
    /// # Errors
    /// - Empty title id
    /// - Endpoint that is not a URL
    pub fn validate(&self) -> Result<Vec<String>> {
        let title_id = self
            .title_id()
            .map_err(|_| Error::Config("Title ID is not configured!".to_string()))?;

        let mut warnings = Vec::new();
        if title_id.as_str().len() < 4 {
            warnings.push("Title ID seems too short. Please verify it's correct.".to_string());
        }

        if let Some(endpoint) = &self.endpoint {
            let url = Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
            if url.scheme() != "https" {
                warnings.push(format!("Endpoint {} does not use HTTPS", endpoint));
            }
        }

        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_from_title() {
        let config = ToolkitConfig::new("ABCD1");
        assert_eq!(config.endpoint_url().unwrap(), "https://ABCD1.playfabapi.com");
        assert_eq!(config.backend, BackendKind::PlayFab);
    }

    #[test]
    fn test_custom_endpoint() {
        let config = ToolkitConfig::new("ABCD1").with_endpoint("http://localhost:8080/");
        assert_eq!(config.endpoint_url().unwrap(), "http://localhost:8080");
    }

    #[test]
    fn test_validate() {
        assert!(ToolkitConfig::new("ABCD1").validate().unwrap().is_empty());
        assert_eq!(ToolkitConfig::new("T1").validate().unwrap().len(), 1);
        assert!(matches!(ToolkitConfig::new("").validate(), Err(Error::Config(_))));

        let insecure = ToolkitConfig::new("ABCD1").with_endpoint("http://localhost:8080");
        assert_eq!(insecure.validate().unwrap().len(), 1);

        let broken = ToolkitConfig::new("ABCD1").with_endpoint("::nope::");
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let config = ToolkitConfig::from_json(r#"{"title_id": "ABCD1", "backend": "memory"}"#).unwrap();
        assert_eq!(config.title_id, "ABCD1");
        assert_eq!(config.backend, BackendKind::Memory);
        assert!(config.endpoint.is_none());

        assert!(ToolkitConfig::from_json(r#"{"backend": "memory"}"#).is_err());
    }
}
