//! Agent-level configuration for the out-of-band engine
//!
//! Per-call options (`CreateInvitationConfig`, `ReceiveInvitationConfig`) live
//! in the engine module; this is the long-lived agent configuration that
//! supplies their defaults.

use crate::error::{OutOfBandError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use ::url::Url;

/// Default base URL for invitation links.
pub const DEFAULT_INVITATION_DOMAIN: &str = "https://didcomm.org/oob";

/// Agent configuration consumed by the out-of-band engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutOfBandConfig {
    /// Label presented to peers in created invitations
    pub label: String,
    /// Optional image URL presented to peers
    pub image_url: Option<String>,
    /// Whether received invitations are accepted immediately
    pub auto_accept_connections: bool,
    /// Base URL used when encoding invitations as links
    pub invitation_domain: String,
    /// Message profiles advertised in created invitations
    pub accept: Vec<String>,
    /// Capacity of the lifecycle event broadcast channel
    pub event_capacity: usize,
}

impl Default for OutOfBandConfig {
    fn default() -> Self {
        Self {
            label: "didlink agent".to_string(),
            image_url: None,
            auto_accept_connections: true,
            invitation_domain: DEFAULT_INVITATION_DOMAIN.to_string(),
            accept: vec![
                "didcomm/aip1".to_string(),
                "didcomm/aip2;env=rfc19".to_string(),
            ],
            event_capacity: 64,
        }
    }
}

impl OutOfBandConfig {
    /// Load configuration from a `.toml` or `.json` file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OutOfBandError::configuration(format!("Failed to read config file: {e}"))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| OutOfBandError::configuration(format!("Invalid JSON: {e}"))),
            _ => Err(OutOfBandError::configuration("Unsupported file format")),
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| OutOfBandError::configuration(format!("Invalid TOML: {e}")))
    }

    /// Override fields from `DIDLINK_*` environment variables
    pub fn merge_with_env(&mut self) -> Result<()> {
        if let Ok(label) = std::env::var("DIDLINK_LABEL") {
            self.label = label;
        }
        if let Ok(image_url) = std::env::var("DIDLINK_IMAGE_URL") {
            self.image_url = Some(image_url);
        }
        if let Ok(domain) = std::env::var("DIDLINK_INVITATION_DOMAIN") {
            self.invitation_domain = domain;
        }
        if let Ok(auto_accept) = std::env::var("DIDLINK_AUTO_ACCEPT_CONNECTIONS") {
            self.auto_accept_connections = auto_accept.parse().map_err(|_| {
                OutOfBandError::configuration(
                    "Invalid boolean in DIDLINK_AUTO_ACCEPT_CONNECTIONS",
                )
            })?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(OutOfBandError::configuration("Label cannot be empty"));
        }
        if self.event_capacity == 0 {
            return Err(OutOfBandError::configuration(
                "Event capacity cannot be 0",
            ));
        }
        Url::parse(&self.invitation_domain).map_err(|e| {
            OutOfBandError::configuration(format!(
                "Invalid invitation domain '{}': {e}",
                self.invitation_domain
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = OutOfBandConfig::default();
        assert!(config.auto_accept_connections);
        assert_eq!(config.event_capacity, 64);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = OutOfBandConfig::from_toml_str(
            r#"
            label = "Faber College"
            auto_accept_connections = false
            "#,
        )
        .unwrap();
        assert_eq!(config.label, "Faber College");
        assert!(!config.auto_accept_connections);
        assert_eq!(config.invitation_domain, DEFAULT_INVITATION_DOMAIN);
        assert_eq!(config.accept.len(), 2);
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"label": "Alice", "event_capacity": 8}}"#).unwrap();

        let config = OutOfBandConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.label, "Alice");
        assert_eq!(config.event_capacity, 8);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            OutOfBandConfig::load_from_file(file.path()),
            Err(OutOfBandError::Configuration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = OutOfBandConfig {
            invitation_domain: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.invitation_domain = DEFAULT_INVITATION_DOMAIN.to_string();
        config.event_capacity = 0;
        assert!(config.validate().is_err());

        config.event_capacity = 1;
        config.label = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
