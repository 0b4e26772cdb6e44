//! Configuration types for DIMSE services

use serde::{Deserialize, Serialize};
use std::time::Duration;

use dicom_dictionary_std::uids;

use crate::error::{DimseError, Result};

/// Longest AE title allowed by the standard
pub const MAX_AE_TITLE_LEN: usize = 16;

/// Configuration for the storage SCU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimseConfig {
    /// Local (calling) Application Entity Title
    pub local_aet: String,

    /// Maximum PDU size in bytes
    #[serde(default = "default_max_pdu")]
    pub max_pdu: u32,

    /// Connection timeout in milliseconds, `None` blocks until the OS gives up
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,

    /// Socket read timeout in milliseconds
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,

    /// Socket write timeout in milliseconds
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,

    /// The single presentation context proposed on every association
    #[serde(default)]
    pub presentation_context: PresentationContextSpec,
}

/// Abstract syntax plus the transfer syntaxes offered for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationContextSpec {
    /// Storage SOP class UID
    #[serde(default = "default_abstract_syntax")]
    pub abstract_syntax: String,

    /// Transfer syntaxes (in order of preference)
    #[serde(default = "default_transfer_syntaxes")]
    pub transfer_syntaxes: Vec<String>,
}

/// Configuration for a remote DICOM node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Remote (called) Application Entity Title
    pub ae_title: String,

    /// Remote host address
    pub host: String,

    /// Remote port
    pub port: u16,

    /// Connection timeout in milliseconds (overrides global setting)
    pub connect_timeout_ms: Option<u64>,

    /// Maximum PDU size for this node (overrides global setting)
    pub max_pdu: Option<u32>,
}

impl Default for DimseConfig {
    fn default() -> Self {
        Self {
            local_aet: "XFER_SCU".to_string(),
            max_pdu: default_max_pdu(),
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
            presentation_context: PresentationContextSpec::default(),
        }
    }
}

impl Default for PresentationContextSpec {
    fn default() -> Self {
        Self {
            abstract_syntax: default_abstract_syntax(),
            transfer_syntaxes: default_transfer_syntaxes(),
        }
    }
}

impl DimseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Get read timeout as Duration
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Get write timeout as Duration
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_ae_title("Local", &self.local_aet)?;

        if self.max_pdu < 4096 || self.max_pdu > 131_072 {
            return Err(DimseError::config(
                "Max PDU size must be between 4096 and 131072 bytes",
            ));
        }

        self.presentation_context.validate()
    }
}

impl PresentationContextSpec {
    /// Create a context for the given SOP class with the default transfer syntaxes
    pub fn new(abstract_syntax: impl Into<String>) -> Self {
        Self {
            abstract_syntax: abstract_syntax.into(),
            transfer_syntaxes: default_transfer_syntaxes(),
        }
    }

    /// Replace the offered transfer syntaxes
    pub fn with_transfer_syntaxes<I, S>(mut self, syntaxes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transfer_syntaxes = syntaxes.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.abstract_syntax.trim().is_empty() {
            return Err(DimseError::config("Abstract syntax UID cannot be empty"));
        }
        if self.transfer_syntaxes.is_empty()
            || self.transfer_syntaxes.iter().any(|ts| ts.trim().is_empty())
        {
            return Err(DimseError::config(
                "At least one non-empty transfer syntax UID is required",
            ));
        }
        Ok(())
    }
}

impl RemoteNode {
    /// Create a new remote node configuration
    pub fn new(ae_title: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            ae_title: ae_title.into(),
            host: host.into(),
            port,
            connect_timeout_ms: None,
            max_pdu: None,
        }
    }

    /// Validate the remote node configuration
    pub fn validate(&self) -> Result<()> {
        validate_ae_title("Remote", &self.ae_title)?;

        if self.host.trim().is_empty() {
            return Err(DimseError::config("Remote host cannot be empty"));
        }

        if self.port == 0 {
            return Err(DimseError::config("Remote port must be greater than 0"));
        }

        Ok(())
    }
}

impl std::fmt::Display for RemoteNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.ae_title, self.host, self.port)
    }
}

fn validate_ae_title(role: &str, aet: &str) -> Result<()> {
    let trimmed = aet.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_AE_TITLE_LEN {
        return Err(DimseError::InvalidAeTitle(format!(
            "{} AE title must be 1-{} characters, got {:?}",
            role, MAX_AE_TITLE_LEN, aet
        )));
    }
    if trimmed.contains('\\') || trimmed.chars().any(|c| c.is_control()) {
        return Err(DimseError::InvalidAeTitle(format!(
            "{} AE title contains forbidden characters: {:?}",
            role, aet
        )));
    }
    Ok(())
}

// Default value functions
fn default_max_pdu() -> u32 {
    16_384
}

fn default_abstract_syntax() -> String {
    uids::MR_IMAGE_STORAGE.to_string()
}

fn default_transfer_syntaxes() -> Vec<String> {
    vec![
        uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
        uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
        uids::EXPLICIT_VR_BIG_ENDIAN.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DimseConfig::default();
        assert_eq!(config.local_aet, "XFER_SCU");
        assert_eq!(config.presentation_context.abstract_syntax, uids::MR_IMAGE_STORAGE);
        assert_eq!(config.presentation_context.transfer_syntaxes.len(), 3);
        assert!(config.connect_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_node_builder() {
        let node = RemoteNode::new("GATEWAY", "localhost", 11112);

        assert_eq!(node.ae_title, "GATEWAY");
        assert_eq!(node.host, "localhost");
        assert_eq!(node.port, 11112);
        assert_eq!(node.connect_timeout_ms, None);
        assert_eq!(node.to_string(), "GATEWAY@localhost:11112");
    }

    #[test]
    fn test_config_validation() {
        let mut config = DimseConfig::default();

        config.local_aet = "".to_string();
        assert!(matches!(config.validate(), Err(DimseError::InvalidAeTitle(_))));

        config.local_aet = "A".repeat(17);
        assert!(config.validate().is_err());

        config.local_aet = "XFER".to_string();
        config.max_pdu = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_remote_node_validation() {
        assert!(RemoteNode::new("GATEWAY", "", 104).validate().is_err());
        assert!(RemoteNode::new("GATEWAY", "10.0.0.1", 0).validate().is_err());
        assert!(RemoteNode::new("", "10.0.0.1", 104).validate().is_err());
        assert!(RemoteNode::new("GATEWAY", "10.0.0.1", 104).validate().is_ok());
    }

    #[test]
    fn test_presentation_context_validation() {
        let ctx = PresentationContextSpec::new(uids::CT_IMAGE_STORAGE)
            .with_transfer_syntaxes(Vec::<String>::new());
        assert!(ctx.validate().is_err());

        let ctx = PresentationContextSpec::new("")
            .with_transfer_syntaxes([uids::EXPLICIT_VR_LITTLE_ENDIAN]);
        assert!(ctx.validate().is_err());
    }
}
