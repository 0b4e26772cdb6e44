use dimse::{DimseConfig, PresentationContextSpec, RemoteNode};
use serde::Deserialize;

use crate::config::ConfigError;

/// The remote imaging gateway and how to reach it
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub called_aet: String,
    #[serde(default)]
    pub calling_aet: String,
    #[serde(default = "default_max_pdu")]
    pub max_pdu: u32,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            called_aet: String::new(),
            calling_aet: String::new(),
            max_pdu: default_max_pdu(),
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
        }
    }
}

impl GatewayConfig {
    /// All four connection settings must be present before any network activity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingGatewaySetting("host"));
        }
        if self.port == 0 {
            return Err(ConfigError::MissingGatewaySetting("port"));
        }
        if self.called_aet.trim().is_empty() {
            return Err(ConfigError::MissingGatewaySetting("called_aet"));
        }
        if self.calling_aet.trim().is_empty() {
            return Err(ConfigError::MissingGatewaySetting("calling_aet"));
        }
        self.remote_node().validate()?;
        Ok(())
    }

    pub fn remote_node(&self) -> RemoteNode {
        RemoteNode::new(self.called_aet.trim(), self.host.trim(), self.port)
    }

    pub fn dimse_config(&self, context: PresentationContextSpec) -> DimseConfig {
        DimseConfig {
            local_aet: self.calling_aet.trim().to_string(),
            max_pdu: self.max_pdu,
            connect_timeout_ms: self.connect_timeout_ms,
            read_timeout_ms: self.read_timeout_ms,
            write_timeout_ms: self.write_timeout_ms,
            presentation_context: context,
        }
    }
}

fn default_max_pdu() -> u32 {
    16_384
}
