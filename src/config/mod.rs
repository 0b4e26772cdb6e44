mod gateway_config;
mod logging_config;
mod registry_config;
mod transfer_config;
pub mod config;

pub use config::{Config, ConfigError};
pub use gateway_config::GatewayConfig;
pub use logging_config::LoggingConfig;
pub use registry_config::RegistryConfig;
pub use transfer_config::TransferConfig;
