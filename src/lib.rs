pub mod config;
pub mod driver;
pub mod instance;
pub mod logging;
pub mod models;
pub mod planner;
pub mod registry;
pub mod session;

pub use config::{Config, ConfigError};
pub use driver::{BatchRunner, DriverError, Mode, RunSummary};
pub use models::{EmptyUnitPolicy, TransferUnit, UnitOutcome};
pub use registry::RegistryStore;
