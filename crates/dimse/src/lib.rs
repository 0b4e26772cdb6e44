//! DIMSE (DICOM Message Service Element) storage client
//!
//! This crate provides the Service Class User side of the DICOM Storage
//! service: it opens an association with a remote node, negotiates a single
//! storage presentation context and issues C-STORE requests over it.
//!
//! # Features
//! - Association establishment and release over `dicom-ul`
//! - C-STORE request encoding and response status decoding
//! - Connector/association traits so callers can swap the network for a fake

pub mod command;
pub mod config;
pub mod error;
pub mod scu;
pub mod types;

// Re-export commonly used types
pub use config::{DimseConfig, PresentationContextSpec, RemoteNode};
pub use error::{DimseError, Result};
pub use scu::{DimseScu, StoreAssociation, StoreConnector, UlStoreAssociation};
pub use types::{DimseCommand, DimseStatus, NegotiatedContext};

