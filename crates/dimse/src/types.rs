//! Common types for DIMSE operations

/// DIMSE command types understood by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseCommand {
    /// C-STORE request
    StoreRq,
    /// C-STORE response
    StoreRsp,
}

impl DimseCommand {
    /// Value of the Command Field (0000,0100)
    pub fn command_field(self) -> u16 {
        match self {
            DimseCommand::StoreRq => 0x0001,
            DimseCommand::StoreRsp => 0x8001,
        }
    }

    pub fn from_command_field(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(DimseCommand::StoreRq),
            0x8001 => Some(DimseCommand::StoreRsp),
            _ => None,
        }
    }
}

/// A presentation context the remote node accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedContext {
    /// Presentation context ID (odd number, 1-255)
    pub id: u8,
    /// Abstract syntax (SOP class) UID proposed for this context
    pub abstract_syntax: String,
    /// Transfer syntax UID selected by the acceptor
    pub transfer_syntax: String,
}

/// DIMSE operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseStatus {
    /// Operation completed successfully
    Success,
    /// Operation is pending (more responses to follow)
    Pending(u16),
    /// Operation cancelled
    Cancel,
    /// Operation failed with error
    Failure(u16), // DICOM status code
    /// Warning occurred during operation
    Warning(u16), // DICOM status code
}

impl DimseStatus {
    /// Classify a raw Status (0000,0900) value per PS3.7 Annex C
    pub fn from_code(code: u16) -> Self {
        match code {
            0x0000 => DimseStatus::Success,
            0xFE00 => DimseStatus::Cancel,
            0xFF00 | 0xFF01 => DimseStatus::Pending(code),
            0x0001 | 0x0107 | 0x0116 => DimseStatus::Warning(code),
            c if (0xB000..=0xBFFF).contains(&c) => DimseStatus::Warning(c),
            c => DimseStatus::Failure(c),
        }
    }

    pub fn code(&self) -> u16 {
        match *self {
            DimseStatus::Success => 0x0000,
            DimseStatus::Cancel => 0xFE00,
            DimseStatus::Pending(c) | DimseStatus::Failure(c) | DimseStatus::Warning(c) => c,
        }
    }

    /// Whether the peer accepted the object (success or warning)
    pub fn is_stored(&self) -> bool {
        matches!(self, DimseStatus::Success | DimseStatus::Warning(_))
    }
}

impl std::fmt::Display for DimseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DimseStatus::Success => "Success",
            DimseStatus::Pending(_) => "Pending",
            DimseStatus::Cancel => "Cancel",
            DimseStatus::Failure(_) => "Failure",
            DimseStatus::Warning(_) => "Warning",
        };
        write!(f, "{} (0x{:04X})", label, self.code())
    }
}
