use serde::{Deserialize, Serialize};

use super::unit::TransferUnit;

/// How a unit with no decodable files is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyUnitPolicy {
    /// 0 sent of 0 read counts as a complete transfer
    #[default]
    Success,
    /// A unit must contain at least one instance to succeed
    Fail,
}

/// Result of pushing one unit to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub unit: TransferUnit,
    pub files_discovered: usize,
    pub files_sent: usize,
    /// Sum of frame counts over every discovered file, sent or not
    pub images: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl UnitOutcome {
    /// Classify a finished send loop
    pub fn classify(
        unit: TransferUnit,
        files_discovered: usize,
        files_sent: usize,
        images: u64,
        policy: EmptyUnitPolicy,
    ) -> Self {
        let error = if files_sent != files_discovered {
            Some(format!(
                "sent {} of {} files read",
                files_sent, files_discovered
            ))
        } else if files_discovered == 0 && policy == EmptyUnitPolicy::Fail {
            Some("no DICOM files found".to_string())
        } else {
            None
        };

        Self {
            unit,
            files_discovered,
            files_sent,
            images,
            success: error.is_none(),
            error,
        }
    }

    /// The unit never got an association, nothing was sent
    pub fn association_failed(unit: TransferUnit, reason: impl Into<String>) -> Self {
        Self {
            unit,
            files_discovered: 0,
            files_sent: 0,
            images: 0,
            success: false,
            error: Some(reason.into()),
        }
    }

    /// Mark an otherwise complete loop as cut short by a stop request
    pub fn interrupted(mut self) -> Self {
        self.success = false;
        self.error = Some(format!(
            "interrupted: sent {} of {} files read",
            self.files_sent, self.files_discovered
        ));
        self
    }

    /// Count reported back to the caller: all files on success, the partial
    /// sent count otherwise
    pub fn reported_count(&self) -> usize {
        if self.success {
            self.files_discovered
        } else {
            self.files_sent
        }
    }
}
