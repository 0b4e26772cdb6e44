use dicom_dictionary_std::uids;
use dimse::PresentationContextSpec;
use serde::Deserialize;

use crate::models::EmptyUnitPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct TransferConfig {
    /// Storage SOP class offered in the single presentation context
    #[serde(default = "default_sop_class")]
    pub sop_class_uid: String,
    #[serde(default = "default_transfer_syntaxes")]
    pub transfer_syntaxes: Vec<String>,
    /// Sort unit and file listings lexicographically
    #[serde(default = "default_true")]
    pub sort_entries: bool,
    #[serde(default)]
    pub empty_unit_policy: EmptyUnitPolicy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            sop_class_uid: default_sop_class(),
            transfer_syntaxes: default_transfer_syntaxes(),
            sort_entries: true,
            empty_unit_policy: EmptyUnitPolicy::default(),
        }
    }
}

impl TransferConfig {
    pub fn presentation_context(&self) -> PresentationContextSpec {
        PresentationContextSpec::new(self.sop_class_uid.trim())
            .with_transfer_syntaxes(self.transfer_syntaxes.iter().map(|ts| ts.trim()))
    }
}

fn default_sop_class() -> String {
    uids::MR_IMAGE_STORAGE.to_string()
}

fn default_transfer_syntaxes() -> Vec<String> {
    vec![
        uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
        uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
        uids::EXPLICIT_VR_BIG_ENDIAN.to_string(),
    ]
}

fn default_true() -> bool {
    true
}
