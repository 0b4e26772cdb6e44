//! DIMSE command set encoding for the storage service
//!
//! Command sets always travel in Implicit VR Little Endian regardless of the
//! transfer syntax negotiated for the data set (PS3.7 section 6.3.1).

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::entries::IMPLICIT_VR_LITTLE_ENDIAN;

use crate::types::{DimseCommand, DimseStatus};
use crate::{DimseError, Result};

/// Command Data Set Type value meaning "a data set follows"
const DATA_SET_PRESENT: u16 = 0x0000;

/// Command Data Set Type value meaning "no data set"
const NO_DATA_SET: u16 = 0x0101;

/// Priority MEDIUM
const PRIORITY_MEDIUM: u16 = 0x0000;

/// Identifiers of the instance carried by one C-STORE request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub message_id: u16,
    pub sop_class_uid: String,
    pub sop_instance_uid: String,
}

/// Decoded C-STORE response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    pub message_id_responded: u16,
    pub status: DimseStatus,
    pub error_comment: Option<String>,
}

impl StoreRequest {
    /// Build the C-STORE-RQ command set
    pub fn to_command(&self) -> InMemDicomObject {
        InMemDicomObject::command_from_element_iter([
            DataElement::new(
                tags::AFFECTED_SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(even_uid(&self.sop_class_uid)),
            ),
            DataElement::new(
                tags::COMMAND_FIELD,
                VR::US,
                PrimitiveValue::from(DimseCommand::StoreRq.command_field()),
            ),
            DataElement::new(tags::MESSAGE_ID, VR::US, PrimitiveValue::from(self.message_id)),
            DataElement::new(tags::PRIORITY, VR::US, PrimitiveValue::from(PRIORITY_MEDIUM)),
            DataElement::new(
                tags::COMMAND_DATA_SET_TYPE,
                VR::US,
                PrimitiveValue::from(DATA_SET_PRESENT),
            ),
            DataElement::new(
                tags::AFFECTED_SOP_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from(even_uid(&self.sop_instance_uid)),
            ),
        ])
    }

    /// Encode the command set, ready to be sent as a command P-DATA fragment
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_command(&self.to_command())
    }
}

impl StoreResponse {
    /// Build a C-STORE-RSP command set, used by acceptors and tests
    pub fn to_command(&self, sop_class_uid: &str, sop_instance_uid: &str) -> InMemDicomObject {
        let mut elements = vec![
            DataElement::new(
                tags::AFFECTED_SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(even_uid(sop_class_uid)),
            ),
            DataElement::new(
                tags::COMMAND_FIELD,
                VR::US,
                PrimitiveValue::from(DimseCommand::StoreRsp.command_field()),
            ),
            DataElement::new(
                tags::MESSAGE_ID_BEING_RESPONDED_TO,
                VR::US,
                PrimitiveValue::from(self.message_id_responded),
            ),
            DataElement::new(
                tags::COMMAND_DATA_SET_TYPE,
                VR::US,
                PrimitiveValue::from(NO_DATA_SET),
            ),
            DataElement::new(tags::STATUS, VR::US, PrimitiveValue::from(self.status.code())),
            DataElement::new(
                tags::AFFECTED_SOP_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from(even_uid(sop_instance_uid)),
            ),
        ];
        if let Some(comment) = &self.error_comment {
            elements.push(DataElement::new(
                tags::ERROR_COMMENT,
                VR::LO,
                PrimitiveValue::from(comment.as_str()),
            ));
        }
        InMemDicomObject::command_from_element_iter(elements)
    }

    /// Interpret a received command set as a C-STORE response
    pub fn from_command(cmd: &InMemDicomObject) -> Result<Self> {
        let field = read_u16(cmd, tags::COMMAND_FIELD)?;
        if DimseCommand::from_command_field(field) != Some(DimseCommand::StoreRsp) {
            return Err(DimseError::operation_failed(format!(
                "expected C-STORE-RSP, got command field 0x{:04X}",
                field
            )));
        }

        let message_id_responded = read_u16(cmd, tags::MESSAGE_ID_BEING_RESPONDED_TO)?;
        let status = DimseStatus::from_code(read_u16(cmd, tags::STATUS)?);
        let error_comment = cmd
            .element(tags::ERROR_COMMENT)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            message_id_responded,
            status,
            error_comment,
        })
    }
}

/// Encode a command set in Implicit VR Little Endian
pub fn encode_command(cmd: &InMemDicomObject) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    cmd.write_dataset_with_ts(&mut data, &IMPLICIT_VR_LITTLE_ENDIAN.erased())
        .map_err(|e| DimseError::DicomObject(format!("failed to encode command: {}", e)))?;
    Ok(data)
}

/// Decode a command set received in a command P-DATA fragment
pub fn decode_command(data: &[u8]) -> Result<InMemDicomObject> {
    InMemDicomObject::read_dataset_with_ts(data, &IMPLICIT_VR_LITTLE_ENDIAN.erased())
        .map_err(|e| DimseError::DicomParsing(format!("failed to decode command: {}", e)))
}

fn read_u16(cmd: &InMemDicomObject, tag: dicom_core::Tag) -> Result<u16> {
    cmd.element(tag)
        .map_err(|_| DimseError::DicomParsing(format!("command is missing {}", tag)))?
        .to_int::<u16>()
        .map_err(|e| DimseError::DicomParsing(format!("invalid value for {}: {}", tag, e)))
}

/// UI values are padded with a trailing NUL to an even length
fn even_uid(uid: &str) -> String {
    let uid = uid.trim_end_matches('\0').trim();
    let mut out = uid.to_string();
    if out.len() % 2 == 1 {
        out.push('\0');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_dictionary_std::uids;

    fn request() -> StoreRequest {
        StoreRequest {
            message_id: 7,
            sop_class_uid: uids::MR_IMAGE_STORAGE.to_string(),
            sop_instance_uid: "1.2.826.0.1.3680043.2.1125.1".to_string(),
        }
    }

    #[test]
    fn test_store_rq_fields() {
        let bytes = request().encode().unwrap();
        let cmd = decode_command(&bytes).unwrap();

        assert_eq!(read_u16(&cmd, tags::COMMAND_FIELD).unwrap(), 0x0001);
        assert_eq!(read_u16(&cmd, tags::MESSAGE_ID).unwrap(), 7);
        assert_eq!(read_u16(&cmd, tags::COMMAND_DATA_SET_TYPE).unwrap(), DATA_SET_PRESENT);
        let class = cmd.element(tags::AFFECTED_SOP_CLASS_UID).unwrap().to_str().unwrap();
        assert_eq!(class.trim_end_matches('\0'), uids::MR_IMAGE_STORAGE);
        let instance = cmd
            .element(tags::AFFECTED_SOP_INSTANCE_UID)
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(instance.trim_end_matches('\0'), "1.2.826.0.1.3680043.2.1125.1");
    }

    #[test]
    fn test_store_rq_has_group_length() {
        let cmd = request().to_command();
        assert!(cmd.element(tags::COMMAND_GROUP_LENGTH).is_ok());
    }

    #[test]
    fn test_store_rsp_parsing() {
        let rsp = StoreResponse {
            message_id_responded: 7,
            status: DimseStatus::Failure(0xA700),
            error_comment: Some("disk full".to_string()),
        };
        let bytes = encode_command(&rsp.to_command(uids::MR_IMAGE_STORAGE, "1.2.3")).unwrap();
        let parsed = StoreResponse::from_command(&decode_command(&bytes).unwrap()).unwrap();
        assert_eq!(parsed, rsp);
    }

    #[test]
    fn test_request_is_not_a_response() {
        let err = StoreResponse::from_command(&request().to_command()).unwrap_err();
        assert!(matches!(err, DimseError::OperationFailed(_)));
    }

    #[test]
    fn test_even_uid_padding() {
        assert_eq!(even_uid("1.2.3"), "1.2.3\0");
        assert_eq!(even_uid("1.23"), "1.23");
        assert_eq!(even_uid("1.2.3\0"), "1.2.3\0");
    }
}
