//! C-STORE over a real TCP association against an in-process acceptor.

use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_encoding::TransferSyntaxIndex;
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::{DefaultDicomObject, InMemDicomObject};
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use dicom_ul::association::server::ServerAssociationOptions;
use dicom_ul::pdu::{PDataValue, PDataValueType, Pdu};
use dimse::command::{decode_command, encode_command, StoreResponse};
use dimse::{DimseConfig, DimseScu, DimseStatus, RemoteNode, StoreAssociation};

/// Accepts one association, answers every C-STORE-RQ with `status` and
/// returns the SOP instance UIDs it decoded from the data sets.
fn spawn_acceptor(status: DimseStatus) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut association = ServerAssociationOptions::new()
            .accept_any()
            .ae_title("GATEWAY")
            .with_abstract_syntax(uids::MR_IMAGE_STORAGE)
            .establish(stream)
            .unwrap();
        let ts_uid = association.presentation_contexts()[0]
            .transfer_syntax
            .trim_end_matches('\0')
            .to_string();
        let ts = TransferSyntaxRegistry.get(&ts_uid).unwrap();

        let mut received = Vec::new();
        let mut command_buf = Vec::new();
        let mut data_buf = Vec::new();
        let mut request: Option<InMemDicomObject> = None;

        loop {
            match association.receive().unwrap() {
                Pdu::PData { data } => {
                    for value in data {
                        match value.value_type {
                            PDataValueType::Command => {
                                command_buf.extend_from_slice(&value.data);
                                if value.is_last {
                                    request = Some(decode_command(&command_buf).unwrap());
                                    command_buf.clear();
                                }
                            }
                            PDataValueType::Data => {
                                data_buf.extend_from_slice(&value.data);
                                if !value.is_last {
                                    continue;
                                }
                                let cmd = request.take().expect("data set without command");
                                let dataset =
                                    InMemDicomObject::read_dataset_with_ts(&data_buf[..], ts)
                                        .unwrap();
                                data_buf.clear();

                                let sop_class = dataset
                                    .element(tags::SOP_CLASS_UID)
                                    .unwrap()
                                    .to_str()
                                    .unwrap()
                                    .trim_end_matches('\0')
                                    .to_string();
                                let sop_instance = dataset
                                    .element(tags::SOP_INSTANCE_UID)
                                    .unwrap()
                                    .to_str()
                                    .unwrap()
                                    .trim_end_matches('\0')
                                    .to_string();
                                let message_id = cmd
                                    .element(tags::MESSAGE_ID)
                                    .unwrap()
                                    .to_int::<u16>()
                                    .unwrap();

                                let response = StoreResponse {
                                    message_id_responded: message_id,
                                    status,
                                    error_comment: None,
                                };
                                let bytes = encode_command(
                                    &response.to_command(&sop_class, &sop_instance),
                                )
                                .unwrap();
                                association
                                    .send(&Pdu::PData {
                                        data: vec![PDataValue {
                                            presentation_context_id: value
                                                .presentation_context_id,
                                            value_type: PDataValueType::Command,
                                            is_last: true,
                                            data: bytes,
                                        }],
                                    })
                                    .unwrap();
                                received.push(sop_instance);
                            }
                        }
                    }
                }
                Pdu::ReleaseRQ => {
                    association.send(&Pdu::ReleaseRP).unwrap();
                    break;
                }
                Pdu::AbortRQ { .. } => break,
                other => panic!("unexpected PDU: {:?}", other),
            }
        }
        received
    });

    (port, handle)
}

fn mr_instance(instance_uid: &str) -> DefaultDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(
        tags::SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(uids::MR_IMAGE_STORAGE),
    ));
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(instance_uid),
    ));
    obj.put(DataElement::new(
        tags::PATIENT_NAME,
        VR::PN,
        PrimitiveValue::from("Doe^John"),
    ));
    obj.with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
            .media_storage_sop_class_uid(uids::MR_IMAGE_STORAGE)
            .media_storage_sop_instance_uid(instance_uid),
    )
    .unwrap()
}

fn scu() -> DimseScu {
    DimseScu::new(DimseConfig {
        local_aet: "XFER_SCU".to_string(),
        read_timeout_ms: Some(5_000),
        write_timeout_ms: Some(5_000),
        ..DimseConfig::default()
    })
}

#[test]
fn stores_instances_and_releases() {
    let (port, acceptor) = spawn_acceptor(DimseStatus::Success);
    let node = RemoteNode::new("GATEWAY", "127.0.0.1", port);

    let mut association = scu().associate(&node).unwrap();
    let ctx = association.negotiated_context().cloned().unwrap();
    assert_eq!(ctx.abstract_syntax, uids::MR_IMAGE_STORAGE);

    for uid in ["2.25.1001", "2.25.1002"] {
        let status = association.store(&mr_instance(uid)).unwrap();
        assert_eq!(status, DimseStatus::Success);
    }
    association.release().unwrap();

    let received = acceptor.join().unwrap();
    assert_eq!(received, vec!["2.25.1001", "2.25.1002"]);
}

#[test]
fn failure_status_is_reported_not_raised() {
    let (port, acceptor) = spawn_acceptor(DimseStatus::Failure(0xA700));
    let node = RemoteNode::new("GATEWAY", "127.0.0.1", port);

    let mut association = scu().associate(&node).unwrap();
    let status = association.store(&mr_instance("2.25.2001")).unwrap();
    assert_eq!(status, DimseStatus::Failure(0xA700));
    assert!(!status.is_stored());
    association.release().unwrap();

    acceptor.join().unwrap();
}

#[test]
fn store_after_release_is_refused() {
    let (port, acceptor) = spawn_acceptor(DimseStatus::Success);
    let node = RemoteNode::new("GATEWAY", "127.0.0.1", port);

    let mut association = scu().associate(&node).unwrap();
    association.release().unwrap();
    assert!(association.store(&mr_instance("2.25.3001")).is_err());

    assert!(acceptor.join().unwrap().is_empty());
}

#[test]
fn data_set_larger_than_one_pdu_arrives_whole() {
    let (port, acceptor) = spawn_acceptor(DimseStatus::Success);
    let node = RemoteNode::new("GATEWAY", "127.0.0.1", port);

    let mut instance = mr_instance("2.25.4001");
    // several times the default max PDU, so the data set spans many fragments
    instance.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        PrimitiveValue::from(vec![0x5Au8; 70_000]),
    ));

    let mut association = scu().associate(&node).unwrap();
    assert_eq!(association.store(&instance).unwrap(), DimseStatus::Success);
    association.release().unwrap();

    assert_eq!(acceptor.join().unwrap(), vec!["2.25.4001"]);
}
