//! Service Class User (SCU) implementation for outbound C-STORE operations

use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use dicom_encoding::TransferSyntaxIndex;
use dicom_object::DefaultDicomObject;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use dicom_ul::association::client::{ClientAssociation, ClientAssociationOptions};
use dicom_ul::pdu::{PDataValue, PDataValueType, Pdu, PresentationContextResultReason};
use tracing::{debug, info, warn};

use crate::command::{decode_command, StoreRequest, StoreResponse};
use crate::config::{DimseConfig, RemoteNode};
use crate::types::{DimseStatus, NegotiatedContext};
use crate::{DimseError, Result};

/// Opens storage associations with a remote node
pub trait StoreConnector {
    /// Connect to `node` and run association negotiation
    fn connect(&self, node: &RemoteNode) -> Result<Box<dyn StoreAssociation>>;
}

/// An established association able to carry C-STORE requests
pub trait StoreAssociation {
    /// The storage context accepted by the peer, if any
    fn negotiated_context(&self) -> Option<&NegotiatedContext>;

    /// Send one instance and wait for its C-STORE response
    fn store(&mut self, instance: &DefaultDicomObject) -> Result<DimseStatus>;

    /// Gracefully release the association
    fn release(&mut self) -> Result<()>;

    /// Abort the association without negotiation
    fn abort(&mut self) -> Result<()>;
}

/// DIMSE Service Class User
#[derive(Debug, Clone)]
pub struct DimseScu {
    config: DimseConfig,
}

impl DimseScu {
    /// Create a new SCU with the given configuration
    pub fn new(config: DimseConfig) -> Self {
        Self { config }
    }

    /// Open an association with the remote node over `dicom-ul`
    pub fn associate(&self, node: &RemoteNode) -> Result<UlStoreAssociation> {
        node.validate()?;
        let context = &self.config.presentation_context;

        info!(
            "Requesting association {} -> {} (abstract syntax {})",
            self.config.local_aet, node, context.abstract_syntax
        );

        let mut options = ClientAssociationOptions::new()
            .calling_ae_title(self.config.local_aet.clone())
            .called_ae_title(node.ae_title.clone())
            .max_pdu_length(self.get_max_pdu(node))
            .with_presentation_context(
                context.abstract_syntax.clone(),
                context.transfer_syntaxes.clone(),
            );

        if let Some(timeout) = self.get_connection_timeout(node) {
            options = options.connection_timeout(timeout);
        }
        if let Some(timeout) = self.config.read_timeout() {
            options = options.read_timeout(timeout);
        }
        if let Some(timeout) = self.config.write_timeout() {
            options = options.write_timeout(timeout);
        }

        let association = options
            .establish((node.host.as_str(), node.port))
            .map_err(DimseError::ul)?;

        let negotiated = association
            .presentation_contexts()
            .iter()
            .find(|pc| pc.reason == PresentationContextResultReason::Acceptance)
            .map(|pc| NegotiatedContext {
                id: pc.id,
                abstract_syntax: context.abstract_syntax.clone(),
                transfer_syntax: pc.transfer_syntax.trim_end_matches('\0').trim().to_string(),
            });

        match &negotiated {
            Some(ctx) => debug!(
                "Presentation context {} accepted with transfer syntax {}",
                ctx.id, ctx.transfer_syntax
            ),
            None => warn!("{} accepted none of the proposed presentation contexts", node),
        }

        Ok(UlStoreAssociation {
            inner: Some(association),
            context: negotiated,
            next_message_id: 1,
            peer: node.to_string(),
        })
    }

    /// Get connection timeout for a node (uses node-specific or global setting)
    fn get_connection_timeout(&self, node: &RemoteNode) -> Option<Duration> {
        node.connect_timeout_ms
            .map(Duration::from_millis)
            .or_else(|| self.config.connect_timeout())
    }

    /// Get maximum PDU size for a node (uses node-specific or global setting)
    fn get_max_pdu(&self, node: &RemoteNode) -> u32 {
        node.max_pdu.unwrap_or(self.config.max_pdu)
    }
}

impl StoreConnector for DimseScu {
    fn connect(&self, node: &RemoteNode) -> Result<Box<dyn StoreAssociation>> {
        Ok(Box::new(self.associate(node)?))
    }
}

/// Storage association backed by a `dicom-ul` client association
pub struct UlStoreAssociation {
    inner: Option<ClientAssociation<TcpStream>>,
    context: Option<NegotiatedContext>,
    next_message_id: u16,
    peer: String,
}

impl UlStoreAssociation {
    fn take_message_id(&mut self) -> u16 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1).max(1);
        id
    }

    /// Encode the data set in the negotiated transfer syntax
    fn encode_dataset(&self, ctx: &NegotiatedContext, instance: &DefaultDicomObject) -> Result<Vec<u8>> {
        let target = TransferSyntaxRegistry.get(&ctx.transfer_syntax).ok_or_else(|| {
            DimseError::operation_failed(format!(
                "negotiated transfer syntax {} is not supported",
                ctx.transfer_syntax
            ))
        })?;

        let source_uid = instance.meta().transfer_syntax().trim_end_matches('\0');
        if source_uid != target.uid() {
            let convertible = TransferSyntaxRegistry
                .get(source_uid)
                .map(|ts| ts.is_codec_free())
                .unwrap_or(false);
            if !convertible {
                return Err(DimseError::operation_failed(format!(
                    "cannot convert instance from {} to negotiated {}",
                    source_uid, ctx.transfer_syntax
                )));
            }
        }

        let mut data = Vec::new();
        instance
            .write_dataset_with_ts(&mut data, target)
            .map_err(|e| DimseError::DicomObject(format!("failed to encode data set: {}", e)))?;
        Ok(data)
    }

    /// Read P-DATA until a complete command set has arrived
    fn receive_command(&mut self) -> Result<Vec<u8>> {
        let mut command = Vec::new();
        loop {
            let association = self.inner.as_mut().ok_or(DimseError::Released)?;
            match association.receive().map_err(DimseError::ul)? {
                Pdu::PData { data } => {
                    for value in data {
                        if value.value_type != PDataValueType::Command {
                            continue;
                        }
                        command.extend_from_slice(&value.data);
                        if value.is_last {
                            return Ok(command);
                        }
                    }
                }
                Pdu::AbortRQ { source } => {
                    // the peer tore the association down, nothing left to release
                    self.inner = None;
                    return Err(DimseError::DicomUl(format!(
                        "association aborted by {:?}",
                        source
                    )));
                }
                other => {
                    return Err(DimseError::operation_failed(format!(
                        "unexpected PDU while waiting for C-STORE-RSP: {:?}",
                        other
                    )));
                }
            }
        }
    }
}

impl StoreAssociation for UlStoreAssociation {
    fn negotiated_context(&self) -> Option<&NegotiatedContext> {
        self.context.as_ref()
    }

    fn store(&mut self, instance: &DefaultDicomObject) -> Result<DimseStatus> {
        let ctx = self
            .context
            .clone()
            .ok_or_else(|| DimseError::NoPresentationContext(self.peer.clone()))?;

        let sop_class_uid = instance
            .meta()
            .media_storage_sop_class_uid()
            .trim_end_matches('\0')
            .to_string();
        if sop_class_uid != ctx.abstract_syntax {
            return Err(DimseError::NoPresentationContext(sop_class_uid));
        }

        let request = StoreRequest {
            message_id: self.take_message_id(),
            sop_class_uid,
            sop_instance_uid: instance
                .meta()
                .media_storage_sop_instance_uid()
                .trim_end_matches('\0')
                .to_string(),
        };
        let dataset = self.encode_dataset(&ctx, instance)?;
        let command = request.encode()?;

        debug!(
            "C-STORE-RQ id={} instance={} ({} bytes)",
            request.message_id,
            request.sop_instance_uid,
            dataset.len()
        );

        let association = self.inner.as_mut().ok_or(DimseError::Released)?;
        association
            .send(&Pdu::PData {
                data: vec![PDataValue {
                    presentation_context_id: ctx.id,
                    value_type: PDataValueType::Command,
                    is_last: true,
                    data: command,
                }],
            })
            .map_err(DimseError::ul)?;
        let mut writer = association.send_pdata(ctx.id);
        writer.write_all(&dataset)?;
        // the last fragment goes out here; a drop would swallow its error
        writer.finish().map_err(DimseError::ul)?;

        let response = StoreResponse::from_command(&decode_command(&self.receive_command()?)?)?;
        if response.message_id_responded != request.message_id {
            warn!(
                "C-STORE-RSP answers message {} but {} was sent",
                response.message_id_responded, request.message_id
            );
        }
        if let Some(comment) = &response.error_comment {
            debug!("C-STORE-RSP error comment: {}", comment);
        }
        Ok(response.status)
    }

    fn release(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(association) => {
                debug!("Releasing association with {}", self.peer);
                association.release().map_err(DimseError::ul)
            }
            None => Err(DimseError::Released),
        }
    }

    fn abort(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(association) => {
                warn!("Aborting association with {}", self.peer);
                association.abort().map_err(DimseError::ul)
            }
            None => Ok(()),
        }
    }
}
