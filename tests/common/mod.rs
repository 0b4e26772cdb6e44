#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::{DefaultDicomObject, InMemDicomObject};
use dimse::{
    DimseError, DimseStatus, NegotiatedContext, RemoteNode, StoreAssociation, StoreConnector,
};
use xfer::Config;

/// Write a minimal MR instance; UIDs are given even length by the callers
pub fn write_mr(path: &Path, instance_uid: &str, frames: Option<u32>) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
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
    if let Some(frames) = frames {
        obj.put(DataElement::new(
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            PrimitiveValue::from(format!("{:02}", frames)),
        ));
    }
    obj.with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
            .media_storage_sop_class_uid(uids::MR_IMAGE_STORAGE)
            .media_storage_sop_instance_uid(instance_uid),
    )
    .unwrap()
    .write_to_file(path)
    .unwrap();
}

/// Even-length instance UID for fixture number `n`
pub fn uid(n: u32) -> String {
    format!("2.25.{:05}", n)
}

/// A unit directory with `count` instances named img000.dcm, img001.dcm, ...
pub fn write_unit(dir: &Path, first_uid: u32, count: u32) {
    for i in 0..count {
        write_mr(
            &dir.join(format!("img{:03}.dcm", i)),
            &uid(first_uid + i),
            None,
        );
    }
}

/// Configuration pointing at a fake peer with registries under `registry_dir`
pub fn test_config(registry_dir: &Path) -> Config {
    let toml = format!(
        r#"
        [gateway]
        host = "127.0.0.1"
        port = 11112
        called_aet = "GATEWAY"
        calling_aet = "XFER_SCU"

        [registry]
        dir = "{}"

        [logging]
        log_to_file = false
    "#,
        registry_dir.display().to_string().replace('\\', "/")
    );
    Config::from_toml_str(&toml).expect("test config")
}

#[derive(Debug, Default)]
pub struct GatewayLog {
    pub connects: usize,
    pub releases: usize,
    pub aborts: usize,
    pub stored: Vec<String>,
}

/// In-process stand-in for the imaging gateway
pub struct FakeGateway {
    pub log: Rc<RefCell<GatewayLog>>,
    refused_attempts: HashSet<usize>,
    failing: HashSet<String>,
    rejecting: HashSet<String>,
    accept_context: bool,
    stop_after: Option<(usize, Arc<AtomicBool>)>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(GatewayLog::default())),
            refused_attempts: HashSet::new(),
            failing: HashSet::new(),
            rejecting: HashSet::new(),
            accept_context: true,
            stop_after: None,
        }
    }

    /// Refuse the n-th association request (1-based)
    pub fn refusing_attempt(mut self, attempt: usize) -> Self {
        self.refused_attempts.insert(attempt);
        self
    }

    /// Transport error while sending this instance
    pub fn failing(mut self, instance_uid: &str) -> Self {
        self.failing.insert(instance_uid.to_string());
        self
    }

    /// Failure status for this instance
    pub fn rejecting(mut self, instance_uid: &str) -> Self {
        self.rejecting.insert(instance_uid.to_string());
        self
    }

    /// Raise `stop` once `stored` instances have been accepted, as Ctrl-C would
    pub fn stopping_after(mut self, stored: usize, stop: Arc<AtomicBool>) -> Self {
        self.stop_after = Some((stored, stop));
        self
    }

    pub fn aborts(&self) -> usize {
        self.log.borrow().aborts
    }

    pub fn without_context(mut self) -> Self {
        self.accept_context = false;
        self
    }

    pub fn connects(&self) -> usize {
        self.log.borrow().connects
    }

    pub fn releases(&self) -> usize {
        self.log.borrow().releases
    }

    pub fn stored(&self) -> Vec<String> {
        self.log.borrow().stored.clone()
    }
}

impl StoreConnector for FakeGateway {
    fn connect(&self, node: &RemoteNode) -> dimse::Result<Box<dyn StoreAssociation>> {
        let attempt = {
            let mut log = self.log.borrow_mut();
            log.connects += 1;
            log.connects
        };
        if self.refused_attempts.contains(&attempt) {
            return Err(DimseError::ul(format!("{} rejected the association", node)));
        }

        let context = self.accept_context.then(|| NegotiatedContext {
            id: 1,
            abstract_syntax: uids::MR_IMAGE_STORAGE.to_string(),
            transfer_syntax: uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
        });
        Ok(Box::new(FakeAssociation {
            log: self.log.clone(),
            context,
            failing: self.failing.clone(),
            rejecting: self.rejecting.clone(),
            stop_after: self.stop_after.clone(),
        }))
    }
}

struct FakeAssociation {
    log: Rc<RefCell<GatewayLog>>,
    context: Option<NegotiatedContext>,
    failing: HashSet<String>,
    rejecting: HashSet<String>,
    stop_after: Option<(usize, Arc<AtomicBool>)>,
}

impl StoreAssociation for FakeAssociation {
    fn negotiated_context(&self) -> Option<&NegotiatedContext> {
        self.context.as_ref()
    }

    fn store(&mut self, instance: &DefaultDicomObject) -> dimse::Result<DimseStatus> {
        let uid = instance
            .meta()
            .media_storage_sop_instance_uid()
            .trim_end_matches('\0')
            .to_string();
        if self.failing.contains(&uid) {
            return Err(DimseError::ul("connection reset by peer"));
        }
        if self.rejecting.contains(&uid) {
            return Ok(DimseStatus::Failure(0xA700));
        }
        let stored = {
            let mut log = self.log.borrow_mut();
            log.stored.push(uid);
            log.stored.len()
        };
        if let Some((limit, stop)) = &self.stop_after {
            if stored == *limit {
                stop.store(true, Ordering::SeqCst);
            }
        }
        Ok(DimseStatus::Success)
    }

    fn release(&mut self) -> dimse::Result<()> {
        self.log.borrow_mut().releases += 1;
        Ok(())
    }

    fn abort(&mut self) -> dimse::Result<()> {
        self.log.borrow_mut().aborts += 1;
        Ok(())
    }
}
