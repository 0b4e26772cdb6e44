use dicom_object::DefaultDicomObject;
use dimse::{DimseError, DimseStatus, NegotiatedContext, StoreAssociation};
use tracing::{debug, warn};

/// Owns the association for one unit and releases it on every exit path.
///
/// The explicit [`release`](Self::release) is the normal route; dropping the
/// guard while still holding the association (early return, panic) releases
/// it too, falling back to an abort if the release handshake fails.
pub struct AssociationGuard {
    inner: Option<Box<dyn StoreAssociation>>,
}

impl AssociationGuard {
    pub fn new(association: Box<dyn StoreAssociation>) -> Self {
        Self {
            inner: Some(association),
        }
    }

    pub fn negotiated_context(&self) -> Option<&NegotiatedContext> {
        self.inner.as_ref().and_then(|a| a.negotiated_context())
    }

    pub fn store(&mut self, dataset: &DefaultDicomObject) -> dimse::Result<DimseStatus> {
        self.inner
            .as_mut()
            .ok_or(DimseError::Released)?
            .store(dataset)
    }

    pub fn release(mut self) -> dimse::Result<()> {
        match self.inner.take() {
            Some(association) => release_or_abort(association),
            None => Ok(()),
        }
    }

    pub fn abort(mut self) {
        if let Some(mut association) = self.inner.take() {
            if let Err(e) = association.abort() {
                debug!("Abort failed: {}", e);
            }
        }
    }
}

impl Drop for AssociationGuard {
    fn drop(&mut self) {
        if let Some(association) = self.inner.take() {
            warn!("Association still open at end of scope, releasing");
            if let Err(e) = release_or_abort(association) {
                warn!("Release on drop failed: {}", e);
            }
        }
    }
}

fn release_or_abort(mut association: Box<dyn StoreAssociation>) -> dimse::Result<()> {
    match association.release() {
        Ok(()) => Ok(()),
        // the peer already tore the association down
        Err(DimseError::Released) => Ok(()),
        Err(e) => {
            if let Err(abort_err) = association.abort() {
                debug!("Abort after failed release also failed: {}", abort_err);
            }
            Err(e)
        }
    }
}
