//! The per-unit transfer session: connect, negotiate, send every instance in
//! the unit directory, release, and record the outcome.

mod guard;
mod state;

pub use guard::AssociationGuard;
pub use state::SessionState;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dimse::{DimseError, DimseStatus, RemoteNode, StoreConnector};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};
use walkdir::WalkDir;

use crate::config::TransferConfig;
use crate::instance::read_instance;
use crate::models::{EmptyUnitPolicy, TransferUnit, UnitOutcome};
use crate::registry::{RegistryError, RegistryStore};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("refusing to start a session: {0}")]
    Config(#[source] DimseError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// What happened to a single instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Peer stored the instance (success or warning status)
    Sent(DimseStatus),
    /// Peer answered with a failure or cancel status
    Rejected(DimseStatus),
    /// Nothing usable came back: encoding, transport or protocol error
    Failed(String),
}

impl SendOutcome {
    pub fn from_store_result(result: dimse::Result<DimseStatus>) -> Self {
        match result {
            Ok(status) if status.is_stored() => SendOutcome::Sent(status),
            Ok(status) => SendOutcome::Rejected(status),
            Err(e) => SendOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub sort_entries: bool,
    pub empty_unit_policy: EmptyUnitPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            sort_entries: true,
            empty_unit_policy: EmptyUnitPolicy::Success,
        }
    }
}

impl From<&TransferConfig> for SessionOptions {
    fn from(config: &TransferConfig) -> Self {
        Self {
            sort_entries: config.sort_entries,
            empty_unit_policy: config.empty_unit_policy,
        }
    }
}

/// Everything sessions share across a run
pub struct SessionContext<'a> {
    connector: &'a dyn StoreConnector,
    node: RemoteNode,
    registry: &'a RegistryStore,
    options: SessionOptions,
    stop: Arc<AtomicBool>,
}

impl<'a> SessionContext<'a> {
    /// Fails fast on an incomplete peer definition, before any network activity
    pub fn new(
        connector: &'a dyn StoreConnector,
        node: RemoteNode,
        registry: &'a RegistryStore,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        node.validate().map_err(SessionError::Config)?;
        Ok(Self {
            connector,
            node,
            registry,
            options,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share a stop flag; once set, the current unit stops sending and releases
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn session(&self, unit: TransferUnit) -> TransferSession<'_> {
        TransferSession {
            ctx: self,
            unit,
            state: SessionState::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct SendTally {
    discovered: usize,
    sent: usize,
    images: u64,
    interrupted: bool,
}

/// One unit's trip through the association state machine
pub struct TransferSession<'a> {
    ctx: &'a SessionContext<'a>,
    unit: TransferUnit,
    state: SessionState,
}

impl<'a> TransferSession<'a> {
    /// Run the unit to completion and write exactly one outcome record.
    ///
    /// Association and per-file problems end up in the returned outcome;
    /// only bookkeeping failures are returned as errors.
    pub fn run(mut self) -> Result<UnitOutcome, SessionError> {
        let span = info_span!("unit", unit = %self.unit);
        let _entered = span.enter();

        self.transition(SessionState::Connecting);
        let association = match self.ctx.connector.connect(&self.ctx.node) {
            Ok(association) => association,
            Err(e) => {
                let reason = format!("could not connect to {}: {}", self.ctx.node, e);
                return self.association_failed(reason);
            }
        };
        let mut guard = AssociationGuard::new(association);

        self.transition(SessionState::Negotiating);
        if guard.negotiated_context().is_none() {
            guard.abort();
            let reason = format!("{} accepted no presentation context", self.ctx.node);
            return self.association_failed(reason);
        }
        self.transition(SessionState::Associated);
        info!("Association established with {}", self.ctx.node);

        self.transition(SessionState::Sending);
        info!("Sending DICOM files from {}", self.unit);
        let tally = self.send_all(&mut guard);

        self.transition(SessionState::Releasing);
        if let Err(e) = guard.release() {
            warn!("Association release failed: {}", e);
        }
        self.transition(SessionState::Closed);

        self.record(tally)
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        debug!("{} -> {}", self.state, next);
        self.state = next;
    }

    fn send_all(&self, guard: &mut AssociationGuard) -> SendTally {
        let mut tally = SendTally::default();

        for path in self.unit_files() {
            if self.ctx.stop_requested() {
                warn!("Stop requested, leaving {} early", self.unit);
                tally.interrupted = true;
                break;
            }

            let record = match read_instance(&path) {
                Ok(record) => record,
                Err(e) => {
                    debug!("Skipping: {}", e);
                    continue;
                }
            };
            tally.discovered += 1;
            tally.images += u64::from(record.frames);
            debug!(
                "{}: {} {} in {}, {} frame(s)",
                record.file_name(),
                record.sop_class_uid(),
                record.sop_instance_uid(),
                record.transfer_syntax(),
                record.frames
            );

            match SendOutcome::from_store_result(guard.store(&record.dataset)) {
                SendOutcome::Sent(status) => {
                    tally.sent += 1;
                    info!("Sent: {}, Status: {}", record.file_name(), status);
                }
                SendOutcome::Rejected(status) => {
                    warn!("Failed to send: {}, Status: {}", record.file_name(), status);
                }
                SendOutcome::Failed(reason) => {
                    warn!("Error sending {}: {}", record.file_name(), reason);
                }
            }
        }

        tally
    }

    /// Regular files below the unit directory, recursively
    fn unit_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        let walker = WalkDir::new(self.unit.path()).min_depth(1);
        let walker = if self.ctx.options.sort_entries {
            walker.sort_by_file_name()
        } else {
            walker
        };

        walker.into_iter().filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(entry.into_path()),
            Ok(_) => None,
            Err(e) => {
                warn!("Cannot read entry under {}: {}", self.unit, e);
                None
            }
        })
    }

    fn record(&self, tally: SendTally) -> Result<UnitOutcome, SessionError> {
        let mut outcome = UnitOutcome::classify(
            self.unit.clone(),
            tally.discovered,
            tally.sent,
            tally.images,
            self.ctx.options.empty_unit_policy,
        );
        if tally.interrupted {
            outcome = outcome.interrupted();
        }

        match &outcome.error {
            None => {
                info!(
                    "Successfully sent {} of {} files in {}.",
                    outcome.files_sent, outcome.files_discovered, self.unit
                );
                info!("  Found {} images in this dataset.", outcome.images);
                self.ctx.registry.record_success(&self.unit)?;
            }
            Some(reason) => {
                warn!("{}: {}", self.unit, reason);
                self.ctx.registry.record_failure(&self.unit, reason)?;
            }
        }
        Ok(outcome)
    }

    fn association_failed(&mut self, reason: String) -> Result<UnitOutcome, SessionError> {
        self.transition(SessionState::Failed);
        error!("Association failed: {}", reason);

        let reason = format!("association failed: {}", reason);
        self.ctx.registry.record_failure(&self.unit, &reason)?;
        Ok(UnitOutcome::association_failed(self.unit.clone(), reason))
    }
}
