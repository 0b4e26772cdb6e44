//! Ties planner, registry and sessions together for the three run modes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dimse::StoreConnector;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::models::{TransferUnit, UnitOutcome};
use crate::planner::{BatchPlanner, PlannerError};
use crate::registry::{FailureEntry, RegistryError, RegistryStore};
use crate::session::{SessionContext, SessionError, SessionOptions};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Enumerate `root` and persist the plan, nothing is sent
    PlanOnly { root: PathBuf },
    /// Send a persisted plan, the default plan file when `plan_file` is `None`
    SendFromPlan { plan_file: Option<PathBuf> },
    /// Enumerate `root`, persist the plan and send it straight away
    PlanAndSend { root: PathBuf },
}

/// What an interrupt should do, given whether one already arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// Finish the current file, release the association and stop
    Graceful,
    /// A stop was already pending; the process should exit now
    Forced,
}

/// Raise the stop flag. A second request while the first is still pending
/// is `Forced`, so a session blocked on the network can still be left.
pub fn request_stop(stop: &AtomicBool) -> StopRequest {
    if stop.swap(true, Ordering::SeqCst) {
        StopRequest::Forced
    } else {
        StopRequest::Graceful
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    /// Units considered before filtering
    pub planned: usize,
    /// Units skipped because they already succeeded
    pub skipped: usize,
    pub outcomes: Vec<UnitOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Contents of the outcome registries
#[derive(Debug, Default)]
pub struct RegistryReport {
    pub planned: usize,
    pub succeeded: usize,
    pub failures: Vec<FailureEntry>,
}

pub struct BatchRunner<'a> {
    config: &'a Config,
    registry: RegistryStore,
    connector: &'a dyn StoreConnector,
    stop: Arc<AtomicBool>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a Config, connector: &'a dyn StoreConnector) -> Self {
        Self {
            config,
            registry: RegistryStore::new(&config.registry),
            connector,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    fn planner(&self) -> BatchPlanner<'_> {
        BatchPlanner::new(&self.registry, self.config.transfer.sort_entries)
    }

    pub fn run(&self, mode: Mode) -> Result<RunSummary, DriverError> {
        match mode {
            Mode::PlanOnly { root } => {
                let units = self.planner().enumerate(&root)?;
                Ok(RunSummary {
                    planned: units.len(),
                    ..Default::default()
                })
            }
            Mode::SendFromPlan { plan_file } => {
                let units = match plan_file {
                    Some(path) => Some(self.registry.load_plan_from(&path)?),
                    None => None,
                };
                self.send(units)
            }
            Mode::PlanAndSend { root } => {
                // refuse before touching the plan file if no session could start
                self.config.validate_gateway()?;
                let units = self.planner().enumerate(&root)?;
                self.send(Some(units))
            }
        }
    }

    /// Send `units` (or the persisted plan) one unit at a time, in order
    pub fn send(&self, units: Option<Vec<TransferUnit>>) -> Result<RunSummary, DriverError> {
        self.config.validate_gateway()?;

        let plan = self.planner().plan_and_filter(units)?;

        let ctx = SessionContext::new(
            self.connector,
            self.config.gateway.remote_node(),
            &self.registry,
            SessionOptions::from(&self.config.transfer),
        )?
        .with_stop_flag(self.stop.clone());

        let mut summary = RunSummary {
            planned: plan.planned,
            skipped: plan.skipped(),
            outcomes: Vec::with_capacity(plan.pending.len()),
        };

        let total = plan.pending.len();
        for (i, unit) in plan.pending.into_iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                warn!("Stop requested, {} of {} units left unsent", total - i, total);
                break;
            }
            let outcome = ctx.session(unit).run()?;
            debug!("{} reported {} files", outcome.unit, outcome.reported_count());
            summary.outcomes.push(outcome);
        }

        info!(
            "Run finished: {} succeeded, {} failed, {} already sent",
            summary.succeeded(),
            summary.failed(),
            summary.skipped
        );
        Ok(summary)
    }

    /// Read-only view of the registries
    pub fn report(&self) -> Result<RegistryReport, RegistryError> {
        Ok(RegistryReport {
            planned: self.registry.load_plan()?.len(),
            succeeded: self.registry.load_succeeded()?.len(),
            failures: self.registry.load_failures()?,
        })
    }
}
