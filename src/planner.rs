//! Turns a root directory into an ordered list of transfer units and drops
//! the ones already recorded as succeeded.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::models::TransferUnit;
use crate::registry::{RegistryError, RegistryStore};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("cannot list {path}: {source}")]
    Enumerate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The candidates considered and the ones left after filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredPlan {
    pub planned: usize,
    pub pending: Vec<TransferUnit>,
}

impl FilteredPlan {
    pub fn skipped(&self) -> usize {
        self.planned - self.pending.len()
    }
}

pub struct BatchPlanner<'a> {
    registry: &'a RegistryStore,
    sort_entries: bool,
}

impl<'a> BatchPlanner<'a> {
    pub fn new(registry: &'a RegistryStore, sort_entries: bool) -> Self {
        Self {
            registry,
            sort_entries,
        }
    }

    /// List the immediate children of `root` as units and persist them as the plan
    pub fn enumerate(&self, root: &Path) -> Result<Vec<TransferUnit>, PlannerError> {
        let enumerate_error = |source| PlannerError::Enumerate {
            path: root.to_path_buf(),
            source,
        };

        let mut units = Vec::new();
        for entry in fs::read_dir(root).map_err(enumerate_error)? {
            let path = root.join(entry.map_err(enumerate_error)?.file_name());
            match TransferUnit::from_path(&path) {
                Some(unit) => units.push(unit),
                None => warn!("Skipping {}: path is not valid UTF-8", path.display()),
            }
        }
        if self.sort_entries {
            units.sort();
        }

        info!("Found {} units under {}", units.len(), root.display());
        self.registry.record_plan(&units)?;
        Ok(units)
    }

    /// Units still to send.
    ///
    /// `None` or an empty list falls back to the persisted plan. Units already
    /// in the success registry are skipped, the rest keep their order.
    pub fn plan_and_filter(
        &self,
        units: Option<Vec<TransferUnit>>,
    ) -> Result<FilteredPlan, RegistryError> {
        let units = match units {
            Some(units) if !units.is_empty() => units,
            _ => {
                let loaded = self.registry.load_plan()?;
                if loaded.is_empty() {
                    warn!(
                        "Nothing to send: {} is empty or missing",
                        self.registry.plan_path().display()
                    );
                }
                loaded
            }
        };

        let planned = units.len();
        let succeeded = self.registry.load_succeeded()?;
        let pending = units
            .into_iter()
            .filter(|unit| {
                let done = succeeded.contains(unit);
                if done {
                    info!("Already sent: {}", unit);
                }
                !done
            })
            .collect();

        Ok(FilteredPlan { planned, pending })
    }
}
