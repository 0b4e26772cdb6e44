//! Flat-file bookkeeping of planned, succeeded and failed transfer units.
//!
//! The store assumes a single writer. Two processes pointed at the same
//! registry directory can corrupt it: the plan file is last-write-wins and
//! appends to the outcome files are only line-atomic if the OS write is.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::models::TransferUnit;

mod entry;

pub use entry::FailureEntry;

/// Format used for plan file backups
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> RegistryError + '_ {
    move |source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The three registries: planned units, succeeded units, failed units
#[derive(Debug, Clone)]
pub struct RegistryStore {
    plan_path: PathBuf,
    success_path: PathBuf,
    error_path: PathBuf,
}

impl RegistryStore {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            plan_path: config.plan_path(),
            success_path: config.success_path(),
            error_path: config.error_path(),
        }
    }

    /// Store with the default file names under `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(&RegistryConfig {
            dir: dir.into(),
            ..Default::default()
        })
    }

    pub fn plan_path(&self) -> &Path {
        &self.plan_path
    }

    pub fn success_path(&self) -> &Path {
        &self.success_path
    }

    pub fn error_path(&self) -> &Path {
        &self.error_path
    }

    /// Replace the plan, keeping any previous plan as a timestamped backup
    pub fn record_plan(&self, units: &[TransferUnit]) -> RegistryResult<()> {
        ensure_parent(&self.plan_path)?;
        if self.plan_path.exists() {
            let stamp = chrono::Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
            let backup = backup_existing(&self.plan_path, &stamp)?;
            info!("Previous plan moved to {}", backup.display());
        }

        let file = File::create(&self.plan_path).map_err(io_error(&self.plan_path))?;
        let mut writer = BufWriter::new(file);
        for unit in units {
            writeln!(writer, "{}", unit).map_err(io_error(&self.plan_path))?;
        }
        writer.flush().map_err(io_error(&self.plan_path))?;

        info!("Recorded {} units to {}", units.len(), self.plan_path.display());
        Ok(())
    }

    /// Units in the default plan file, empty if it does not exist
    pub fn load_plan(&self) -> RegistryResult<Vec<TransferUnit>> {
        self.load_plan_from(&self.plan_path)
    }

    /// Units in an arbitrary plan file, same line contract as [`load_plan`](Self::load_plan)
    pub fn load_plan_from(&self, path: &Path) -> RegistryResult<Vec<TransferUnit>> {
        Ok(read_lines(path)?.into_iter().map(TransferUnit::from).collect())
    }

    pub fn record_success(&self, unit: &TransferUnit) -> RegistryResult<()> {
        append_line(&self.success_path, unit.id())
    }

    /// Append `<unit>\t<reason>` to the failure registry
    pub fn record_failure(&self, unit: &TransferUnit, reason: &str) -> RegistryResult<()> {
        let entry = FailureEntry::new(unit.clone(), reason);
        append_line(&self.error_path, &entry.to_line())
    }

    pub fn load_succeeded(&self) -> RegistryResult<HashSet<TransferUnit>> {
        Ok(read_lines(&self.success_path)?
            .into_iter()
            .map(TransferUnit::from)
            .collect())
    }

    /// Every failure ever recorded, oldest first
    pub fn load_failures(&self) -> RegistryResult<Vec<FailureEntry>> {
        Ok(read_lines(&self.error_path)?
            .iter()
            .map(|line| FailureEntry::parse(line))
            .collect())
    }
}

/// Rename `path` to `<path>.<stamp>`, adding a counter if that name is taken
fn backup_existing(path: &Path, stamp: &str) -> RegistryResult<PathBuf> {
    let base = format!("{}.{}", path.display(), stamp);
    let mut backup = PathBuf::from(&base);
    let mut n = 1;
    while backup.exists() {
        backup = PathBuf::from(format!("{}.{}", base, n));
        n += 1;
    }
    fs::rename(path, &backup).map_err(io_error(path))?;
    Ok(backup)
}

fn ensure_parent(path: &Path) -> RegistryResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(io_error(parent))
        }
        _ => Ok(()),
    }
}

/// Trimmed, non-empty lines of `path`; a missing file reads as empty
fn read_lines(path: &Path) -> RegistryResult<Vec<String>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} does not exist yet", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(io_error(path)(e)),
    };

    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(io_error(path))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    Ok(lines)
}

fn append_line(path: &Path, line: &str) -> RegistryResult<()> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_error(path))?;
    // single write per record
    file.write_all(format!("{}\n", line).as_bytes())
        .map_err(io_error(path))
}
