//! Flat-file bookkeeping for which clients still need processing.
//!
//! A run is backed by three comma-separated text files: the queue of
//! candidate names, and the success/failure ledgers that record outcomes
//! across runs. The pending set is recomputed at every run start as
//! `queue - (success | failure)`, which is what makes interrupted runs
//! safe to repeat: already-recorded names are simply skipped.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::PortalError;

/// Split a roster file body on commas, trimming whitespace around each
/// token and dropping empties.
fn parse_roster(content: &str) -> BTreeSet<String> {
    content
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load a success/failure ledger. A missing file is an empty set; the
/// ledgers are optional and come into existence on first append.
pub fn load_processed(path: &Path) -> Result<BTreeSet<String>, PortalError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_roster(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeSet::new()),
        Err(e) => Err(e.into()),
    }
}

/// Load the queue file. Unlike the ledgers, a missing queue file is fatal:
/// it is the input to the run, not incidental state.
pub fn load_queue(path: &Path) -> Result<BTreeSet<String>, PortalError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_roster(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(PortalError::QueueSource(format!(
            "queue file {} does not exist",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// `queue - (success | failure)`. Pure; no file access.
pub fn compute_pending(
    queue: &BTreeSet<String>,
    success: &BTreeSet<String>,
    failure: &BTreeSet<String>,
) -> BTreeSet<String> {
    queue
        .iter()
        .filter(|name| !success.contains(*name) && !failure.contains(*name))
        .cloned()
        .collect()
}

/// Append one name to a ledger, comma-separated. The separator decision is
/// made from file length metadata only; existing content is never read back
/// or rewritten.
pub fn append(path: &Path, name: &str) -> Result<(), PortalError> {
    let has_content = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if has_content {
        write!(file, ", {name}")?;
    } else {
        write!(file, "{name}")?;
    }
    Ok(())
}

/// Truncate a file to zero length.
pub fn clear(path: &Path) -> Result<(), PortalError> {
    fs::File::create(path)?;
    Ok(())
}

/// The three roster paths for a run, bundled.
#[derive(Debug, Clone)]
pub struct Roster {
    queue_path: PathBuf,
    success_path: PathBuf,
    failure_path: PathBuf,
}

impl Roster {
    pub fn new(
        queue_path: impl Into<PathBuf>,
        success_path: impl Into<PathBuf>,
        failure_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            queue_path: queue_path.into(),
            success_path: success_path.into(),
            failure_path: failure_path.into(),
        }
    }

    /// Names in the queue not yet recorded in either ledger.
    pub fn pending(&self) -> Result<BTreeSet<String>, PortalError> {
        let queue = load_queue(&self.queue_path)?;
        let success = load_processed(&self.success_path)?;
        let failure = load_processed(&self.failure_path)?;
        let pending = compute_pending(&queue, &success, &failure);
        debug!(
            queued = queue.len(),
            recorded = success.len() + failure.len(),
            pending = pending.len(),
            "computed pending set"
        );
        Ok(pending)
    }

    pub fn record_success(&self, name: &str) -> Result<(), PortalError> {
        append(&self.success_path, name)
    }

    pub fn record_failure(&self, name: &str) -> Result<(), PortalError> {
        append(&self.failure_path, name)
    }

    /// Truncate the queue file. Called exactly once, after the whole batch
    /// has been attempted.
    pub fn clear_queue(&self) -> Result<(), PortalError> {
        clear(&self.queue_path)
    }
}
