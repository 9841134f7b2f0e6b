//! Sequential batch run over the pending client set.
//!
//! The loop owns the roster side effects and depends on the automation
//! collaborator only through [`ClientProcessor::process`]. One client's
//! failure never aborts the batch; fatal conditions (missing queue file,
//! connect/login failure, roster write errors) abort it with the queue
//! file left intact, so the next run recomputes the same pending set.

use std::future::Future;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::client::ClientName;
use crate::errors::PortalError;
use crate::roster::Roster;

/// The collaborator surface the run loop needs: process one client,
/// fetching both consent documents.
#[async_trait]
pub trait ClientProcessor {
    async fn process(&self, name: &ClientName) -> Result<(), PortalError>;

    /// Release the underlying automation session. Called on every exit
    /// path once a processor exists.
    async fn shutdown(&self) -> Result<(), PortalError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl RunSummary {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempted() == 0
    }
}

/// Run one batch: load the queue, subtract the ledgers, process what is
/// left, record outcomes, and clear the queue.
///
/// `connect` is only invoked when at least one well-formed name needs
/// automation, so an empty (or malformed-only) pending set never opens a
/// browser session. When the pending set is empty the run returns without
/// modifying any file at all.
pub async fn run_batch<P, C, Fut>(roster: &Roster, connect: C) -> Result<RunSummary, PortalError>
where
    P: ClientProcessor + Sync,
    C: FnOnce() -> Fut,
    Fut: Future<Output = Result<P, PortalError>>,
{
    let pending = roster.pending()?;
    let mut summary = RunSummary::default();

    if pending.is_empty() {
        info!("nothing pending; leaving all files untouched");
        return Ok(summary);
    }

    // Malformed names are recorded as failures without ever reaching the
    // automation collaborator.
    let mut wellformed = Vec::new();
    for raw in &pending {
        match ClientName::parse(raw) {
            Ok(name) => wellformed.push(name),
            Err(e) => {
                warn!(entry = %raw, error = %e, "rejecting malformed queue entry");
                roster.record_failure(raw)?;
                summary.failed.push(raw.clone());
            }
        }
    }

    if wellformed.is_empty() {
        roster.clear_queue()?;
        info!(failed = summary.failed.len(), "batch held only malformed entries");
        return Ok(summary);
    }

    let processor = connect().await?;
    let outcome = process_all(&processor, roster, &wellformed, &mut summary).await;
    if let Err(e) = processor.shutdown().await {
        warn!(error = %e, "failed to shut down automation session");
    }
    outcome?;

    roster.clear_queue()?;
    info!(
        succeeded = summary.succeeded.len(),
        failed = summary.failed.len(),
        "run complete"
    );
    Ok(summary)
}

async fn process_all<P: ClientProcessor>(
    processor: &P,
    roster: &Roster,
    names: &[ClientName],
    summary: &mut RunSummary,
) -> Result<(), PortalError> {
    for name in names {
        match processor.process(name).await {
            Ok(()) => {
                info!(client = %name, "client processed");
                roster.record_success(&name.full())?;
                summary.succeeded.push(name.full());
            }
            Err(e) => {
                warn!(client = %name, error = %e, "client failed");
                roster.record_failure(&name.full())?;
                summary.failed.push(name.full());
            }
        }
    }
    Ok(())
}
