//! Sync operation: fetch, rebase the remaining stack onto trunk, push, and
//! retarget the bottom PR

use crate::error::{Error, Result, SyncStep};
use crate::platform::PlatformService;
use crate::repo::VcsBackend;
use crate::types::RebaseOutcome;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Revset the remaining stack is rebased onto
pub const TRUNK_REVSET: &str = "trunk()";

/// A not-yet-merged revision taking part in a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemainingRevision {
    /// Change ID
    pub change_id: String,
    /// Short change ID (for messages)
    pub short_id: String,
    /// PR number, 0 if unknown
    pub pr_number: u64,
}

/// Input of a sync: remaining revisions in merge order (root first)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Remaining revisions, bottom first
    pub remaining: Vec<RemainingRevision>,
    /// Trunk branch name the bottom PR is retargeted to
    pub trunk_name: String,
}

/// Non-error outcome of a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remaining revisions rebased, pushed and retargeted
    Synced,
    /// Rebase left conflicts; nothing was pushed
    Conflict,
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Run a sync (EFFECTFUL)
///
/// Rebasing the root of the remaining stack carries its descendants along,
/// so only one rebase is needed. Only the root PR is retargeted: the others
/// already point at the branch right below them, which keeps its name.
///
/// The cancellation token is checked before every step.
pub async fn run_sync(
    backend: &dyn VcsBackend,
    platform: &dyn PlatformService,
    request: &SyncRequest,
    cancel: &CancellationToken,
) -> Result<SyncOutcome> {
    ensure_not_cancelled(cancel)?;
    backend
        .fetch_remote()
        .await
        .map_err(|e| Error::sync(SyncStep::Fetch, "remote", e))?;

    let Some(root) = request.remaining.first() else {
        debug!("nothing left to sync");
        return Ok(SyncOutcome::Synced);
    };

    ensure_not_cancelled(cancel)?;
    info!(change = %root.short_id, "rebasing remaining stack onto trunk");
    let outcome = backend
        .rebase(&root.change_id, TRUNK_REVSET)
        .await
        .map_err(|e| Error::sync(SyncStep::Rebase, &root.short_id, e))?;
    if outcome == RebaseOutcome::Conflicted {
        return Ok(SyncOutcome::Conflict);
    }

    for rev in &request.remaining {
        ensure_not_cancelled(cancel)?;
        debug!(change = %rev.short_id, "pushing");
        backend
            .push_branch(&rev.change_id)
            .await
            .map_err(|e| Error::sync(SyncStep::Push, &rev.short_id, e))?;
    }

    if root.pr_number > 0 {
        ensure_not_cancelled(cancel)?;
        info!(pr_number = root.pr_number, base = %request.trunk_name, "retargeting PR");
        platform
            .update_pr_base(root.pr_number, &request.trunk_name)
            .await
            .map_err(|e| Error::sync(SyncStep::UpdateBase, format!("PR #{}", root.pr_number), e))?;
    }

    Ok(SyncOutcome::Synced)
}
