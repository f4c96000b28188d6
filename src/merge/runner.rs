//! Merge runner (EFFECTFUL)
//!
//! Drives a [`MergeMachine`]: every command it returns is executed as its own
//! task, and the task's single result message is handed back before the
//! next command is issued.

use crate::error::{Error, Result, SyncStep};
use crate::merge::machine::{Command, LoadedStack, MergeMachine, Message, Phase};
use crate::merge::poll::check_mergeable;
use crate::merge::progress::MergeProgress;
use crate::merge::sync::run_sync;
use crate::platform::PlatformService;
use crate::repo::VcsBackend;
use crate::types::MergeMethod;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a run ended
#[derive(Debug)]
pub struct RunSummary {
    /// Phase the run stopped in
    pub phase: Phase,
    /// PRs merged before the run stopped
    pub merged_count: usize,
    /// Size of the stack (0 if it never loaded)
    pub total: usize,
    /// The user declined the confirmation
    pub aborted: bool,
    /// Failure that ended the run
    pub error: Option<Error>,
}

impl RunSummary {
    /// Whether the run ended without error
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetch, read the stack and look up its PRs
///
/// Undescribed changes are never looked up, so they surface as revisions
/// without a PR.
pub async fn load_stack(
    backend: &dyn VcsBackend,
    platform: &dyn PlatformService,
    selector: &str,
) -> Result<LoadedStack> {
    backend
        .fetch_remote()
        .await
        .map_err(|e| Error::sync(SyncStep::Fetch, "remote", e))?;

    let read = backend.read_stack(selector).await?;
    let branches: Vec<String> = read
        .changes
        .iter()
        .filter(|change| !change.description.is_empty())
        .map(|change| change.bookmark.clone())
        .collect();
    debug!(count = branches.len(), "looking up PRs");
    let prs = platform.find_prs_for_branches(&branches).await?;

    Ok(LoadedStack { read, prs })
}

/// Executes machine commands against a VCS backend and a platform
pub struct MergeRunner {
    backend: Arc<dyn VcsBackend>,
    platform: Arc<dyn PlatformService>,
    merge_method: MergeMethod,
    auto_confirm: bool,
    cancel: CancellationToken,
}

impl MergeRunner {
    /// Create a runner; cancelling `cancel` interrupts the run
    pub fn new(
        backend: Arc<dyn VcsBackend>,
        platform: Arc<dyn PlatformService>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            platform,
            merge_method: MergeMethod::default(),
            auto_confirm: false,
            cancel,
        }
    }

    /// Merge method passed to the platform
    #[must_use]
    pub fn with_merge_method(mut self, method: MergeMethod) -> Self {
        self.merge_method = method;
        self
    }

    /// Skip the confirmation prompt
    #[must_use]
    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    /// Run `machine` to completion
    ///
    /// `progress` sees a snapshot after every transition, including the
    /// final one.
    pub async fn run(&self, machine: &mut MergeMachine, progress: &dyn MergeProgress) -> RunSummary {
        let mut command = machine.start();

        loop {
            progress.on_update(&machine.snapshot()).await;

            let task = match command {
                Command::Quit => break,
                Command::AwaitConfirmation => {
                    let message = if self.auto_confirm {
                        Message::Confirmed
                    } else {
                        let snapshot = machine.snapshot();
                        tokio::select! {
                            biased;

                            () = self.cancel.cancelled() => {
                                return Self::stop(machine, progress, Error::Cancelled).await;
                            }
                            confirmed = progress.confirm(&snapshot) => {
                                if confirmed { Message::Confirmed } else { Message::Declined }
                            }
                        }
                    };
                    command = machine.handle(message);
                    continue;
                }
                Command::Load { selector } => {
                    let (backend, platform) = self.services();
                    tokio::spawn(async move {
                        Message::LoadComplete(
                            load_stack(backend.as_ref(), platform.as_ref(), &selector).await,
                        )
                    })
                }
                Command::Sync(request) => {
                    let (backend, platform) = self.services();
                    let cancel = self.cancel.clone();
                    info!(count = request.remaining.len(), "syncing remaining stack");
                    tokio::spawn(async move {
                        Message::SyncComplete(
                            run_sync(backend.as_ref(), platform.as_ref(), &request, &cancel).await,
                        )
                    })
                }
                Command::CheckMergeable { pr_number, delay } => {
                    let (_, platform) = self.services();
                    tokio::spawn(async move {
                        if let Some(delay) = delay {
                            tokio::time::sleep(delay).await;
                        }
                        Message::MergeableChecked {
                            pr_number,
                            result: check_mergeable(platform.as_ref(), pr_number).await,
                        }
                    })
                }
                Command::Merge { pr_number } => {
                    let (_, platform) = self.services();
                    let method = self.merge_method;
                    info!(pr_number, %method, "merging PR");
                    tokio::spawn(async move {
                        Message::MergeComplete {
                            pr_number,
                            result: merge(platform.as_ref(), pr_number, method).await,
                        }
                    })
                }
            };

            match self.wait_for(task).await {
                Ok(message) => command = machine.handle(message),
                Err(e) => return Self::stop(machine, progress, e).await,
            }
        }

        Self::summarize(machine)
    }

    fn services(&self) -> (Arc<dyn VcsBackend>, Arc<dyn PlatformService>) {
        (Arc::clone(&self.backend), Arc::clone(&self.platform))
    }

    /// Await a command task, or abort it when the run is cancelled
    async fn wait_for(&self, mut task: JoinHandle<Message>) -> Result<Message> {
        tokio::select! {
            biased;

            () = self.cancel.cancelled() => {
                task.abort();
                Err(Error::Cancelled)
            }
            joined = &mut task => joined.map_err(|e| {
                warn!(error = %e, "command task failed");
                Error::Internal(format!("command task failed: {e}"))
            }),
        }
    }

    /// End the run early with `err`
    async fn stop(machine: &mut MergeMachine, progress: &dyn MergeProgress, err: Error) -> RunSummary {
        info!(phase = %machine.phase(), error = %err, "run stopped");
        machine.abort(err);
        progress.on_update(&machine.snapshot()).await;
        Self::summarize(machine)
    }

    fn summarize(machine: &mut MergeMachine) -> RunSummary {
        RunSummary {
            phase: machine.phase(),
            merged_count: machine.merged_count(),
            total: machine.stack().mutable_len(),
            aborted: machine.is_aborted(),
            error: machine.take_error(),
        }
    }
}

async fn merge(platform: &dyn PlatformService, pr_number: u64, method: MergeMethod) -> Result<()> {
    let result = platform.merge_pr(pr_number, method, None).await?;
    if result.merged {
        Ok(())
    } else {
        Err(Error::Platform(
            result
                .message
                .unwrap_or_else(|| "PR was not merged".to_string()),
        ))
    }
}
